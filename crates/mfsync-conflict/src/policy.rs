//! Policy engine for automatic conflict handling
//!
//! Evaluates conflict rules from configuration to pick a strategy per file.
//! Rules are matched against the file's tree path using glob patterns in
//! first-match-wins order.

use std::fmt;
use std::str::FromStr;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use mfsync_core::config::{ConflictRuleConfig, ConflictsConfig};

use crate::error::ConflictError;

/// What to do when the remote side changed since the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Defer to the interactive prompt
    Ask,
    KeepLocal,
    AcceptRemote,
    /// Leave both sides untouched and report the conflict
    Fail,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictPolicy::Ask => "ask",
            ConflictPolicy::KeepLocal => "keep_local",
            ConflictPolicy::AcceptRemote => "accept_remote",
            ConflictPolicy::Fail => "fail",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConflictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(ConflictPolicy::Ask),
            "keep_local" => Ok(ConflictPolicy::KeepLocal),
            "accept_remote" => Ok(ConflictPolicy::AcceptRemote),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(ConflictError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Validates one configured rule's glob pattern and strategy
pub fn validate_rule(rule: &ConflictRuleConfig) -> Result<(), ConflictError> {
    Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidPattern {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;
    rule.strategy.parse::<ConflictPolicy>()?;
    Ok(())
}

/// Engine that evaluates conflict rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, ConflictPolicy)>,
    default_policy: ConflictPolicy,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy string and a list of rules
    ///
    /// Invalid rules are logged and skipped; an invalid default falls back
    /// to `Ask`.
    pub fn new(default_strategy: &str, rules: &[ConflictRuleConfig]) -> Self {
        let default = default_strategy
            .parse::<ConflictPolicy>()
            .unwrap_or(ConflictPolicy::Ask);

        let compiled_rules: Vec<(Pattern, ConflictPolicy)> = rules
            .iter()
            .filter_map(|rule| {
                let pattern = match Pattern::new(&rule.pattern) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(
                            pattern = %rule.pattern,
                            error = %e,
                            "Skipping invalid conflict rule pattern"
                        );
                        return None;
                    }
                };
                match rule.strategy.parse::<ConflictPolicy>() {
                    Ok(policy) => Some((pattern, policy)),
                    Err(_) => {
                        tracing::warn!(
                            strategy = %rule.strategy,
                            "Skipping invalid conflict rule strategy"
                        );
                        None
                    }
                }
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %default,
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_policy: default,
        }
    }

    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(&config.default_strategy, &config.rules)
    }

    /// Evaluates the policy for a file's tree path
    pub fn evaluate(&self, path: &str) -> ConflictPolicy {
        for (pattern, policy) in &self.rules {
            if pattern.matches(path) {
                trace!(path, pattern = %pattern, policy = %policy, "Conflict rule matched");
                return *policy;
            }
        }

        trace!(path, default = %self.default_policy, "No conflict rule matched, using default");
        self.default_policy
    }

    pub fn default_policy(&self) -> ConflictPolicy {
        self.default_policy
    }

    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}
