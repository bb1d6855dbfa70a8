//! Save strategies
//!
//! A save strategy decides, for a file whose local copy was edited, whether
//! the local edits win or the freshly fetched remote content wins. Every
//! strategy shares one shortcut: when the last-synced bytes equal the remote
//! bytes, nobody else touched the remote copy and local edits are pushed
//! without consulting anything else.

use std::sync::Arc;

use tracing::{debug, info};

use mfsync_core::config::ConflictsConfig;
use mfsync_core::domain::{NodeId, SaveDecision};

use crate::error::ConflictError;
use crate::policy::{ConflictPolicy, PolicyEngine};

// ============================================================================
// Contracts
// ============================================================================

/// The file a decision is being made for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictFile {
    pub handle: NodeId,
    /// Tree path, used for rule matching and user-facing messages
    pub path: String,
}

impl ConflictFile {
    pub fn new(handle: NodeId, path: impl Into<String>) -> Self {
        Self {
            handle,
            path: path.into(),
        }
    }
}

/// Decides between local and remote content for a diverged file
#[async_trait::async_trait]
pub trait ISaveStrategy: Send + Sync {
    async fn decide(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> Result<SaveDecision, ConflictError>;
}

/// Interactive collaborator asked when the remote side changed
///
/// Returns `Ok(None)` when the user dismissed the question.
#[async_trait::async_trait]
pub trait IConflictPrompt: Send + Sync {
    async fn ask(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> anyhow::Result<Option<SaveDecision>>;
}

fn baseline_matches(file: &ConflictFile, last_synced: &[u8], remote: &[u8]) -> bool {
    let matches = last_synced == remote;
    if matches {
        debug!(handle = %file.handle, "Remote unchanged since last sync, keeping local");
    }
    matches
}

async fn ask_prompt(
    prompt: &dyn IConflictPrompt,
    file: &ConflictFile,
    last_synced: &[u8],
    remote: &[u8],
) -> Result<SaveDecision, ConflictError> {
    info!(handle = %file.handle, path = %file.path, "Remote changed since last sync, asking");
    match prompt.ask(file, last_synced, remote).await? {
        Some(decision) => {
            info!(handle = %file.handle, decision = %decision, "Conflict decided");
            Ok(decision)
        }
        None => Err(ConflictError::Unresolved {
            path: file.path.clone(),
            reason: "prompt dismissed".to_string(),
        }),
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Asks the interactive collaborator whenever the baseline diverged
pub struct DefaultSaveStrategy {
    prompt: Arc<dyn IConflictPrompt>,
}

impl DefaultSaveStrategy {
    pub fn new(prompt: Arc<dyn IConflictPrompt>) -> Self {
        Self { prompt }
    }
}

#[async_trait::async_trait]
impl ISaveStrategy for DefaultSaveStrategy {
    async fn decide(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> Result<SaveDecision, ConflictError> {
        if baseline_matches(file, last_synced, remote) {
            return Ok(SaveDecision::KeepLocal);
        }
        ask_prompt(self.prompt.as_ref(), file, last_synced, remote).await
    }
}

/// Remote content wins every diverged baseline
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferRemoteStrategy;

#[async_trait::async_trait]
impl ISaveStrategy for PreferRemoteStrategy {
    async fn decide(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> Result<SaveDecision, ConflictError> {
        if baseline_matches(file, last_synced, remote) {
            return Ok(SaveDecision::KeepLocal);
        }
        Ok(SaveDecision::AcceptRemote)
    }
}

/// Local edits overwrite the remote copy even when it changed
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferLocalStrategy;

#[async_trait::async_trait]
impl ISaveStrategy for PreferLocalStrategy {
    async fn decide(
        &self,
        _file: &ConflictFile,
        _last_synced: &[u8],
        _remote: &[u8],
    ) -> Result<SaveDecision, ConflictError> {
        Ok(SaveDecision::KeepLocal)
    }
}

/// Refuses to pick a side once the remote copy changed
#[derive(Debug, Default, Clone, Copy)]
pub struct FailOnConflictStrategy;

#[async_trait::async_trait]
impl ISaveStrategy for FailOnConflictStrategy {
    async fn decide(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> Result<SaveDecision, ConflictError> {
        if baseline_matches(file, last_synced, remote) {
            return Ok(SaveDecision::KeepLocal);
        }
        Err(ConflictError::Unresolved {
            path: file.path.clone(),
            reason: "remote content changed since last sync".to_string(),
        })
    }
}

/// Picks a policy per file from glob rules
///
/// `Ask` without a configured prompt is treated as unresolved.
pub struct PolicySaveStrategy {
    engine: PolicyEngine,
    prompt: Option<Arc<dyn IConflictPrompt>>,
}

impl PolicySaveStrategy {
    pub fn new(engine: PolicyEngine, prompt: Option<Arc<dyn IConflictPrompt>>) -> Self {
        Self { engine, prompt }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }
}

#[async_trait::async_trait]
impl ISaveStrategy for PolicySaveStrategy {
    async fn decide(
        &self,
        file: &ConflictFile,
        last_synced: &[u8],
        remote: &[u8],
    ) -> Result<SaveDecision, ConflictError> {
        if baseline_matches(file, last_synced, remote) {
            return Ok(SaveDecision::KeepLocal);
        }

        let policy = self.engine.evaluate(&file.path);
        debug!(handle = %file.handle, path = %file.path, policy = %policy, "Conflict policy selected");

        match policy {
            ConflictPolicy::KeepLocal => Ok(SaveDecision::KeepLocal),
            ConflictPolicy::AcceptRemote => Ok(SaveDecision::AcceptRemote),
            ConflictPolicy::Fail => Err(ConflictError::Unresolved {
                path: file.path.clone(),
                reason: "conflict policy is fail".to_string(),
            }),
            ConflictPolicy::Ask => match &self.prompt {
                Some(prompt) => ask_prompt(prompt.as_ref(), file, last_synced, remote).await,
                None => Err(ConflictError::Unresolved {
                    path: file.path.clone(),
                    reason: "no conflict prompt available".to_string(),
                }),
            },
        }
    }
}

/// Builds the strategy described by the `conflicts` config section
///
/// Without rules, the default strategy maps to one of the fixed strategies;
/// with rules, a [`PolicySaveStrategy`] evaluates them per file.
pub fn strategy_from_config(
    config: &ConflictsConfig,
    prompt: Option<Arc<dyn IConflictPrompt>>,
) -> Arc<dyn ISaveStrategy> {
    let engine = PolicyEngine::from_config(config);
    if engine.rules_count() > 0 {
        return Arc::new(PolicySaveStrategy::new(engine, prompt));
    }

    match (engine.default_policy(), prompt) {
        (ConflictPolicy::Ask, Some(prompt)) => Arc::new(DefaultSaveStrategy::new(prompt)),
        (ConflictPolicy::Ask, None) => Arc::new(PolicySaveStrategy::new(engine, None)),
        (ConflictPolicy::KeepLocal, _) => Arc::new(PreferLocalStrategy),
        (ConflictPolicy::AcceptRemote, _) => Arc::new(PreferRemoteStrategy),
        (ConflictPolicy::Fail, _) => Arc::new(FailOnConflictStrategy),
    }
}
