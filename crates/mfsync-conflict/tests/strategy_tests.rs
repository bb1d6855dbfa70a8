//! Integration tests for save strategies

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mfsync_conflict::{
    strategy_from_config, ConflictError, ConflictFile, DefaultSaveStrategy, IConflictPrompt,
    ISaveStrategy, PolicyEngine, PolicySaveStrategy,
};
use mfsync_core::config::ConfigBuilder;
use mfsync_core::domain::{NodeId, SaveDecision};

// ============================================================================
// Test helpers
// ============================================================================

/// Prompt returning a fixed answer and counting invocations
struct ScriptedPrompt {
    answer: Option<SaveDecision>,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    fn new(answer: Option<SaveDecision>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IConflictPrompt for ScriptedPrompt {
    async fn ask(
        &self,
        _file: &ConflictFile,
        _last_synced: &[u8],
        _remote: &[u8],
    ) -> anyhow::Result<Option<SaveDecision>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

struct BrokenPrompt;

#[async_trait::async_trait]
impl IConflictPrompt for BrokenPrompt {
    async fn ask(
        &self,
        _file: &ConflictFile,
        _last_synced: &[u8],
        _remote: &[u8],
    ) -> anyhow::Result<Option<SaveDecision>> {
        anyhow::bail!("display unavailable")
    }
}

fn uss_file() -> ConflictFile {
    ConflictFile::new(NodeId::new(12), "/zosmf/USS/u/ibmuser/prog.c")
}

fn dataset_file() -> ConflictFile {
    ConflictFile::new(NodeId::new(13), "/zosmf/Data Sets/VOL1/HLQ.SEQ")
}

// ============================================================================
// DefaultSaveStrategy
// ============================================================================

#[tokio::test]
async fn matching_baseline_keeps_local_without_prompting() {
    let prompt = ScriptedPrompt::new(Some(SaveDecision::AcceptRemote));
    let strategy = DefaultSaveStrategy::new(prompt.clone());

    let decision = strategy.decide(&uss_file(), b"ABC", b"ABC").await.unwrap();

    assert_eq!(decision, SaveDecision::KeepLocal);
    assert_eq!(prompt.calls(), 0);
}

#[tokio::test]
async fn diverged_baseline_asks_prompt() {
    let prompt = ScriptedPrompt::new(Some(SaveDecision::AcceptRemote));
    let strategy = DefaultSaveStrategy::new(prompt.clone());

    let decision = strategy.decide(&uss_file(), b"ABC", b"XYZ").await.unwrap();

    assert_eq!(decision, SaveDecision::AcceptRemote);
    assert_eq!(prompt.calls(), 1);
}

#[tokio::test]
async fn dismissed_prompt_is_unresolved() {
    let strategy = DefaultSaveStrategy::new(ScriptedPrompt::new(None));

    let err = strategy.decide(&uss_file(), b"ABC", b"XYZ").await.unwrap_err();

    match err {
        ConflictError::Unresolved { path, .. } => assert_eq!(path, "/zosmf/USS/u/ibmuser/prog.c"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failing_prompt_propagates() {
    let strategy = DefaultSaveStrategy::new(Arc::new(BrokenPrompt));
    let err = strategy.decide(&uss_file(), b"A", b"B").await.unwrap_err();
    assert!(matches!(err, ConflictError::PromptFailed(_)));
}

// ============================================================================
// PolicySaveStrategy
// ============================================================================

#[tokio::test]
async fn policy_rules_pick_per_path() {
    let config = ConfigBuilder::new()
        .conflicts_default_strategy("ask")
        .conflicts_rule("/*/Data Sets/**", "accept_remote")
        .conflicts_rule("**/*.c", "keep_local")
        .build();
    let prompt = ScriptedPrompt::new(Some(SaveDecision::AcceptRemote));
    let strategy = PolicySaveStrategy::new(
        PolicyEngine::from_config(&config.conflicts),
        Some(prompt.clone()),
    );

    assert_eq!(
        strategy.decide(&dataset_file(), b"A", b"B").await.unwrap(),
        SaveDecision::AcceptRemote
    );
    assert_eq!(
        strategy.decide(&uss_file(), b"A", b"B").await.unwrap(),
        SaveDecision::KeepLocal
    );
    assert_eq!(prompt.calls(), 0);

    let other = ConflictFile::new(NodeId::new(14), "/zosmf/USS/u/ibmuser/notes.txt");
    assert_eq!(
        strategy.decide(&other, b"A", b"B").await.unwrap(),
        SaveDecision::AcceptRemote
    );
    assert_eq!(prompt.calls(), 1);
}

#[tokio::test]
async fn policy_fail_rule_is_unresolved() {
    let config = ConfigBuilder::new()
        .conflicts_default_strategy("keep_local")
        .conflicts_rule("**/*.c", "fail")
        .build();
    let strategy = PolicySaveStrategy::new(PolicyEngine::from_config(&config.conflicts), None);

    assert!(strategy.decide(&uss_file(), b"A", b"B").await.is_err());
    assert_eq!(
        strategy.decide(&uss_file(), b"A", b"A").await.unwrap(),
        SaveDecision::KeepLocal
    );
    assert_eq!(
        strategy.decide(&dataset_file(), b"A", b"B").await.unwrap(),
        SaveDecision::KeepLocal
    );
}

// ============================================================================
// strategy_from_config
// ============================================================================

#[tokio::test]
async fn config_default_strategies() {
    let accept = ConfigBuilder::new()
        .conflicts_default_strategy("accept_remote")
        .build();
    let strategy = strategy_from_config(&accept.conflicts, None);
    assert_eq!(
        strategy.decide(&uss_file(), b"A", b"B").await.unwrap(),
        SaveDecision::AcceptRemote
    );

    let fail = ConfigBuilder::new().conflicts_default_strategy("fail").build();
    let strategy = strategy_from_config(&fail.conflicts, None);
    assert!(strategy.decide(&uss_file(), b"A", b"B").await.is_err());

    let ask = ConfigBuilder::new().conflicts_default_strategy("ask").build();
    let prompt = ScriptedPrompt::new(Some(SaveDecision::KeepLocal));
    let strategy = strategy_from_config(&ask.conflicts, Some(prompt.clone()));
    assert_eq!(
        strategy.decide(&uss_file(), b"A", b"B").await.unwrap(),
        SaveDecision::KeepLocal
    );
    assert_eq!(prompt.calls(), 1);
}
