//! MFSync Conflict - Save strategies for diverged files
//!
//! Provides:
//! - The `ISaveStrategy` decision contract and the `IConflictPrompt` collaborator
//! - Fixed strategies (prefer local, prefer remote, fail on conflict)
//! - Glob-rule policies selecting a strategy per file path

pub mod error;
pub mod policy;
pub mod strategy;

pub use error::ConflictError;
pub use policy::{validate_rule, ConflictPolicy, PolicyEngine};
pub use strategy::{
    strategy_from_config, ConflictFile, DefaultSaveStrategy, FailOnConflictStrategy,
    IConflictPrompt, ISaveStrategy, PolicySaveStrategy, PreferLocalStrategy,
    PreferRemoteStrategy,
};
