//! Reconciliation decisions and outcomes

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// What a save strategy decided for a diverged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveDecision {
    /// Push local edits over the remote copy
    KeepLocal,
    /// Replace local edits with the remote copy
    AcceptRemote,
}

impl Display for SaveDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaveDecision::KeepLocal => "keep_local",
            SaveDecision::AcceptRemote => "accept_remote",
        };
        write!(f, "{}", s)
    }
}

/// Result of one successful synchronize pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// First pass of the session: remote content became the local content
    InitialContent,
    /// Local and remote content already matched
    Unchanged,
    /// Local content was uploaded
    Uploaded,
    /// Remote content replaced local content
    AcceptedRemote,
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncOutcome::InitialContent => "initial_content",
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::Uploaded => "uploaded",
            SyncOutcome::AcceptedRemote => "accepted_remote",
        };
        write!(f, "{}", s)
    }
}
