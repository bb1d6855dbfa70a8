//! User-facing notifications
//!
//! The synchronizer reports failed passes through this port. Delivery is
//! best effort: listeners log a failed `notify` and move on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    /// Grouping key shown by the host, e.g. "sync"
    pub category: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::default(),
            category: String::new(),
        }
    }

    /// A failed synchronize pass; `body` carries the cause
    pub fn sync_failure(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            priority: NotificationPriority::High,
            category: "sync".to_string(),
            ..Self::new(title, body)
        }
    }
}

#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
