//! Remote transport port (driven/secondary port)
//!
//! This module defines the interface the core needs from the protocol client
//! that performs the actual remote calls: listing collections, fetching and
//! uploading byte payloads.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; the synchronizer and fetch provider classify them as
//!   transport failures.
//! - Every call takes a `CancellationToken`. Implementations should abort
//!   promptly when it fires; callers additionally race each call against the
//!   token, so an implementation that ignores it cannot pin a worker.
//! - `RawItem` is a port-level DTO, not a domain entity; the fetch provider
//!   maps it to a `RemoteDescriptor`.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::descriptor::{ContentMode, DatasetOrganization, FileMode};
use crate::domain::query::Connection;

// ============================================================================
// Resource locators
// ============================================================================

/// Remote address of one content-bearing resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceLocator {
    Dataset {
        name: String,
        volser: Option<String>,
    },
    Member {
        library: String,
        member: String,
    },
    UssFile {
        path: String,
    },
    SpoolFile {
        job_name: String,
        job_id: String,
        spool_id: u32,
    },
}

/// Remote collection addressed by one listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListTarget {
    Datasets {
        mask: String,
        volser: Option<String>,
    },
    Members {
        library: String,
    },
    UssDirectory {
        path: String,
    },
    Jobs {
        owner: String,
        prefix: String,
        job_id: Option<String>,
    },
    SpoolFiles {
        job_name: String,
        job_id: String,
    },
}

/// One listing call: target collection plus optional batching cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub target: ListTarget,
    /// Name of the last item already received; listing resumes after it
    pub start: Option<String>,
    /// Maximum number of items to return; `None` for the whole collection
    pub max_items: Option<u32>,
}

impl ListRequest {
    pub fn all(target: ListTarget) -> Self {
        Self {
            target,
            start: None,
            max_items: None,
        }
    }
}

// ============================================================================
// Raw listing items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub name: String,
    pub volser: Option<String>,
    pub organization: DatasetOrganization,
    pub record_format: Option<String>,
    pub record_length: Option<u32>,
    pub migrated: bool,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberItem {
    pub name: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssItem {
    pub name: String,
    pub is_directory: bool,
    pub mode: Option<FileMode>,
    pub size: Option<u64>,
    pub uid: Option<u64>,
    pub user: Option<String>,
    pub gid: Option<u64>,
    pub group: Option<String>,
    pub modified: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub job_id: String,
    pub job_name: String,
    pub owner: String,
    pub phase: Option<String>,
    pub subsystem: Option<String>,
    pub return_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolItem {
    pub id: u32,
    pub dd_name: String,
    pub step_name: Option<String>,
    pub proc_step: Option<String>,
    pub record_count: Option<u64>,
    pub binary: bool,
}

/// One element of a listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawItem {
    Dataset(DatasetItem),
    Member(MemberItem),
    Uss(UssItem),
    Job(JobItem),
    Spool(SpoolItem),
}

impl RawItem {
    /// Name used as the batching cursor
    pub fn cursor_name(&self) -> String {
        match self {
            RawItem::Dataset(d) => d.name.clone(),
            RawItem::Member(m) => m.name.clone(),
            RawItem::Uss(u) => u.name.clone(),
            RawItem::Job(j) => j.job_id.clone(),
            RawItem::Spool(s) => s.id.to_string(),
        }
    }
}

// ============================================================================
// IRemoteTransport
// ============================================================================

/// Port trait for remote listing and content transfer
#[async_trait::async_trait]
pub trait IRemoteTransport: Send + Sync {
    /// Lists one remote collection
    ///
    /// # Arguments
    /// * `connection` - Connection to issue the call through
    /// * `request` - Collection to list and batching parameters
    /// * `cancel` - Token aborting the call
    async fn list_resources(
        &self,
        connection: &Connection,
        request: &ListRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<RawItem>>;

    /// Downloads the full content of a resource
    async fn fetch_bytes(
        &self,
        connection: &Connection,
        resource: &ResourceLocator,
        mode: &ContentMode,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<u8>>;

    /// Replaces the content of a resource
    async fn upload_bytes(
        &self,
        connection: &Connection,
        resource: &ResourceLocator,
        mode: &ContentMode,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}
