//! Remote resource descriptors
//!
//! A [`RemoteDescriptor`] is the immutable-per-snapshot description of one
//! remote entity: a dataset, a partitioned-dataset member, a USS file or
//! directory, a batch job or one of its spool files. The variants diverge in
//! fields but share one accessor surface (`unique_key`, `requesters`,
//! `parent_handle`, `path_chain`, ...).
//!
//! ## Identity
//!
//! Every descriptor has a [`DescriptorKey`]: the subset of fields that
//! identifies the same remote entity regardless of transient metadata.
//! Requester lists never take part in the key, and neither do fields that
//! may legitimately change for the same entity (a dataset's volume, sizes,
//! permission bits).

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::NodeId;
use super::query::{merge_requesters, Requester, ResourceKind};

// ============================================================================
// ContentMode
// ============================================================================

/// Transfer representation of a resource's content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Text,
    Binary,
}

/// Text/binary mode plus an optional encoding name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentMode {
    pub data_type: DataType,
    pub encoding: Option<String>,
}

impl ContentMode {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn binary() -> Self {
        Self {
            data_type: DataType::Binary,
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn is_binary(&self) -> bool {
        self.data_type == DataType::Binary
    }
}

// ============================================================================
// Datasets
// ============================================================================

/// Dataset organization as reported by the remote catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetOrganization {
    #[serde(rename = "PO-E")]
    PartitionedExtended,
    #[serde(rename = "PO")]
    Partitioned,
    #[serde(rename = "PS")]
    Sequential,
    #[serde(rename = "VS")]
    Vsam,
    #[serde(other)]
    Unknown,
}

impl DatasetOrganization {
    /// Partitioned datasets are libraries and become directories
    pub fn is_library(&self) -> bool {
        matches!(
            self,
            DatasetOrganization::Partitioned | DatasetOrganization::PartitionedExtended
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetAttributes {
    pub name: String,
    /// Volume serial; `None` for migrated datasets
    pub volser: Option<String>,
    pub organization: DatasetOrganization,
    pub record_format: Option<String>,
    pub record_length: Option<u32>,
    pub migrated: bool,
    pub length: u64,
    pub url: String,
    pub content_mode: ContentMode,
    pub requesters: Vec<Requester>,
}

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAttributes {
    pub name: String,
    /// Handle of the owning library; named, not owned
    pub library: NodeId,
    pub length: u64,
    pub modified: Option<String>,
    pub content_mode: ContentMode,
    pub requesters: Vec<Requester>,
}

// ============================================================================
// USS
// ============================================================================

/// Octal permission digits of a USS entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileMode {
    pub owner: u8,
    pub group: u8,
    pub all: u8,
}

const MODE_READ: u8 = 0o4;
const MODE_WRITE: u8 = 0o2;
const MODE_EXECUTE: u8 = 0o1;

impl FileMode {
    /// Builds a mode from a three-digit octal value such as `0o755`
    pub fn from_octal(mode: u16) -> Self {
        Self {
            owner: ((mode >> 6) & 0o7) as u8,
            group: ((mode >> 3) & 0o7) as u8,
            all: (mode & 0o7) as u8,
        }
    }

    pub fn to_octal(&self) -> u16 {
        (u16::from(self.owner) << 6) | (u16::from(self.group) << 3) | u16::from(self.all)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssAttributes {
    /// Absolute path, e.g. `/u/ibmuser/file.txt`
    pub path: String,
    pub is_directory: bool,
    pub file_mode: Option<FileMode>,
    pub url: String,
    pub length: u64,
    pub uid: Option<u64>,
    pub owner: Option<String>,
    pub gid: Option<u64>,
    pub group: Option<String>,
    pub modification_time: Option<String>,
    pub symlink_target: Option<String>,
    pub content_mode: ContentMode,
    pub requesters: Vec<Requester>,
}

/// USS path separator
pub const USS_DELIMITER: &str = "/";

impl UssAttributes {
    /// Last path component; the root directory is named `/`
    pub fn name(&self) -> &str {
        self.path
            .rsplit(USS_DELIMITER)
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(USS_DELIMITER)
    }

    /// Path of the parent directory without the leading `/` (empty at top level)
    pub fn parent_dir_path(&self) -> String {
        let trimmed = self.path.trim_start_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => trimmed[..idx].to_string(),
            None => String::new(),
        }
    }

    pub fn is_symlink(&self) -> bool {
        self.symlink_target.is_some()
    }

    /// Permission digit applying to the requesting users
    ///
    /// The owner digit applies when any requester's connection user owns
    /// the file, otherwise the "all" digit.
    fn effective_mode(&self) -> Option<u8> {
        let mode = self.file_mode?;
        let owned = self.owner.as_deref().is_some_and(|owner| {
            self.requesters
                .iter()
                .any(|r| r.connection.user().eq_ignore_ascii_case(owner))
        });
        Some(if owned { mode.owner } else { mode.all })
    }

    pub fn is_writable(&self) -> bool {
        self.effective_mode()
            .is_some_and(|mode| mode & MODE_WRITE != 0)
    }

    pub fn is_readable(&self) -> bool {
        self.effective_mode().is_some_and(|mode| mode & MODE_READ != 0)
    }

    pub fn is_executable(&self) -> bool {
        self.effective_mode()
            .is_some_and(|mode| mode & MODE_EXECUTE != 0)
    }
}

// ============================================================================
// Jobs & spool files
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAttributes {
    pub job_id: String,
    pub job_name: String,
    pub owner: String,
    /// Execution phase name, e.g. `INPUT`, `ACTIVE`, `OUTPUT`
    pub phase: Option<String>,
    pub subsystem: Option<String>,
    pub return_code: Option<String>,
    pub url: String,
    pub requesters: Vec<Requester>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolFileAttributes {
    /// Handle of the owning job; named, not owned
    pub job: NodeId,
    pub id: u32,
    pub dd_name: String,
    pub step_name: Option<String>,
    pub proc_step: Option<String>,
    pub length: u64,
    pub content_mode: ContentMode,
    pub requesters: Vec<Requester>,
}

impl SpoolFileAttributes {
    /// Node name; spool ids disambiguate repeated DD names within one job
    pub fn name(&self) -> String {
        format!("{}_{}", self.dd_name, self.id)
    }
}

// ============================================================================
// DescriptorKey
// ============================================================================

/// Uniqueness key of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorKey {
    Dataset { url: String, name: String },
    Member { library: NodeId, name: String },
    Uss { url: String, path: String },
    Job { url: String, job_id: String },
    SpoolFile { job: NodeId, id: u32 },
}

impl Display for DescriptorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKey::Dataset { url, name } => write!(f, "{url}::{name}"),
            DescriptorKey::Member { library, name } => write!(f, "{library}({name})"),
            DescriptorKey::Uss { url, path } => write!(f, "{url}::{path}"),
            DescriptorKey::Job { url, job_id } => write!(f, "{url}::{job_id}"),
            DescriptorKey::SpoolFile { job, id } => write!(f, "{job}[{id}]"),
        }
    }
}

// ============================================================================
// RemoteDescriptor
// ============================================================================

/// Description of one remote entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteDescriptor {
    Dataset(DatasetAttributes),
    Member(MemberAttributes),
    Uss(UssAttributes),
    Job(JobAttributes),
    SpoolFile(SpoolFileAttributes),
}

impl RemoteDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            RemoteDescriptor::Dataset(_) => ResourceKind::Dataset,
            RemoteDescriptor::Member(_) => ResourceKind::Member,
            RemoteDescriptor::Uss(_) => ResourceKind::Uss,
            RemoteDescriptor::Job(_) => ResourceKind::Job,
            RemoteDescriptor::SpoolFile(_) => ResourceKind::SpoolFile,
        }
    }

    /// Name of the node this descriptor materializes as
    pub fn name(&self) -> String {
        match self {
            RemoteDescriptor::Dataset(ds) => ds.name.clone(),
            RemoteDescriptor::Member(m) => m.name.clone(),
            RemoteDescriptor::Uss(uss) => uss.name().to_string(),
            RemoteDescriptor::Job(job) => job.job_id.clone(),
            RemoteDescriptor::SpoolFile(spool) => spool.name(),
        }
    }

    pub fn length(&self) -> u64 {
        match self {
            RemoteDescriptor::Dataset(ds) => ds.length,
            RemoteDescriptor::Member(m) => m.length,
            RemoteDescriptor::Uss(uss) => uss.length,
            RemoteDescriptor::Job(_) => 0,
            RemoteDescriptor::SpoolFile(spool) => spool.length,
        }
    }

    pub fn content_mode(&self) -> ContentMode {
        match self {
            RemoteDescriptor::Dataset(ds) => ds.content_mode.clone(),
            RemoteDescriptor::Member(m) => m.content_mode.clone(),
            RemoteDescriptor::Uss(uss) => uss.content_mode.clone(),
            RemoteDescriptor::Job(_) => ContentMode::text(),
            RemoteDescriptor::SpoolFile(spool) => spool.content_mode.clone(),
        }
    }

    /// Connection url for top-level resources; dependents inherit their parent's
    pub fn url(&self) -> Option<&str> {
        match self {
            RemoteDescriptor::Dataset(ds) => Some(&ds.url),
            RemoteDescriptor::Uss(uss) => Some(&uss.url),
            RemoteDescriptor::Job(job) => Some(&job.url),
            RemoteDescriptor::Member(_) | RemoteDescriptor::SpoolFile(_) => None,
        }
    }

    pub fn requesters(&self) -> &[Requester] {
        match self {
            RemoteDescriptor::Dataset(ds) => &ds.requesters,
            RemoteDescriptor::Member(m) => &m.requesters,
            RemoteDescriptor::Uss(uss) => &uss.requesters,
            RemoteDescriptor::Job(job) => &job.requesters,
            RemoteDescriptor::SpoolFile(spool) => &spool.requesters,
        }
    }

    pub fn requesters_mut(&mut self) -> &mut Vec<Requester> {
        match self {
            RemoteDescriptor::Dataset(ds) => &mut ds.requesters,
            RemoteDescriptor::Member(m) => &mut m.requesters,
            RemoteDescriptor::Uss(uss) => &mut uss.requesters,
            RemoteDescriptor::Job(job) => &mut job.requesters,
            RemoteDescriptor::SpoolFile(spool) => &mut spool.requesters,
        }
    }

    /// Returns a copy of this descriptor without `requester`
    pub fn without_requester(&self, requester: &Requester) -> Self {
        let mut copy = self.clone();
        copy.requesters_mut().retain(|r| r != requester);
        copy
    }

    /// Handle of the parent resource for dependent descriptors
    pub fn parent_handle(&self) -> Option<NodeId> {
        match self {
            RemoteDescriptor::Member(m) => Some(m.library),
            RemoteDescriptor::SpoolFile(spool) => Some(spool.job),
            _ => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            RemoteDescriptor::Dataset(ds) => ds.organization.is_library(),
            RemoteDescriptor::Uss(uss) => uss.is_directory,
            RemoteDescriptor::Job(_) => true,
            RemoteDescriptor::Member(_) | RemoteDescriptor::SpoolFile(_) => false,
        }
    }

    /// Whether local edits of this resource may be written back
    pub fn is_writable(&self) -> bool {
        if self.content_mode().is_binary() {
            return false;
        }
        match self {
            RemoteDescriptor::Uss(uss) => uss.is_writable(),
            RemoteDescriptor::Dataset(ds) => !ds.migrated,
            RemoteDescriptor::Member(_) => true,
            RemoteDescriptor::Job(_) | RemoteDescriptor::SpoolFile(_) => false,
        }
    }

    pub fn unique_key(&self) -> DescriptorKey {
        match self {
            RemoteDescriptor::Dataset(ds) => DescriptorKey::Dataset {
                url: ds.url.clone(),
                name: ds.name.clone(),
            },
            RemoteDescriptor::Member(m) => DescriptorKey::Member {
                library: m.library,
                name: m.name.clone(),
            },
            RemoteDescriptor::Uss(uss) => DescriptorKey::Uss {
                url: uss.url.clone(),
                path: uss.path.clone(),
            },
            RemoteDescriptor::Job(job) => DescriptorKey::Job {
                url: job.url.clone(),
                job_id: job.job_id.clone(),
            },
            RemoteDescriptor::SpoolFile(spool) => DescriptorKey::SpoolFile {
                job: spool.job,
                id: spool.id,
            },
        }
    }

    /// Merges a freshly fetched descriptor into this one
    ///
    /// New field values win; requester lists are unioned with the existing
    /// requesters first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDescriptor` if the kinds differ.
    pub fn merge(&self, newer: &RemoteDescriptor) -> Result<RemoteDescriptor, DomainError> {
        if self.kind() != newer.kind() {
            return Err(DomainError::InvalidDescriptor(format!(
                "cannot merge {} into {}",
                newer.kind(),
                self.kind()
            )));
        }
        let mut merged = newer.clone();
        *merged.requesters_mut() = merge_requesters(self.requesters(), newer.requesters());
        Ok(merged)
    }
}

impl Display for RemoteDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.unique_key())
    }
}
