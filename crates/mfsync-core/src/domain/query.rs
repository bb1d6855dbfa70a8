//! Connections, listing queries and requesters
//!
//! A [`Query`] is both the cache key of one remote listing and the source of
//! the [`Requester`] recorded on every descriptor that listing returns.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ConnectionId, NodeId};

/// Kinds of remote resources the core knows how to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Dataset,
    Member,
    Uss,
    Job,
    SpoolFile,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Dataset => "dataset",
            ResourceKind::Member => "member",
            ResourceKind::Uss => "uss",
            ResourceKind::Job => "job",
            ResourceKind::SpoolFile => "spool_file",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A remote connection profile as seen by the core
///
/// Credentials are not part of this type; the transport collaborator resolves
/// them from `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    id: ConnectionId,
    name: String,
    url: String,
    user: String,
}

impl Connection {
    /// Creates a connection after validating the url
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidUrl` if the url is blank or has no host part.
    pub fn new(
        id: ConnectionId,
        name: impl Into<String>,
        url: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let url = url.into();
        if host_segment(&url).is_empty() {
            return Err(DomainError::InvalidUrl(url));
        }
        Ok(Self {
            id,
            name: name.into(),
            url,
            user: user.into(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Name of the top-level tree folder for this connection
    pub fn host(&self) -> &str {
        host_segment(&self.url)
    }
}

/// Last `/`-separated segment of a url after its `scheme://` prefix,
/// ignoring trailing slashes
///
/// Empty when nothing follows the scheme.
pub fn host_segment(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let trimmed = rest.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

// ============================================================================
// QueryRequest
// ============================================================================

/// Parameters of one remote listing request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryRequest {
    /// Datasets matching a mask, optionally restricted to one volume
    DatasetMask { mask: String, volser: Option<String> },
    /// Members of a partitioned dataset already present in the tree
    Members { library: NodeId },
    /// Entries of a USS directory
    UssPath { path: String },
    /// Jobs filtered by owner/prefix, or a single job by id
    Jobs {
        owner: String,
        prefix: String,
        job_id: Option<String>,
    },
    /// Spool files of a job already present in the tree
    SpoolFiles { job: NodeId },
}

impl QueryRequest {
    /// The kind of resources this request lists
    pub fn kind(&self) -> ResourceKind {
        match self {
            QueryRequest::DatasetMask { .. } => ResourceKind::Dataset,
            QueryRequest::Members { .. } => ResourceKind::Member,
            QueryRequest::UssPath { .. } => ResourceKind::Uss,
            QueryRequest::Jobs { .. } => ResourceKind::Job,
            QueryRequest::SpoolFiles { .. } => ResourceKind::SpoolFile,
        }
    }
}

impl Display for QueryRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryRequest::DatasetMask { mask, volser } => match volser {
                Some(v) => write!(f, "datasets({mask} on {v})"),
                None => write!(f, "datasets({mask})"),
            },
            QueryRequest::Members { library } => write!(f, "members({library})"),
            QueryRequest::UssPath { path } => write!(f, "uss({path})"),
            QueryRequest::Jobs {
                owner,
                prefix,
                job_id,
            } => match job_id {
                Some(id) => write!(f, "jobs(id={id})"),
                None => write!(f, "jobs(owner={owner}, prefix={prefix})"),
            },
            QueryRequest::SpoolFiles { job } => write!(f, "spool({job})"),
        }
    }
}

// ============================================================================
// Query / Requester
// ============================================================================

/// Cache key of one remote listing: request parameters plus connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub connection: Connection,
    pub request: QueryRequest,
}

impl Query {
    pub fn new(connection: Connection, request: QueryRequest) -> Self {
        Self {
            connection,
            request,
        }
    }

    /// The requester identity this query contributes to fetched descriptors
    pub fn requester(&self) -> Requester {
        Requester {
            connection: self.connection.clone(),
            origin: self.request.clone(),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.request, self.connection.name())
    }
}

/// A (connection, originating query) pair depending on a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    pub connection: Connection,
    pub origin: QueryRequest,
}

impl Display for Requester {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.origin, self.connection.name())
    }
}

/// Unions two requester lists, keeping first-appearance order (left first)
pub fn merge_requesters(old: &[Requester], new: &[Requester]) -> Vec<Requester> {
    let mut merged = old.to_vec();
    for requester in new {
        if !merged.contains(requester) {
            merged.push(requester.clone());
        }
    }
    merged
}
