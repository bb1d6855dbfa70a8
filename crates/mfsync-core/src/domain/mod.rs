//! Domain entities and business logic
//!
//! This module contains the core domain types:
//! - Newtypes for node handles, record ids and connection ids
//! - Connections, listing queries and requesters
//! - Remote resource descriptors and their uniqueness keys
//! - Path chains locating descriptors in the virtual file tree
//! - Reconciliation decisions and outcomes
//! - Domain-specific error types

pub mod decision;
pub mod descriptor;
pub mod errors;
pub mod newtypes;
pub mod path_chain;
pub mod query;

// Re-export commonly used types
pub use decision::{SaveDecision, SyncOutcome};
pub use descriptor::{
    ContentMode, DataType, DatasetAttributes, DatasetOrganization, DescriptorKey, FileMode,
    JobAttributes, MemberAttributes, RemoteDescriptor, SpoolFileAttributes, UssAttributes,
};
pub use errors::DomainError;
pub use newtypes::*;
pub use path_chain::{PathAnchor, PathChain, PathSegment};
pub use query::{Connection, Query, QueryRequest, Requester, ResourceKind};
