//! Type-specific cleanup of handles that vanished from a listing

use mfsync_core::domain::{NodeId, Requester, ResourceKind};
use mfsync_vfs::{AttributesService, VfsError};
use tracing::{debug, trace};

/// How a resource that left a listing is retired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Drop the query's requester; delete once no requester remains
    RequesterScoped,
    /// The listing owns the resource outright (members, spool files)
    ParentScoped,
}

impl CleanupPolicy {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Member | ResourceKind::SpoolFile => CleanupPolicy::ParentScoped,
            ResourceKind::Dataset | ResourceKind::Uss | ResourceKind::Job => {
                CleanupPolicy::RequesterScoped
            }
        }
    }
}

/// What cleanup did to one handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    RequesterRemoved,
    /// The handle was already unregistered or its node deleted
    AlreadyGone,
}

/// Retires `handle` on behalf of the query identified by `requester`
pub fn retire(
    attributes: &AttributesService,
    handle: NodeId,
    requester: &Requester,
) -> Result<CleanupOutcome, VfsError> {
    let Some(descriptor) = attributes.get_attributes(handle) else {
        trace!(handle = %handle, "Stale handle already unregistered");
        return Ok(CleanupOutcome::AlreadyGone);
    };

    let remaining = descriptor.without_requester(requester);
    let delete = match CleanupPolicy::for_kind(descriptor.kind()) {
        CleanupPolicy::ParentScoped => true,
        CleanupPolicy::RequesterScoped => remaining.requesters().is_empty(),
    };

    if delete {
        return clear(attributes, handle);
    }

    match attributes.update(handle, remaining) {
        Ok(()) => {
            debug!(handle = %handle, requester = %requester, "Requester removed");
            Ok(CleanupOutcome::RequesterRemoved)
        }
        Err(VfsError::StaleHandle(_)) => {
            clear(attributes, handle)?;
            Ok(CleanupOutcome::AlreadyGone)
        }
        Err(VfsError::NotRegistered(_)) => Ok(CleanupOutcome::AlreadyGone),
        Err(e) => Err(e),
    }
}

fn clear(attributes: &AttributesService, handle: NodeId) -> Result<CleanupOutcome, VfsError> {
    match attributes.clear(handle) {
        Ok(()) => {
            debug!(handle = %handle, "Handle deleted");
            Ok(CleanupOutcome::Deleted)
        }
        Err(VfsError::NotRegistered(_)) => Ok(CleanupOutcome::AlreadyGone),
        Err(e) => Err(e),
    }
}
