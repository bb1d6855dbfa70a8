//! Listing items → remote descriptors
//!
//! Every descriptor produced for a query carries that query as its only
//! requester; the attributes service unions it with earlier requesters.

use mfsync_core::domain::{
    ContentMode, DatasetAttributes, JobAttributes, MemberAttributes, NodeId, Query, QueryRequest,
    RemoteDescriptor, SpoolFileAttributes, UssAttributes,
};
use mfsync_core::ports::RawItem;
use tracing::warn;

const USS_CURRENT_DIR: &str = ".";
const USS_PARENT_DIR: &str = "..";

/// Converts one listing item of `query`
///
/// Returns `None` for items that do not become nodes (the `..` entry of a
/// USS listing, or an item of a kind the query does not list).
pub fn to_descriptor(query: &Query, item: RawItem) -> Option<RemoteDescriptor> {
    let requesters = vec![query.requester()];
    let url = query.connection.url().to_string();

    match (&query.request, item) {
        (QueryRequest::DatasetMask { .. }, RawItem::Dataset(ds)) => {
            Some(RemoteDescriptor::Dataset(DatasetAttributes {
                name: ds.name,
                volser: if ds.migrated { None } else { ds.volser },
                organization: ds.organization,
                record_format: ds.record_format,
                record_length: ds.record_length,
                migrated: ds.migrated,
                length: ds.size.unwrap_or(0),
                url,
                content_mode: ContentMode::text(),
                requesters,
            }))
        }
        (QueryRequest::Members { library }, RawItem::Member(member)) => {
            Some(RemoteDescriptor::Member(MemberAttributes {
                name: member.name,
                library: *library,
                length: member.size.unwrap_or(0),
                modified: member.modified,
                content_mode: ContentMode::text(),
                requesters,
            }))
        }
        (QueryRequest::UssPath { path }, RawItem::Uss(entry)) => {
            let full_path = match entry.name.as_str() {
                USS_PARENT_DIR => return None,
                USS_CURRENT_DIR => path.clone(),
                name => join_uss_path(path, name),
            };
            Some(RemoteDescriptor::Uss(UssAttributes {
                path: full_path,
                is_directory: entry.is_directory,
                file_mode: entry.mode,
                url,
                length: entry.size.unwrap_or(0),
                uid: entry.uid,
                owner: entry.user,
                gid: entry.gid,
                group: entry.group,
                modification_time: entry.modified,
                symlink_target: entry.target,
                content_mode: ContentMode::text(),
                requesters,
            }))
        }
        (QueryRequest::Jobs { .. }, RawItem::Job(job)) => Some(RemoteDescriptor::Job(JobAttributes {
            job_id: job.job_id,
            job_name: job.job_name,
            owner: job.owner,
            phase: job.phase,
            subsystem: job.subsystem,
            return_code: job.return_code,
            url,
            requesters,
        })),
        (QueryRequest::SpoolFiles { job }, RawItem::Spool(spool)) => {
            Some(RemoteDescriptor::SpoolFile(SpoolFileAttributes {
                job: *job,
                id: spool.id,
                dd_name: spool.dd_name,
                step_name: spool.step_name,
                proc_step: spool.proc_step,
                length: spool.record_count.unwrap_or(0),
                content_mode: if spool.binary {
                    ContentMode::binary()
                } else {
                    ContentMode::text()
                },
                requesters,
            }))
        }
        (request, item) => {
            warn!(query = %request, item = item.cursor_name(), "Skipping listing item of unexpected kind");
            None
        }
    }
}

/// Handle of the resource a dependent query lists, if any
pub fn parent_of(request: &QueryRequest) -> Option<NodeId> {
    match request {
        QueryRequest::Members { library } => Some(*library),
        QueryRequest::SpoolFiles { job } => Some(*job),
        _ => None,
    }
}

fn join_uss_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    format!("{dir}/{name}")
}
