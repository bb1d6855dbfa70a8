//! Query-scoped fetch/cache provider
//!
//! Each [`Query`] owns one cache entry: the handles its latest listing
//! produced. A reload materializes the new listing first and only then
//! retires handles that dropped out of it, so a resource that moved between
//! two listings is reassigned in place instead of being deleted and
//! recreated.
//!
//! A reload pages through the listing until it is complete or every
//! previously cached resource has been seen again, so handles added by
//! [`FetchProvider::load_more`] are never mistaken for vanished ones.
//!
//! Failed reloads leave the previous handle set in place (stale but valid),
//! record the error message, and publish `FetchFailed` plus an empty
//! `CacheUpdated` so observers know the refresh did not succeed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use mfsync_core::config::FetchConfig;
use mfsync_core::domain::{DescriptorKey, NodeId, Query, QueryRequest, RemoteDescriptor, Requester};
use mfsync_core::events::CacheEvent;
use mfsync_core::ports::{IRemoteTransport, ListRequest, ListTarget, RawItem};
use mfsync_vfs::{AttributesService, MutationHandle};

use crate::cleanup::{self, CleanupOutcome};
use crate::convert::{parent_of, to_descriptor};
use crate::FetchError;

/// Default number of items requested per listing call
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Freshness of one query's cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Fetched,
    /// The latest reload failed with this message
    Error(String),
}

#[derive(Debug, Clone)]
struct QueryMeta {
    state: CacheState,
    last_refreshed: Option<DateTime<Utc>>,
    /// Name of the last listed item, resumes batched listings
    cursor: Option<String>,
    /// The last listing returned fewer items than a full batch
    complete: bool,
}

/// One listing call's result, reduced to what the cache keeps
struct Listing {
    descriptors: Vec<RemoteDescriptor>,
    cursor: Option<String>,
    complete: bool,
}

pub struct FetchProvider {
    attributes: Arc<AttributesService>,
    transport: Arc<dyn IRemoteTransport>,
    mutations: MutationHandle,
    batch_size: u32,
    cache: DashMap<Query, Vec<NodeId>>,
    meta: DashMap<Query, QueryMeta>,
}

impl FetchProvider {
    pub fn new(
        attributes: Arc<AttributesService>,
        transport: Arc<dyn IRemoteTransport>,
        mutations: MutationHandle,
    ) -> Self {
        Self {
            attributes,
            transport,
            mutations,
            batch_size: DEFAULT_BATCH_SIZE,
            cache: DashMap::new(),
            meta: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: &FetchConfig) -> Self {
        self.batch_size = config.batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    // ========================================================================
    // Cache reads
    // ========================================================================

    /// Cached handles of `query`, without touching the remote side
    ///
    /// Handles whose nodes were deleted since the listing are left out.
    pub fn get_cached(&self, query: &Query) -> Option<Vec<NodeId>> {
        let handles = self.cache.get(query)?;
        Some(
            handles
                .iter()
                .copied()
                .filter(|h| self.attributes.is_valid(*h))
                .collect(),
        )
    }

    /// Whether the latest reload of `query` succeeded
    pub fn is_cache_valid(&self, query: &Query) -> bool {
        self.meta
            .get(query)
            .is_some_and(|m| m.state == CacheState::Fetched)
    }

    pub fn fetch_error_message(&self, query: &Query) -> Option<String> {
        self.meta.get(query).and_then(|m| match &m.state {
            CacheState::Error(message) => Some(message.clone()),
            CacheState::Fetched => None,
        })
    }

    pub fn last_refreshed(&self, query: &Query) -> Option<DateTime<Utc>> {
        self.meta.get(query).and_then(|m| m.last_refreshed)
    }

    /// Whether [`FetchProvider::load_more`] may return further items
    pub fn has_more(&self, query: &Query) -> bool {
        self.meta
            .get(query)
            .is_some_and(|m| m.state == CacheState::Fetched && !m.complete)
    }

    pub fn cached_queries(&self) -> Vec<Query> {
        self.cache.iter().map(|e| e.key().clone()).collect()
    }

    // ========================================================================
    // Reloads
    // ========================================================================

    pub async fn get_cached_or_reload(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FetchError> {
        match self.get_cached(query) {
            Some(handles) => Ok(handles),
            None => self.force_reload(query, cancel).await,
        }
    }

    /// Lists `query` remotely and reconciles its cache entry with the result
    pub async fn force_reload(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FetchError> {
        info!(query = %query, "Reloading query");
        let result = self.reload(query, cancel).await;
        if let Err(e) = &result {
            self.record_failure(query, e);
        }
        result
    }

    async fn reload(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FetchError> {
        let previous = self
            .cache
            .get(query)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let listing = self.list_covering(query, &previous, cancel).await?;

        let attributes = Arc::clone(&self.attributes);
        let requester = query.requester();
        let descriptors = listing.descriptors;
        let (handles, deleted) = self
            .mutations
            .run(move || apply_listing(&attributes, descriptors, &previous, &requester))
            .await?;

        self.cache.insert(query.clone(), handles.clone());
        self.meta.insert(
            query.clone(),
            QueryMeta {
                state: CacheState::Fetched,
                last_refreshed: Some(Utc::now()),
                cursor: listing.cursor,
                complete: listing.complete,
            },
        );

        info!(query = %query, count = handles.len(), "Query reloaded");
        self.publish_updated(query, handles.clone());
        self.republish_colliding(query, &handles);
        for parent in deleted {
            self.clean_dependents(parent);
        }
        Ok(handles)
    }

    /// Appends the next batch of `query`'s listing to its cache entry
    ///
    /// Reloads from scratch when nothing is cached yet. No cleanup happens:
    /// a batch only ever adds handles.
    pub async fn load_more(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FetchError> {
        let meta = self.meta.get(query).map(|m| m.clone());
        let meta = match meta {
            Some(meta) if self.cache.contains_key(query) => meta,
            _ => return self.force_reload(query, cancel).await,
        };
        if meta.complete {
            trace!(query = %query, "Listing already complete");
            return Ok(self.get_cached(query).unwrap_or_default());
        }

        let result = self.append_batch(query, meta, cancel).await;
        if let Err(e) = &result {
            self.record_failure(query, e);
        }
        result
    }

    async fn append_batch(
        &self,
        query: &Query,
        meta: QueryMeta,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeId>, FetchError> {
        let listing = self.list(query, meta.cursor.clone(), cancel).await?;

        let attributes = Arc::clone(&self.attributes);
        let descriptors = listing.descriptors;
        let added = self
            .mutations
            .run(move || materialize(&attributes, descriptors))
            .await?;

        let mut handles = self
            .cache
            .get(query)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut seen: HashSet<NodeId> = handles.iter().copied().collect();
        for handle in added {
            if seen.insert(handle) {
                handles.push(handle);
            }
        }

        self.cache.insert(query.clone(), handles.clone());
        self.meta.insert(
            query.clone(),
            QueryMeta {
                state: CacheState::Fetched,
                last_refreshed: Some(Utc::now()),
                cursor: listing.cursor.or(meta.cursor),
                complete: listing.complete,
            },
        );

        debug!(query = %query, count = handles.len(), "Loaded next batch");
        self.publish_updated(query, handles.clone());
        Ok(handles)
    }

    /// Drops `query`'s cache entry without touching remote state
    pub fn clean_cache(&self, query: &Query) {
        self.cache.remove(query);
        self.meta.remove(query);
        debug!(query = %query, "Cache cleaned");

        let events = self.attributes.events();
        events.publish_cache(CacheEvent::CacheCleaned {
            query: query.clone(),
        });
        self.publish_updated(query, Vec::new());
    }

    /// Drops the cache entries of member and spool listings under `parent`
    pub fn clean_dependents(&self, parent: NodeId) {
        let dependents: Vec<Query> = self
            .cache
            .iter()
            .filter(|e| parent_of(&e.key().request) == Some(parent))
            .map(|e| e.key().clone())
            .collect();
        for query in dependents {
            self.clean_cache(&query);
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn list_target(&self, query: &Query) -> Result<ListTarget, FetchError> {
        let target = match &query.request {
            QueryRequest::DatasetMask { mask, volser } => ListTarget::Datasets {
                mask: mask.clone(),
                volser: volser.clone(),
            },
            QueryRequest::Members { library } => match self.attributes.get_attributes(*library) {
                Some(RemoteDescriptor::Dataset(ds)) => ListTarget::Members { library: ds.name },
                _ => return Err(FetchError::MissingParent(*library)),
            },
            QueryRequest::UssPath { path } => ListTarget::UssDirectory { path: path.clone() },
            QueryRequest::Jobs {
                owner,
                prefix,
                job_id,
            } => ListTarget::Jobs {
                owner: owner.clone(),
                prefix: prefix.clone(),
                job_id: job_id.clone(),
            },
            QueryRequest::SpoolFiles { job } => match self.attributes.get_attributes(*job) {
                Some(RemoteDescriptor::Job(j)) => ListTarget::SpoolFiles {
                    job_name: j.job_name,
                    job_id: j.job_id,
                },
                _ => return Err(FetchError::MissingParent(*job)),
            },
        };
        Ok(target)
    }

    /// Pages through `query`'s listing until it is complete or every
    /// resource behind `previous` has been listed again
    ///
    /// Items repeated across pages (some servers resend the `start` item)
    /// are kept once.
    async fn list_covering(
        &self,
        query: &Query,
        previous: &[NodeId],
        cancel: &CancellationToken,
    ) -> Result<Listing, FetchError> {
        let mut pending: HashSet<DescriptorKey> = previous
            .iter()
            .filter_map(|h| self.attributes.get_attributes(*h))
            .map(|d| d.unique_key())
            .collect();
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page = self.list(query, start.clone(), cancel).await?;
            for descriptor in page.descriptors {
                let key = descriptor.unique_key();
                pending.remove(&key);
                if seen.insert(key) {
                    descriptors.push(descriptor);
                }
            }

            let advanced = page.cursor.is_some() && page.cursor != start;
            if page.complete || !advanced {
                return Ok(Listing {
                    descriptors,
                    cursor: page.cursor.or(start),
                    complete: true,
                });
            }
            if pending.is_empty() {
                return Ok(Listing {
                    descriptors,
                    cursor: page.cursor,
                    complete: false,
                });
            }
            trace!(query = %query, pending = pending.len(), "Listing next page");
            start = page.cursor;
        }
    }

    async fn list(
        &self,
        query: &Query,
        start: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Listing, FetchError> {
        let request = ListRequest {
            target: self.list_target(query)?,
            start,
            max_items: Some(self.batch_size),
        };

        let items: Vec<RawItem> = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled(query.to_string())),
            r = self.transport.list_resources(&query.connection, &request, cancel) => {
                r.map_err(|source| FetchError::TransportFailure {
                    query: query.to_string(),
                    source,
                })?
            }
        };

        // Nothing is applied once the caller gave up.
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled(query.to_string()));
        }

        let complete = items.len() < self.batch_size as usize;
        let cursor = items.last().map(RawItem::cursor_name);
        let descriptors = items
            .into_iter()
            .filter_map(|item| to_descriptor(query, item))
            .collect();

        Ok(Listing {
            descriptors,
            cursor,
            complete,
        })
    }

    fn record_failure(&self, query: &Query, error: &FetchError) {
        let message = error.to_string();
        warn!(query = %query, error = %message, "Reload failed, keeping previous listing");

        self.meta
            .entry(query.clone())
            .and_modify(|m| m.state = CacheState::Error(message.clone()))
            .or_insert_with(|| QueryMeta {
                state: CacheState::Error(message.clone()),
                last_refreshed: None,
                cursor: None,
                complete: false,
            });

        self.attributes.events().publish_cache(CacheEvent::FetchFailed {
            query: query.clone(),
            message,
        });
        self.publish_updated(query, Vec::new());
    }

    fn publish_updated(&self, query: &Query, handles: Vec<NodeId>) {
        self.attributes
            .events()
            .publish_cache(CacheEvent::CacheUpdated {
                query: query.clone(),
                handles,
            });
    }

    /// Re-publishes other cached queries sharing handles with `handles`
    fn republish_colliding(&self, query: &Query, handles: &[NodeId]) {
        let reloaded: HashSet<NodeId> = handles.iter().copied().collect();
        let colliding: Vec<(Query, Vec<NodeId>)> = self
            .cache
            .iter()
            .filter(|e| e.key() != query && e.value().iter().any(|h| reloaded.contains(h)))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for (other, other_handles) in colliding {
            trace!(query = %query, other = %other, "Re-publishing colliding query");
            self.publish_updated(&other, other_handles);
        }
    }
}

/// Registers every descriptor, skipping the ones that cannot be placed
///
/// A bad item (e.g. a name that is not a valid node name) is logged and left
/// out; the rest of the listing still applies.
fn materialize(attributes: &AttributesService, descriptors: Vec<RemoteDescriptor>) -> Vec<NodeId> {
    let mut handles = Vec::with_capacity(descriptors.len());
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        match attributes.get_or_create(descriptor) {
            Ok(handle) => {
                if seen.insert(handle) {
                    handles.push(handle);
                }
            }
            Err(e) => warn!(error = %e, "Skipping listing item"),
        }
    }
    handles
}

/// Materializes a listing and retires the handles it no longer contains
///
/// Returns the listing's handles and the stale handles that were deleted.
fn apply_listing(
    attributes: &AttributesService,
    descriptors: Vec<RemoteDescriptor>,
    previous: &[NodeId],
    requester: &Requester,
) -> (Vec<NodeId>, Vec<NodeId>) {
    let handles = materialize(attributes, descriptors);
    let seen: HashSet<NodeId> = handles.iter().copied().collect();

    let mut deleted = Vec::new();
    for &stale in previous.iter().filter(|h| !seen.contains(h)) {
        match cleanup::retire(attributes, stale, requester) {
            Ok(CleanupOutcome::Deleted) => deleted.push(stale),
            Ok(outcome) => trace!(handle = %stale, outcome = ?outcome, "Stale handle retired"),
            Err(e) => warn!(handle = %stale, error = %e, "Failed to retire stale handle"),
        }
    }

    (handles, deleted)
}
