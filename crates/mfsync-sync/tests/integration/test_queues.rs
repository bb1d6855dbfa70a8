//! SyncQueues: per-file conflation, lifecycle and event following

use std::sync::Arc;
use std::time::Duration;

use mfsync_conflict::PreferRemoteStrategy;
use mfsync_core::config::ConfigBuilder;
use mfsync_core::domain::{DatasetOrganization, NodeId, RemoteDescriptor, SyncOutcome};
use mfsync_core::ports::IFileTree;
use mfsync_sync::{ContentSynchronizer, SyncError, SyncQueues, SynchronizerRegistry};

use crate::common::*;

fn queues_for(h: &Harness) -> (Arc<ContentSynchronizer>, Arc<SyncQueues>) {
    let sync = Arc::new(h.synchronizer(Arc::new(PreferRemoteStrategy)));
    let registry = SynchronizerRegistry::new().with(sync.clone());
    (sync, Arc::new(SyncQueues::new(registry, h.attributes.clone())))
}

fn register(h: &Harness, name: &str) -> NodeId {
    h.attributes
        .get_or_create(sequential(name, vec![requester(&connection("dev"))]))
        .unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

async fn assert_quiet(h: &mut Harness) {
    let next = tokio::time::timeout(Duration::from_millis(200), h.results.recv()).await;
    assert!(next.is_err(), "unexpected sync pass: {next:?}");
}

// ============================================================================
// Conflation & parallelism
// ============================================================================

#[tokio::test]
async fn triggers_during_a_pass_collapse_into_one() {
    let mut h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);
    let handle = register(&h, "HLQ.SEQ");
    h.transport.close_gate();

    queues.start_sync(handle).unwrap();
    wait_until(|| h.transport.fetch_count() == 1).await;
    for _ in 0..5 {
        assert!(queues.trigger_sync(handle));
    }
    h.transport.release(10);

    assert_eq!(h.next_result().await, (handle, Ok(SyncOutcome::InitialContent)));
    assert_eq!(h.next_result().await, (handle, Ok(SyncOutcome::Unchanged)));
    assert_quiet(&mut h).await;
    assert_eq!(h.transport.fetch_count(), 2);
}

#[tokio::test]
async fn different_files_run_in_parallel() {
    let mut h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);
    let first = register(&h, "HLQ.ONE");
    let second = register(&h, "HLQ.TWO");
    h.transport.close_gate();

    queues.start_sync(first).unwrap();
    queues.start_sync(second).unwrap();

    // Both passes are inside the transport at once.
    wait_until(|| h.transport.fetch_count() == 2).await;
    h.transport.release(2);

    let mut finished = vec![h.next_result().await.0, h.next_result().await.0];
    finished.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(finished, expected);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn start_sync_rejections() {
    let h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);

    assert!(matches!(
        queues.start_sync(NodeId::new(999)),
        Err(SyncError::MissingAttributes(_))
    ));

    let library = h
        .attributes
        .get_or_create(dataset(
            "HLQ.PDS",
            DatasetOrganization::Partitioned,
            vec![requester(&connection("dev"))],
        ))
        .unwrap();
    assert!(matches!(
        queues.start_sync(library),
        Err(SyncError::IsDirectory(_))
    ));

    let handle = register(&h, "HLQ.SEQ");
    queues.start_sync(handle).unwrap();
    assert!(matches!(
        queues.start_sync(handle),
        Err(SyncError::AlreadySynced(_))
    ));

    let gone = register(&h, "HLQ.GONE");
    h.tree.delete(gone).unwrap();
    assert!(matches!(
        queues.start_sync(gone),
        Err(SyncError::InvalidHandle(_))
    ));

    let empty = SyncQueues::new(SynchronizerRegistry::new(), h.attributes.clone());
    assert!(matches!(
        empty.start_sync(handle),
        Err(SyncError::NotAccepted(_))
    ));
}

#[tokio::test]
async fn remove_sync_stops_queue_and_forgets() {
    let mut h = Harness::new(b"ABC");
    let (sync, queues) = queues_for(&h);
    let handle = register(&h, "HLQ.SEQ");
    queues.start_sync(handle).unwrap();
    h.next_result().await;
    assert!(sync.was_synchronized(handle));

    assert!(queues.remove_sync(handle).await);

    assert!(!queues.is_synced(handle));
    assert!(!queues.trigger_sync(handle));
    assert!(!sync.was_synchronized(handle));
    assert!(!queues.remove_sync(handle).await);
}

#[tokio::test]
async fn shutdown_stops_everything() {
    let mut h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);
    let a = register(&h, "HLQ.A");
    let b = register(&h, "HLQ.B");
    queues.start_sync(a).unwrap();
    queues.start_sync(b).unwrap();
    h.next_result().await;
    h.next_result().await;

    queues.shutdown().await;

    assert_eq!(queues.synced_count(), 0);
    assert!(matches!(queues.start_sync(a), Err(SyncError::Cancelled(_))));
}

// ============================================================================
// Attribute events
// ============================================================================

fn resized(descriptor: RemoteDescriptor, length: u64) -> RemoteDescriptor {
    match descriptor {
        RemoteDescriptor::Dataset(mut ds) => {
            ds.length = length;
            RemoteDescriptor::Dataset(ds)
        }
        other => other,
    }
}

#[tokio::test]
async fn deleted_handle_removes_queue() {
    let mut h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);
    let _listener = queues.spawn_event_listener();
    let handle = register(&h, "HLQ.SEQ");
    queues.start_sync(handle).unwrap();
    h.next_result().await;

    h.attributes.clear(handle).unwrap();

    wait_until(|| !queues.is_synced(handle)).await;
    wait_until(|| h.storage.is_empty()).await;
}

#[tokio::test]
async fn updated_descriptor_triggers_pass() {
    let mut h = Harness::new(b"ABC");
    let (_, queues) = queues_for(&h);
    let _listener = queues.spawn_event_listener();
    let handle = register(&h, "HLQ.SEQ");
    queues.start_sync(handle).unwrap();
    h.next_result().await;

    let current = h.attributes.get_attributes(handle).unwrap();
    h.attributes.update(handle, resized(current, 80)).unwrap();

    assert_eq!(h.next_result().await, (handle, Ok(SyncOutcome::Unchanged)));
}

#[tokio::test]
async fn updates_ignored_without_auto_sync() {
    let mut h = Harness::new(b"ABC");
    let sync = Arc::new(h.synchronizer(Arc::new(PreferRemoteStrategy)));
    let queues = Arc::new(
        SyncQueues::new(SynchronizerRegistry::new().with(sync), h.attributes.clone())
            .with_config(&ConfigBuilder::new().sync_auto_sync(false).build().sync),
    );
    let _listener = queues.spawn_event_listener();
    let handle = register(&h, "HLQ.SEQ");
    queues.start_sync(handle).unwrap();
    h.next_result().await;

    let current = h.attributes.get_attributes(handle).unwrap();
    h.attributes.update(handle, resized(current, 80)).unwrap();

    assert_quiet(&mut h).await;
    assert!(queues.is_synced(handle));
}
