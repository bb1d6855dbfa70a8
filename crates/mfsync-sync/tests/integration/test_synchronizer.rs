//! ContentSynchronizer reconciliation passes

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use mfsync_conflict::{DefaultSaveStrategy, FailOnConflictStrategy, PreferRemoteStrategy};
use mfsync_core::config::ConfigBuilder;
use mfsync_core::domain::{
    ContentMode, DatasetOrganization, JobAttributes, MemberAttributes, NodeId, RemoteDescriptor,
    SaveDecision, SpoolFileAttributes, SyncOutcome,
};
use mfsync_core::ports::{
    IContentStorage, IFileTree, INotificationService, Notification, ResourceLocator,
};
use mfsync_sync::{
    ContentSynchronizer, IContentSynchronizer, NotifyingListener, SyncError, SyncListener,
};

use crate::common::*;

fn default_strategy() -> (Arc<CountingPrompt>, Arc<DefaultSaveStrategy>) {
    let prompt = CountingPrompt::new(Some(SaveDecision::AcceptRemote));
    (prompt.clone(), Arc::new(DefaultSaveStrategy::new(prompt)))
}

fn register_dataset(h: &Harness, name: &str) -> NodeId {
    h.attributes
        .get_or_create(sequential(name, vec![requester(&connection("dev"))]))
        .unwrap()
}

// ============================================================================
// Baseline scenario
// ============================================================================

#[tokio::test]
async fn first_sync_then_noop_then_upload() {
    let h = Harness::new(b"ABC");
    let (prompt, strategy) = default_strategy();
    let sync = h.synchronizer(strategy);
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();

    // First pass: remote is authoritative.
    let outcome = sync.synchronize(handle, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::InitialContent);
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"ABC");
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"ABC");

    // Nothing changed on either side.
    let outcome = sync.synchronize(handle, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert!(h.transport.upload_payloads().is_empty());

    // Local edit, remote untouched: pushed without asking.
    h.tree.write_bytes(handle, b"ABD").unwrap();
    let outcome = sync.synchronize(handle, &cancel).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Uploaded);
    assert_eq!(h.transport.upload_payloads(), vec![b"ABD".to_vec()]);
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"ABD");
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"ABD");
    assert_eq!(prompt.calls(), 0);
    assert_eq!(h.transport.fetch_count(), 3);
}

#[tokio::test]
async fn diverged_remote_goes_through_strategy() {
    let h = Harness::new(b"ABC");
    let (prompt, strategy) = default_strategy();
    let sync = h.synchronizer(strategy);
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    sync.synchronize(handle, &cancel).await.unwrap();

    h.transport.set_remote(b"XYZ");
    h.tree.write_bytes(handle, b"ABD").unwrap();

    let outcome = sync.synchronize(handle, &cancel).await.unwrap();

    assert_eq!(outcome, SyncOutcome::AcceptedRemote);
    assert_eq!(prompt.calls(), 1);
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"XYZ");
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"XYZ");
    assert!(h.transport.upload_payloads().is_empty());
}

#[tokio::test]
async fn matching_local_refreshes_baseline() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(FailOnConflictStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    sync.synchronize(handle, &cancel).await.unwrap();

    // Both sides converged on the same content independently.
    h.transport.set_remote(b"XYZ");
    h.tree.write_bytes(handle, b"XYZ").unwrap();
    assert_eq!(
        sync.synchronize(handle, &cancel).await.unwrap(),
        SyncOutcome::Unchanged
    );
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"XYZ");

    // A later local edit is not a conflict.
    h.tree.write_bytes(handle, b"XYZ2").unwrap();
    assert_eq!(
        sync.synchronize(handle, &cancel).await.unwrap(),
        SyncOutcome::Uploaded
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn missing_attributes_fails() {
    let mut h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let err = sync
        .synchronize(NodeId::new(999), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MissingAttributes(_)));

    let (handle, result) = h.next_result().await;
    assert_eq!(handle, NodeId::new(999));
    assert!(result.is_err());
}

#[tokio::test]
async fn transport_failure_keeps_baseline() {
    let mut h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    sync.synchronize(handle, &cancel).await.unwrap();
    let _ = h.next_result().await;

    h.transport.fail_connection("dev");
    h.tree.write_bytes(handle, b"ABD").unwrap();
    let err = sync.synchronize(handle, &cancel).await.unwrap_err();

    assert!(matches!(err, SyncError::TransportFailure { .. }));
    assert!(err.is_retryable());
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"ABC");
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"ABD");
    assert!(h.next_result().await.1.is_err());

    // The next attempt retries from the same baseline.
    h.transport.heal();
    assert_eq!(
        sync.synchronize(handle, &cancel).await.unwrap(),
        SyncOutcome::Uploaded
    );
}

#[tokio::test]
async fn unresolved_conflict_touches_nothing() {
    let h = Harness::new(b"ABC");
    let prompt = CountingPrompt::new(None);
    let sync = h.synchronizer(Arc::new(DefaultSaveStrategy::new(prompt)));
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    sync.synchronize(handle, &cancel).await.unwrap();

    h.transport.set_remote(b"XYZ");
    h.tree.write_bytes(handle, b"ABD").unwrap();
    let err = sync.synchronize(handle, &cancel).await.unwrap_err();

    assert!(matches!(err, SyncError::ConflictUnresolved { .. }));
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"ABD");
    assert_eq!(h.transport.remote(), b"XYZ");
    assert_eq!(sync.successful_content(handle).await.unwrap(), b"ABC");
}

#[tokio::test]
async fn cancelled_pass_creates_no_record() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = sync.synchronize(handle, &cancel).await.unwrap_err();

    assert!(matches!(err, SyncError::Cancelled(_)));
    assert!(!sync.was_synchronized(handle));
    assert_eq!(h.tree.read_bytes(handle).unwrap(), b"");
    assert_eq!(h.storage.len(), 0);
}

// ============================================================================
// Connections
// ============================================================================

#[tokio::test]
async fn falls_back_to_next_requester() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let primary = connection("primary");
    let backup = connection("backup");
    let handle = h
        .attributes
        .get_or_create(sequential(
            "HLQ.SEQ",
            vec![requester(&primary), requester(&backup)],
        ))
        .unwrap();
    h.transport.fail_connection("primary");

    let outcome = sync
        .synchronize(handle, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::InitialContent);
    let via: Vec<String> = h
        .transport
        .fetched_via
        .lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(via, vec!["primary".to_string(), "backup".to_string()]);
}

#[tokio::test]
async fn member_uses_library_connections() {
    let h = Harness::new(b"MEMBER");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let library = h
        .attributes
        .get_or_create(dataset(
            "HLQ.PDS",
            DatasetOrganization::Partitioned,
            vec![requester(&connection("lib"))],
        ))
        .unwrap();
    let member = h
        .attributes
        .get_or_create(RemoteDescriptor::Member(MemberAttributes {
            name: "MEM1".to_string(),
            library,
            length: 6,
            modified: None,
            content_mode: ContentMode::text(),
            requesters: vec![],
        }))
        .unwrap();

    assert!(sync.accepts(member));
    assert!(!sync.accepts(library));
    sync.synchronize(member, &CancellationToken::new())
        .await
        .unwrap();

    let via = h.transport.fetched_via.lock().unwrap().clone();
    assert_eq!(
        via,
        vec![(
            "lib".to_string(),
            ResourceLocator::Member {
                library: "HLQ.PDS".to_string(),
                member: "MEM1".to_string(),
            }
        )]
    );
}

#[tokio::test]
async fn spool_edits_are_discarded() {
    let h = Harness::new(b"JES LOG");
    let sync = h.synchronizer(Arc::new(mfsync_conflict::PreferLocalStrategy));
    let job = h
        .attributes
        .get_or_create(RemoteDescriptor::Job(JobAttributes {
            job_id: "JOB00042".to_string(),
            job_name: "BUILD".to_string(),
            owner: "IBMUSER".to_string(),
            phase: Some("OUTPUT".to_string()),
            subsystem: Some("JES2".to_string()),
            return_code: Some("CC 0000".to_string()),
            url: URL.to_string(),
            requesters: vec![requester(&connection("dev"))],
        }))
        .unwrap();
    let spool = h
        .attributes
        .get_or_create(RemoteDescriptor::SpoolFile(SpoolFileAttributes {
            job,
            id: 2,
            dd_name: "JESMSGLG".to_string(),
            step_name: None,
            proc_step: None,
            length: 7,
            content_mode: ContentMode::text(),
            requesters: vec![],
        }))
        .unwrap();
    let cancel = CancellationToken::new();
    sync.synchronize(spool, &cancel).await.unwrap();

    h.tree.write_bytes(spool, b"edited").unwrap();
    let outcome = sync.synchronize(spool, &cancel).await.unwrap();

    assert_eq!(outcome, SyncOutcome::AcceptedRemote);
    assert_eq!(h.tree.read_bytes(spool).unwrap(), b"JES LOG");
    assert!(h.transport.upload_payloads().is_empty());
}

// ============================================================================
// Per-file state
// ============================================================================

#[tokio::test]
async fn upload_needed_tracking() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");

    assert!(!sync.is_upload_needed(handle));
    sync.mark_content_changed(handle);
    assert!(sync.is_upload_needed(handle));
    sync.mark_not_needed(handle);
    assert!(!sync.is_upload_needed(handle));

    sync.mark_content_changed(handle);
    sync.synchronize(handle, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!sync.is_upload_needed(handle));
}

#[tokio::test]
async fn forget_drops_record() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");
    sync.synchronize(handle, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(h.storage.len(), 1);

    sync.forget(handle).await;

    assert!(!sync.was_synchronized(handle));
    assert_eq!(h.storage.len(), 0);
    assert!(sync.successful_content(handle).await.unwrap().is_empty());
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
struct CollectingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl INotificationService for CollectingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[tokio::test]
async fn notifying_listener_reports_failures() {
    let h = Harness::new(b"ABC");
    let notifier = Arc::new(CollectingNotifier::default());
    let listener = NotifyingListener::new(notifier.clone(), h.tree.clone());
    let sync: ContentSynchronizer = h
        .synchronizer(Arc::new(PreferRemoteStrategy))
        .with_listener(Arc::new(listener));
    let handle = register_dataset(&h, "HLQ.SEQ");
    h.transport.fail_connection("dev");

    let _ = sync.synchronize(handle, &CancellationToken::new()).await;

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].title.contains("HLQ.SEQ"));
    assert_eq!(sent[0].category, "sync");
}

#[tokio::test]
async fn disabled_notifying_listener_stays_quiet() {
    let h = Harness::new(b"ABC");
    let notifier = Arc::new(CollectingNotifier::default());
    let config = ConfigBuilder::new().sync_notify_on_failure(false).build();
    let listener = NotifyingListener::new(notifier.clone(), h.tree.clone()).with_config(&config.sync);

    listener
        .on_failure(NodeId::new(5), &SyncError::NoConnection(NodeId::new(5)))
        .await;

    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_pass_is_not_notified() {
    let h = Harness::new(b"ABC");
    let notifier = Arc::new(CollectingNotifier::default());
    let listener = NotifyingListener::new(notifier.clone(), h.tree.clone());
    let sync: ContentSynchronizer = h
        .synchronizer(Arc::new(PreferRemoteStrategy))
        .with_listener(Arc::new(listener));
    let handle = register_dataset(&h, "HLQ.SEQ");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = sync.synchronize(handle, &cancel).await;

    assert!(matches!(result, Err(SyncError::Cancelled(_))));
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn storage_is_only_written_on_success() {
    let h = Harness::new(b"ABC");
    let sync = h.synchronizer(Arc::new(PreferRemoteStrategy));
    let handle = register_dataset(&h, "HLQ.SEQ");
    h.transport.fail_connection("dev");

    assert!(sync
        .synchronize(handle, &CancellationToken::new())
        .await
        .is_err());

    assert_eq!(h.storage.len(), 0);
    assert!(h
        .storage
        .read(mfsync_core::domain::RecordId::new(1))
        .await
        .is_err());
}
