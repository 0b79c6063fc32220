//! Retry driver for the pending media queues.
//!
//! Every attempt follows the same state machine: a record stays pending until
//! the remote client confirms success, then it is removed. Failures never
//! remove a record. There is no backoff and no scheduled retry; attempts
//! happen on startup drains, right after an enqueue, and whenever the live
//! delete view reports new work.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::models::{NewPendingUpload, PendingDelete, PendingUpload};
use crate::services::PendingOperationStore;
use crate::storage::{read_local_source, RemoteError, RemoteMediaClient, UploadProgress};
use crate::{Error, Result};

/// Which queue an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Upload,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Result of one attempt at a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Remote confirmed; the record has been removed.
    Succeeded,
    /// Remote failed; the record is still pending.
    Failed(RemoteError),
    /// The local image could not be read; the record is still pending.
    SourceUnavailable(String),
}

impl AttemptOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "done"),
            Self::Failed(error) => write!(f, "{error}"),
            Self::SourceUnavailable(reason) => write!(f, "local image unavailable: {reason}"),
        }
    }
}

/// What happened to one pending operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub id: i64,
    pub remote_path: String,
    pub outcome: AttemptOutcome,
}

/// Result of draining both queues once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub uploads: Vec<OperationReport>,
    pub deletes: Vec<OperationReport>,
}

impl DrainReport {
    pub fn operations(&self) -> impl Iterator<Item = &OperationReport> {
        self.deletes.iter().chain(&self.uploads)
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.uploads.len() + self.deletes.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.operations()
            .filter(|report| report.outcome.is_success())
            .count()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&OperationReport> {
        self.operations()
            .filter(|report| !report.outcome.is_success())
            .collect()
    }
}

/// Handle to an operation that was enqueued and is being attempted in the
/// background. Dropping it leaves the attempt running.
#[derive(Debug)]
pub struct ScheduledOperation {
    kind: OperationKind,
    id: i64,
    remote_path: String,
    task: JoinHandle<Result<OperationReport>>,
}

impl ScheduledOperation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Id of the durable record backing this operation.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the inline attempt to finish.
    pub async fn outcome(self) -> Result<OperationReport> {
        self.task
            .await
            .map_err(|error| Error::Storage(format!("media task failed: {error}")))?
    }
}

/// Attempts pending operations against a remote client.
pub struct RetryDriver<C> {
    store: PendingOperationStore,
    client: Arc<C>,
}

impl<C> Clone for RetryDriver<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: RemoteMediaClient> RetryDriver<C> {
    pub fn new(store: PendingOperationStore, client: C) -> Self {
        Self::with_shared_client(store, Arc::new(client))
    }

    pub const fn with_shared_client(store: PendingOperationStore, client: Arc<C>) -> Self {
        Self { store, client }
    }

    #[must_use]
    pub const fn store(&self) -> &PendingOperationStore {
        &self.store
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Try to upload one pending record.
    ///
    /// Every resume token the client reports is persisted before this
    /// returns. Only store failures are returned as `Err`.
    pub async fn attempt_upload(&self, upload: &PendingUpload) -> Result<AttemptOutcome> {
        let bytes = match read_local_source(&upload.local_source).await {
            Ok(bytes) => bytes,
            Err(error) => {
                let reason = match error {
                    Error::SourceUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(
                    id = upload.id,
                    path = %upload.remote_path,
                    "Pending upload has no readable source: {reason}"
                );
                return Ok(AttemptOutcome::SourceUnavailable(reason));
            }
        };

        let (progress, mut tokens) = UploadProgress::channel();
        let put = self.client.put(
            &upload.remote_path,
            bytes,
            upload.resume_token.clone(),
            progress,
        );
        let persist_tokens = async {
            // Ends once the client drops its progress handle
            while let Some(token) = tokens.recv().await {
                self.store.set_resume_token(upload.id, &token).await?;
            }
            Ok::<_, Error>(())
        };

        let (result, persisted) = tokio::join!(put, persist_tokens);
        persisted?;

        match result {
            Ok(()) => {
                self.store.remove_upload(upload.id).await?;
                tracing::debug!(id = upload.id, path = %upload.remote_path, "Upload confirmed");
                Ok(AttemptOutcome::Succeeded)
            }
            Err(error) => {
                tracing::warn!(
                    id = upload.id,
                    path = %upload.remote_path,
                    "Upload failed, keeping it pending: {error}"
                );
                Ok(AttemptOutcome::Failed(error))
            }
        }
    }

    /// Try to delete one pending remote object.
    pub async fn attempt_delete(&self, delete: &PendingDelete) -> Result<AttemptOutcome> {
        match self.client.delete(&delete.remote_path).await {
            Ok(()) => {
                self.store.remove_delete(delete.id).await?;
                tracing::debug!(id = delete.id, path = %delete.remote_path, "Delete confirmed");
                Ok(AttemptOutcome::Succeeded)
            }
            Err(error) => {
                tracing::warn!(
                    id = delete.id,
                    path = %delete.remote_path,
                    "Delete failed, keeping it pending: {error}"
                );
                Ok(AttemptOutcome::Failed(error))
            }
        }
    }

    /// Attempt every pending record once, oldest first within each queue.
    ///
    /// The two queues are drained concurrently.
    pub async fn drain(&self) -> Result<DrainReport> {
        let (uploads, deletes) = tokio::join!(self.drain_uploads(), self.drain_deletes());
        let report = DrainReport {
            uploads: uploads?,
            deletes: deletes?,
        };

        if report.attempted() > 0 {
            tracing::info!(
                attempted = report.attempted(),
                succeeded = report.succeeded(),
                "Drained media queues"
            );
        }
        Ok(report)
    }

    async fn drain_uploads(&self) -> Result<Vec<OperationReport>> {
        let mut reports = Vec::new();
        for upload in self.store.list_uploads().await? {
            reports.push(self.upload_report(&upload).await?);
        }
        Ok(reports)
    }

    async fn drain_deletes(&self) -> Result<Vec<OperationReport>> {
        let mut reports = Vec::new();
        for delete in self.store.list_deletes().await? {
            reports.push(self.delete_report(&delete).await?);
        }
        Ok(reports)
    }

    pub(crate) async fn upload_report(&self, upload: &PendingUpload) -> Result<OperationReport> {
        Ok(OperationReport {
            kind: OperationKind::Upload,
            id: upload.id,
            remote_path: upload.remote_path.clone(),
            outcome: self.attempt_upload(upload).await?,
        })
    }

    pub(crate) async fn delete_report(&self, delete: &PendingDelete) -> Result<OperationReport> {
        Ok(OperationReport {
            kind: OperationKind::Delete,
            id: delete.id,
            remote_path: delete.remote_path.clone(),
            outcome: self.attempt_delete(delete).await?,
        })
    }

    /// Durably enqueue an upload, then attempt it in the background.
    pub async fn schedule_upload(
        &self,
        local_source: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Result<ScheduledOperation> {
        let upload = self
            .store
            .enqueue_upload(NewPendingUpload::new(remote_path, local_source))
            .await?;

        let driver = self.clone();
        let record = upload.clone();
        let task = tokio::spawn(async move { driver.upload_report(&record).await });

        Ok(ScheduledOperation {
            kind: OperationKind::Upload,
            id: upload.id,
            remote_path: upload.remote_path,
            task,
        })
    }

    /// Durably enqueue a delete, then attempt it in the background.
    pub async fn schedule_delete(&self, remote_path: &str) -> Result<ScheduledOperation> {
        let delete = self.store.enqueue_delete(remote_path).await?;

        let driver = self.clone();
        let record = delete.clone();
        let task = tokio::spawn(async move { driver.delete_report(&record).await });

        Ok(ScheduledOperation {
            kind: OperationKind::Delete,
            id: delete.id,
            remote_path: delete.remote_path,
            task,
        })
    }

    /// Attempt pending deletes each time the delete queue changes, until
    /// `shutdown` resolves.
    ///
    /// The first pass covers whatever is pending when the watch starts. An
    /// attempt cut short by shutdown leaves its record pending.
    pub async fn watch_deletes(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut deletes = self.store.watch_deletes();
        tokio::pin!(shutdown);

        loop {
            let pass = async {
                let snapshot = deletes.next().await?;
                for delete in &snapshot {
                    self.attempt_delete(delete).await?;
                }
                Ok::<_, Error>(snapshot.len())
            };

            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!("Delete watcher stopped");
                    return Ok(());
                }
                attempted = pass => {
                    let attempted = attempted?;
                    if attempted > 0 {
                        tracing::debug!(attempted, "Processed pending deletes");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::storage::{InMemoryMediaClient, RemoteCall};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_photo(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn driver(client: InMemoryMediaClient) -> RetryDriver<InMemoryMediaClient> {
        let store = PendingOperationStore::open_in_memory().await.unwrap();
        RetryDriver::new(store, client)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_stays_pending_until_remote_confirms() {
        let tmp = tempdir().unwrap();
        let source = write_photo(tmp.path(), "foo.jpg");
        let client = InMemoryMediaClient::offline();
        let driver = driver(client.clone()).await;

        let upload = driver
            .store()
            .enqueue_upload(NewPendingUpload::new("images/u1/foo-123.jpg", &source))
            .await
            .unwrap();

        let outcome = driver.attempt_upload(&upload).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(_)));
        assert_eq!(driver.store().list_uploads().await.unwrap(), vec![upload.clone()]);

        client.set_offline(false);
        let outcome = driver.attempt_upload(&upload).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Succeeded);
        assert!(driver.store().list_uploads().await.unwrap().is_empty());
        assert_eq!(client.object("images/u1/foo-123.jpg"), Some(b"foo.jpg".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn startup_drain_attempts_each_leftover_once() {
        let tmp = tempdir().unwrap();
        let queue_path = tmp.path().join("media-queue.db");
        let source = write_photo(tmp.path(), "foo.jpg");

        {
            // First run: nothing reaches the remote
            let store = PendingOperationStore::open_path(&queue_path).await.unwrap();
            let driver = RetryDriver::new(store, InMemoryMediaClient::offline());
            driver
                .schedule_upload(&source, "images/u1/foo-123.jpg")
                .await
                .unwrap()
                .outcome()
                .await
                .unwrap();
            driver
                .schedule_delete("images/u1/old-1.jpg")
                .await
                .unwrap()
                .outcome()
                .await
                .unwrap();
        }

        let client = InMemoryMediaClient::new();
        let store = PendingOperationStore::open_path(&queue_path).await.unwrap();
        let driver = RetryDriver::new(store, client.clone());

        let report = driver.drain().await.unwrap();
        assert_eq!(report.uploads.len(), 1);
        assert_eq!(report.deletes.len(), 1);
        assert_eq!(report.succeeded(), 2);

        let mut calls = client.calls();
        calls.sort_by(|a, b| a.path().cmp(b.path()));
        assert_eq!(
            calls,
            vec![
                RemoteCall::Put {
                    path: "images/u1/foo-123.jpg".into(),
                    resume_token: None,
                },
                RemoteCall::Delete {
                    path: "images/u1/old-1.jpg".into()
                },
            ]
        );
        assert!(driver.store().counts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_delete_is_retained() {
        let client = InMemoryMediaClient::new();
        client.fail_path("images/u1/a.jpg");
        let driver = driver(client).await;

        let delete = driver.store().enqueue_delete("images/u1/a.jpg").await.unwrap();
        let outcome = driver.attempt_delete(&delete).await.unwrap();

        assert!(matches!(outcome, AttemptOutcome::Failed(RemoteError::Transient(_))));
        assert_eq!(driver.store().list_deletes().await.unwrap(), vec![delete]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_attempts_on_removed_records_are_harmless() {
        let tmp = tempdir().unwrap();
        let source = write_photo(tmp.path(), "a.jpg");
        let client = InMemoryMediaClient::new();
        client.script_token("late-token");
        let driver = driver(client).await;

        let upload = driver
            .store()
            .enqueue_upload(NewPendingUpload::new("images/u1/a.jpg", &source))
            .await
            .unwrap();
        let delete = driver.store().enqueue_delete("images/u1/b.jpg").await.unwrap();

        for _ in 0..2 {
            assert_eq!(
                driver.attempt_upload(&upload).await.unwrap(),
                AttemptOutcome::Succeeded
            );
            assert_eq!(
                driver.attempt_delete(&delete).await.unwrap(),
                AttemptOutcome::Succeeded
            );
        }

        assert!(driver.store().counts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_attempts_on_one_record_are_tolerated() {
        let driver = driver(InMemoryMediaClient::new()).await;
        let delete = driver.store().enqueue_delete("images/u1/a.jpg").await.unwrap();

        let (first, second) = tokio::join!(
            driver.attempt_delete(&delete),
            driver.attempt_delete(&delete)
        );

        assert!(first.unwrap().is_success());
        assert!(second.unwrap().is_success());
        assert!(driver.store().list_deletes().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_follows_enqueue_order_per_queue() {
        let tmp = tempdir().unwrap();
        let client = InMemoryMediaClient::new();
        let driver = driver(client.clone()).await;

        // Interleave the two queues
        for i in 0..4 {
            let source = write_photo(tmp.path(), &format!("{i}.jpg"));
            driver
                .store()
                .enqueue_upload(NewPendingUpload::new(format!("images/u1/up-{i}.jpg"), source))
                .await
                .unwrap();
            driver
                .store()
                .enqueue_delete(&format!("images/u1/del-{i}.jpg"))
                .await
                .unwrap();
        }

        let report = driver.drain().await.unwrap();
        assert_eq!(report.attempted(), 8);
        assert_eq!(report.succeeded(), 8);

        let calls = client.calls();
        let puts = calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::Put { .. }))
            .map(RemoteCall::path)
            .collect::<Vec<_>>();
        let deletes = calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::Delete { .. }))
            .map(RemoteCall::path)
            .collect::<Vec<_>>();

        assert_eq!(
            puts,
            vec![
                "images/u1/up-0.jpg",
                "images/u1/up-1.jpg",
                "images/u1/up-2.jpg",
                "images/u1/up-3.jpg"
            ]
        );
        assert_eq!(
            deletes,
            vec![
                "images/u1/del-0.jpg",
                "images/u1/del-1.jpg",
                "images/u1/del-2.jpg",
                "images/u1/del-3.jpg"
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_resumes_with_reported_token() {
        let tmp = tempdir().unwrap();
        let source = write_photo(tmp.path(), "big.jpg");
        let client = InMemoryMediaClient::new();
        client.script_token("session-42");
        client.fail_next(1);
        let driver = driver(client.clone()).await;

        let upload = driver
            .store()
            .enqueue_upload(NewPendingUpload::new("images/u1/big.jpg", &source))
            .await
            .unwrap();

        let outcome = driver.attempt_upload(&upload).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(_)));

        let pending = driver.store().list_uploads().await.unwrap();
        assert_eq!(pending[0].resume_token.as_deref(), Some("session-42"));

        driver.attempt_upload(&pending[0]).await.unwrap();
        assert_eq!(
            client.calls(),
            vec![
                RemoteCall::Put {
                    path: "images/u1/big.jpg".into(),
                    resume_token: None,
                },
                RemoteCall::Put {
                    path: "images/u1/big.jpg".into(),
                    resume_token: Some("session-42".into()),
                },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_source_keeps_record_pending() {
        let client = InMemoryMediaClient::new();
        let driver = driver(client.clone()).await;

        let upload = driver
            .store()
            .enqueue_upload(NewPendingUpload::new("images/u1/gone.jpg", "/definitely/missing.jpg"))
            .await
            .unwrap();

        let outcome = driver.attempt_upload(&upload).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::SourceUnavailable(_)));
        assert_eq!(driver.store().list_uploads().await.unwrap(), vec![upload]);
        assert!(client.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scheduled_operations_report_their_outcome() {
        let tmp = tempdir().unwrap();
        let source = write_photo(tmp.path(), "a.jpg");
        let client = InMemoryMediaClient::new();
        client.fail_path("images/u1/old.jpg");
        let driver = driver(client).await;

        let upload = driver
            .schedule_upload(&source, "images/u1/a.jpg")
            .await
            .unwrap();
        let delete = driver.schedule_delete("images/u1/old.jpg").await.unwrap();

        assert_eq!(upload.kind(), OperationKind::Upload);
        let upload = upload.outcome().await.unwrap();
        let delete = delete.outcome().await.unwrap();

        assert!(upload.outcome.is_success());
        assert!(matches!(delete.outcome, AttemptOutcome::Failed(_)));
        let pending = driver.store().list_deletes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].remote_path, "images/u1/old.jpg");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_watcher_reacts_to_new_records() {
        let client = InMemoryMediaClient::new();
        let driver = driver(client.clone()).await;
        driver.store().enqueue_delete("images/u1/first.jpg").await.unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let watcher = {
            let driver = driver.clone();
            tokio::spawn(async move {
                driver
                    .watch_deletes(async {
                        stopped.await.ok();
                    })
                    .await
            })
        };

        driver.store().enqueue_delete("images/u1/second.jpg").await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !driver.store().list_deletes().await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("watcher should drain both deletes");

        stop.send(()).unwrap();
        watcher.await.unwrap().unwrap();

        let paths = client
            .calls()
            .iter()
            .map(|call| call.path().to_string())
            .collect::<Vec<_>>();
        assert!(paths.contains(&"images/u1/first.jpg".to_string()));
        assert!(paths.contains(&"images/u1/second.jpg".to_string()));
    }
}
