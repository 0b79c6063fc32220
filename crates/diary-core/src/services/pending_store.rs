//! Durable store of media operations not yet confirmed remotely.
//!
//! Two independent FIFO queues live in a local-only database: uploads and
//! deletes. Every write is committed before the call returns so a pending
//! operation survives process death. Cloned handles share one connection.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{Database, LibSqlQueueRepository, QueueRepository, Schema};
use crate::models::{NewPendingUpload, PendingDelete, PendingUpload, QueueCounts};
use crate::Result;

/// Thread-safe handle to the pending-operation tables.
#[derive(Clone)]
pub struct PendingOperationStore {
    db: Arc<Mutex<Database>>,
    delete_revision: Arc<watch::Sender<u64>>,
}

impl PendingOperationStore {
    /// Open the queue database at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&db_path, Schema::MediaQueue).await?;
        tracing::debug!("Opened media queue at {}", db_path.display());
        Ok(Self::from_database(db))
    }

    /// Open an in-memory queue (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory(Schema::MediaQueue).await?;
        Ok(Self::from_database(db))
    }

    fn from_database(db: Database) -> Self {
        let (delete_revision, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            delete_revision: Arc::new(delete_revision),
        }
    }

    /// Durably record an upload that has not been attempted yet.
    pub async fn enqueue_upload(&self, upload: NewPendingUpload) -> Result<PendingUpload> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let record = repo.insert_upload(&upload).await?;
        tracing::debug!(id = record.id, path = %record.remote_path, "Enqueued upload");
        Ok(record)
    }

    /// Insert or replace an upload by id.
    pub async fn put_upload(&self, upload: &PendingUpload) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.upsert_upload(upload).await
    }

    /// Replace the stored resume token of an upload.
    ///
    /// Returns `false` without writing when the upload has already been
    /// removed, so a late progress report cannot resurrect a finished record.
    pub async fn set_resume_token(&self, id: i64, token: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let Some(mut upload) = repo
            .list_uploads()
            .await?
            .into_iter()
            .find(|upload| upload.id == id)
        else {
            return Ok(false);
        };
        upload.resume_token = Some(token.to_string());
        repo.upsert_upload(&upload).await?;
        tracing::debug!(id, "Persisted resume token");
        Ok(true)
    }

    /// Pending uploads, oldest first.
    pub async fn list_uploads(&self) -> Result<Vec<PendingUpload>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_uploads().await
    }

    /// Forget an upload. Removing an unknown id is a no-op.
    pub async fn remove_upload(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.remove_upload(id).await
    }

    /// Durably record a remote object that must be deleted.
    pub async fn enqueue_delete(&self, remote_path: &str) -> Result<PendingDelete> {
        let record = {
            let db = self.db.lock().await;
            let repo = LibSqlQueueRepository::new(db.connection());
            repo.insert_delete(remote_path).await?
        };
        tracing::debug!(id = record.id, path = %record.remote_path, "Enqueued delete");
        self.delete_revision.send_modify(|revision| *revision += 1);
        Ok(record)
    }

    /// Insert or replace a delete by id.
    pub async fn put_delete(&self, delete: &PendingDelete) -> Result<()> {
        {
            let db = self.db.lock().await;
            let repo = LibSqlQueueRepository::new(db.connection());
            repo.upsert_delete(delete).await?;
        }
        self.delete_revision.send_modify(|revision| *revision += 1);
        Ok(())
    }

    /// Pending deletes, oldest first.
    pub async fn list_deletes(&self) -> Result<Vec<PendingDelete>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.list_deletes().await
    }

    /// Forget a delete. Removing an unknown id is a no-op.
    pub async fn remove_delete(&self, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.remove_delete(id).await
    }

    /// Live view of the delete queue.
    pub fn watch_deletes(&self) -> DeleteWatch {
        DeleteWatch {
            store: self.clone(),
            revision: self.delete_revision.subscribe(),
            primed: false,
        }
    }

    /// Number of records in each queue.
    pub async fn counts(&self) -> Result<QueueCounts> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.counts().await
    }
}

/// Yields a fresh FIFO snapshot of the delete queue each time a delete is
/// enqueued.
pub struct DeleteWatch {
    store: PendingOperationStore,
    revision: watch::Receiver<u64>,
    primed: bool,
}

impl DeleteWatch {
    /// The current snapshot on the first call; afterwards waits for the next
    /// enqueue before reading the queue again.
    pub async fn next(&mut self) -> Result<Vec<PendingDelete>> {
        if self.primed {
            // The store inside `self` keeps a sender alive, so this only
            // returns once a new delete was recorded.
            self.revision.changed().await.ok();
        } else {
            self.primed = true;
        }
        let _seen = *self.revision.borrow_and_update();
        self.store.list_deletes().await
    }
}
