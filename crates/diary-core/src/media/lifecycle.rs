//! Keeps remote photos in step with the entries that reference them.
//!
//! Saving an entry turns the difference between its old and new image lists
//! into pending deletes and uploads. Every record is committed before any
//! network call starts; the calls then run in one background task, deletes
//! first.

use std::collections::HashSet;

use tokio::task::JoinHandle;

use super::driver::{OperationReport, RetryDriver};
use crate::models::{GalleryImage, NewPendingUpload, PendingDelete, PendingUpload};
use crate::storage::RemoteMediaClient;
use crate::{Error, Result};

/// Remote mutations needed to move an entry from one image list to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPlan {
    pub deletes: Vec<String>,
    pub uploads: Vec<NewPendingUpload>,
}

impl MediaPlan {
    /// Delete every listed object.
    pub fn delete_all<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let deletes = paths
            .into_iter()
            .map(Into::into)
            .filter(|path| seen.insert(path.clone()))
            .collect();
        Self {
            deletes,
            uploads: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.uploads.is_empty()
    }
}

/// Diff the images an entry referenced before a save against the ones it
/// references after.
///
/// Order follows the input lists. New images without a local source have
/// nothing to upload and are skipped.
pub fn plan_media_changes(before: &[String], after: &[GalleryImage]) -> MediaPlan {
    let kept = after
        .iter()
        .map(|image| image.remote_path.as_str())
        .collect::<HashSet<_>>();
    let existing = before.iter().map(String::as_str).collect::<HashSet<_>>();

    let deletes = MediaPlan::delete_all(
        before
            .iter()
            .filter(|path| !kept.contains(path.as_str())),
    )
    .deletes;

    let mut queued = HashSet::new();
    let uploads = after
        .iter()
        .filter(|image| !existing.contains(image.remote_path.as_str()))
        .filter_map(|image| {
            let source = image.local_source.as_ref()?;
            queued
                .insert(image.remote_path.as_str())
                .then(|| NewPendingUpload::new(&image.remote_path, source))
        })
        .collect();

    MediaPlan { deletes, uploads }
}

/// Per-operation results of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub deletes: Vec<OperationReport>,
    pub uploads: Vec<OperationReport>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &OperationReport> {
        self.deletes
            .iter()
            .chain(&self.uploads)
            .filter(|report| !report.outcome.is_success())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Media work started for one entry save or delete.
///
/// The records are already durable. Dropping the batch leaves the background
/// attempts running.
#[derive(Debug)]
pub struct MediaBatch {
    deletes: Vec<PendingDelete>,
    uploads: Vec<PendingUpload>,
    task: Option<JoinHandle<Result<BatchReport>>>,
}

impl MediaBatch {
    /// A batch with no media work.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            deletes: Vec::new(),
            uploads: Vec::new(),
            task: None,
        }
    }

    #[must_use]
    pub fn deletes(&self) -> &[PendingDelete] {
        &self.deletes
    }

    #[must_use]
    pub fn uploads(&self) -> &[PendingUpload] {
        &self.uploads
    }

    /// Whether uploads from this batch may still be in flight.
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        !self.uploads.is_empty() && !self.is_finished()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for every attempt in the batch.
    pub async fn finish(self) -> Result<BatchReport> {
        match self.task {
            Some(task) => task
                .await
                .map_err(|error| Error::Storage(format!("media task failed: {error}")))?,
            None => Ok(BatchReport::default()),
        }
    }
}

/// Enqueues and runs the media side of entry saves and deletes.
pub struct MediaLifecycle<C> {
    driver: RetryDriver<C>,
}

impl<C> Clone for MediaLifecycle<C> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
        }
    }
}

impl<C: RemoteMediaClient> MediaLifecycle<C> {
    pub const fn new(driver: RetryDriver<C>) -> Self {
        Self { driver }
    }

    #[must_use]
    pub const fn driver(&self) -> &RetryDriver<C> {
        &self.driver
    }

    /// Durably enqueue the plan, then attempt it in the background.
    ///
    /// Returns once every record is committed. A store failure is returned
    /// before any network call is made for the plan.
    pub async fn apply(&self, plan: MediaPlan) -> Result<MediaBatch> {
        if plan.is_empty() {
            return Ok(MediaBatch::empty());
        }

        let store = self.driver.store();
        let mut deletes = Vec::with_capacity(plan.deletes.len());
        for path in &plan.deletes {
            deletes.push(store.enqueue_delete(path).await?);
        }
        let mut uploads = Vec::with_capacity(plan.uploads.len());
        for upload in plan.uploads {
            uploads.push(store.enqueue_upload(upload).await?);
        }

        tracing::debug!(
            deletes = deletes.len(),
            uploads = uploads.len(),
            "Enqueued media changes"
        );

        let driver = self.driver.clone();
        let task_deletes = deletes.clone();
        let task_uploads = uploads.clone();
        let task = tokio::spawn(async move {
            let mut report = BatchReport::default();
            for delete in &task_deletes {
                report.deletes.push(driver.delete_report(delete).await?);
            }
            for upload in &task_uploads {
                report.uploads.push(driver.upload_report(upload).await?);
            }
            Ok::<_, Error>(report)
        });

        Ok(MediaBatch {
            deletes,
            uploads,
            task: Some(task),
        })
    }

    /// Enqueue deletes for every image of a removed entry.
    pub async fn remove_all<I, S>(&self, paths: I) -> Result<MediaBatch>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply(MediaPlan::delete_all(paths)).await
    }
}
