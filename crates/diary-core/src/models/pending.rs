//! Pending media operations waiting for remote confirmation.

use serde::{Deserialize, Serialize};

/// A photo that has not been confirmed stored remotely yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    /// Autoincrement row id; ascending order is retry order.
    pub id: i64,
    pub remote_path: String,
    /// Locally resolvable reference to the image bytes.
    pub local_source: String,
    /// Resumable session handle reported by the remote client, if any.
    pub resume_token: Option<String>,
}

/// Upload request before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingUpload {
    pub remote_path: String,
    pub local_source: String,
}

impl NewPendingUpload {
    pub fn new(remote_path: impl Into<String>, local_source: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_source: local_source.into(),
        }
    }
}

/// A remote object that has not been confirmed deleted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelete {
    pub id: i64,
    pub remote_path: String,
}

/// Number of records waiting in each queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub uploads: usize,
    pub deletes: usize,
}

impl QueueCounts {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.uploads == 0 && self.deletes == 0
    }
}
