//! Runtime configuration shared by Diary front ends.
//!
//! Object storage and Turso sync are both optional: without storage the
//! media queue keeps every operation pending, and without sync the entry
//! database stays local.

use std::path::{Path, PathBuf};

use crate::db::SyncConfig;
use crate::storage::ObjectStoreConfig;
use crate::Result;

const DIARY_DB_FILE: &str = "diary.db";
const MEDIA_QUEUE_DB_FILE: &str = "media-queue.db";

/// Where each local database lives and which remotes to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryConfig {
    pub data_dir: PathBuf,
    pub object_store: Option<ObjectStoreConfig>,
    pub sync: Option<SyncConfig>,
}

impl DiaryConfig {
    /// Local-only configuration rooted at `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            object_store: None,
            sync: None,
        }
    }

    /// Read storage and sync settings from the environment.
    pub fn from_env(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let object_store = ObjectStoreConfig::from_env()?;
        let sync = SyncConfig::from_env();

        match &object_store {
            Some(config) => tracing::debug!(
                "Object storage configured: {} (bucket {})",
                config.endpoint_url,
                config.bucket
            ),
            None => tracing::debug!("Object storage not configured; media stays queued"),
        }

        Ok(Self {
            data_dir: data_dir.into(),
            object_store,
            sync,
        })
    }

    /// Entry database file; may be a Turso replica.
    #[must_use]
    pub fn diary_db_path(&self) -> PathBuf {
        self.data_dir.join(DIARY_DB_FILE)
    }

    /// Pending media operations; always local.
    #[must_use]
    pub fn media_queue_db_path(&self) -> PathBuf {
        self.data_dir.join(MEDIA_QUEUE_DB_FILE)
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
