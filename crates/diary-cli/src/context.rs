//! Handles shared by every command, opened once per invocation.

use std::path::{Path, PathBuf};

use diary_core::auth::AuthUser;
use diary_core::config::DiaryConfig;
use diary_core::media::{MediaLifecycle, RetryDriver};
use diary_core::services::{DiaryService, PendingOperationStore};

use crate::commands::common::print_failures;
use crate::error::CliError;
use crate::media_client::MediaClient;
use crate::session::{session_path, StoredSession};

pub struct AppContext {
    config: DiaryConfig,
    driver: RetryDriver<MediaClient>,
}

impl AppContext {
    pub async fn open(data_dir: Option<PathBuf>) -> Result<Self, CliError> {
        let data_dir = resolve_data_dir(data_dir)?;
        Self::with_config(DiaryConfig::from_env(data_dir)?).await
    }

    pub async fn with_config(config: DiaryConfig) -> Result<Self, CliError> {
        let store = PendingOperationStore::open_path(config.media_queue_db_path()).await?;
        let client = MediaClient::from_config(config.object_store.clone());
        if !client.is_configured() {
            tracing::debug!("No object storage configured; media operations stay pending");
        }

        Ok(Self {
            config,
            driver: RetryDriver::new(store, client),
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.config.data_dir()
    }

    pub const fn driver(&self) -> &RetryDriver<MediaClient> {
        &self.driver
    }

    pub const fn store(&self) -> &PendingOperationStore {
        self.driver.store()
    }

    pub fn session_path(&self) -> PathBuf {
        session_path(self.data_dir())
    }

    pub fn current_user(&self) -> Result<Option<AuthUser>, CliError> {
        let session =
            StoredSession::load_from_path(&self.session_path()).map_err(CliError::Session)?;
        Ok(session.user)
    }

    /// Entry service for the signed-in user.
    pub async fn diary_service(&self) -> Result<DiaryService<MediaClient>, CliError> {
        let user = self.current_user()?;
        let media = MediaLifecycle::new(self.driver.clone());
        Ok(DiaryService::open_path(
            self.config.diary_db_path(),
            self.config.sync.clone(),
            user,
            media,
        )
        .await?)
    }

    /// Retry everything left pending by earlier runs.
    pub async fn startup_drain(&self) -> Result<(), CliError> {
        if self.store().counts().await?.is_empty() {
            return Ok(());
        }

        let report = self.driver.drain().await?;
        print_failures(report.failures());
        Ok(())
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("diary"))
        .ok_or_else(|| CliError::Config("Failed to resolve a data directory; pass --data-dir".to_string()))
}
