//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::env;
use std::path::Path;
use std::time::Duration;

use super::migrations;

const ENV_TURSO_URL: &str = "TURSO_DATABASE_URL";
const ENV_TURSO_TOKEN: &str = "TURSO_AUTH_TOKEN";

/// Which set of tables a database file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Diary entries; may be a replica of the managed cloud database.
    Diary,
    /// Pending media operations; always local-only.
    MediaQueue,
}

/// Configuration for database sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote database URL (e.g., `libsql://your-db.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
    /// Automatic sync interval (default: 60 seconds)
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    /// Create a new sync configuration
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Load sync settings from `TURSO_DATABASE_URL` / `TURSO_AUTH_TOKEN`.
    ///
    /// Returns `None` when either variable is missing or blank.
    pub fn from_env() -> Option<Self> {
        let url = crate::util::normalize_text_option(env::var(ENV_TURSO_URL).ok())?;
        let token = crate::util::normalize_text_option(env::var(ENV_TURSO_TOKEN).ok())?;
        Some(Self::new(url, token))
    }

    /// Disable automatic sync (manual sync only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Check if sync is configured
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    schema: Schema,
    sync_config: Option<SyncConfig>,
}

impl Database {
    /// Open a local-only database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            schema,
            sync_config: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory(schema: Schema) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            schema,
            sync_config: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open the diary database as an embedded replica of a remote Turso database.
    ///
    /// Reads are served from the local file, writes go to remote and sync back.
    pub async fn open_with_sync(
        local_path: impl AsRef<Path>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        let path_str = local_path.as_ref().to_string_lossy().to_string();

        let url = sync_config
            .url
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("Sync URL is required".into()))?;
        let token = sync_config
            .auth_token
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("Auth token is required".into()))?;

        let mut builder = Builder::new_remote_replica(&path_str, url.clone(), token.clone());
        if let Some(interval) = sync_config.sync_interval {
            builder = builder.sync_interval(interval);
            tracing::debug!("Automatic sync interval set to {:?}", interval);
        }

        let db = builder.build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            schema: Schema::Diary,
            sync_config: Some(sync_config),
        };

        // Pull the remote schema first so migrations only add what is missing
        tracing::debug!("Performing initial sync...");
        database.sync().await?;

        database.configure().await?;
        database.migrate().await?;

        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Remote replicas reject some pragmas
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        match self.schema {
            // Queue writes must be on disk before the caller is acknowledged
            Schema::MediaQueue => {
                self.conn
                    .execute("PRAGMA synchronous = FULL;", ())
                    .await
                    .map_err(|e| {
                        Error::Database(format!("Failed to enable synchronous writes: {e}"))
                    })?;
            }
            Schema::Diary => {
                self.conn
                    .execute("PRAGMA synchronous = NORMAL;", ())
                    .await
                    .ok();
            }
        }
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn, self.schema).await
    }

    /// Sync with remote database (if configured)
    pub async fn sync(&self) -> Result<()> {
        if self.sync_config.is_some() {
            self.db.sync().await?;
            tracing::debug!("Database synced with remote");
        }
        Ok(())
    }

    /// Check if sync is configured
    pub const fn is_sync_enabled(&self) -> bool {
        self.sync_config.is_some()
    }

    pub const fn schema(&self) -> Schema {
        self.schema
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory(Schema::MediaQueue).await.unwrap();
        assert!(!db.is_sync_enabled());
        assert_eq!(db.schema(), Schema::MediaQueue);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_file_creates_database() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("diary.db");
        let db = Database::open(&path, Schema::Diary).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.schema(), Schema::Diary);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_schema_uses_full_synchronous_writes() {
        let tmp = tempdir().unwrap();
        let db = Database::open(tmp.path().join("media-queue.db"), Schema::MediaQueue)
            .await
            .unwrap();

        let mut rows = db
            .connection()
            .query("PRAGMA synchronous", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        // 2 is FULL
        assert_eq!(row.get::<i64>(0).unwrap(), 2);
    }

    #[test]
    fn test_sync_config_new() {
        let config = SyncConfig::new("libsql://test.turso.io", "test-token");
        assert!(config.is_configured());
        assert_eq!(config.url, Some("libsql://test.turso.io".to_string()));
        assert_eq!(config.sync_interval, Some(Duration::from_secs(60)));
        assert_eq!(config.without_auto_sync().sync_interval, None);
    }

    #[test]
    fn test_sync_config_default_not_configured() {
        assert!(!SyncConfig::default().is_configured());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires TURSO_DATABASE_URL and TURSO_AUTH_TOKEN"]
    async fn test_sync_with_turso() {
        let url = env::var("TURSO_DATABASE_URL").expect("TURSO_DATABASE_URL must be set");
        let token = env::var("TURSO_AUTH_TOKEN").expect("TURSO_AUTH_TOKEN must be set");

        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("test_sync.db");

        let db = Database::open_with_sync(&db_path, SyncConfig::new(url, token))
            .await
            .unwrap();
        assert!(db.is_sync_enabled());
        db.sync().await.expect("Sync should succeed");
    }
}
