//! Row access for the pending media operation tables

use crate::error::Result;
use crate::models::{NewPendingUpload, PendingDelete, PendingUpload, QueueCounts};
use libsql::{Connection, Row};

/// Trait for pending-operation table access (async)
///
/// Every write is a single-row statement; the tables need no multi-row
/// transactions.
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append an upload and return it with its assigned id
    async fn insert_upload(&self, upload: &NewPendingUpload) -> Result<PendingUpload>;

    /// Insert or replace an upload keyed by its id
    async fn upsert_upload(&self, upload: &PendingUpload) -> Result<()>;

    /// All pending uploads, oldest first
    async fn list_uploads(&self) -> Result<Vec<PendingUpload>>;

    /// Remove an upload; returns whether a row existed
    async fn remove_upload(&self, id: i64) -> Result<bool>;

    /// Append a delete and return it with its assigned id
    async fn insert_delete(&self, remote_path: &str) -> Result<PendingDelete>;

    /// Insert or replace a delete keyed by its id
    async fn upsert_delete(&self, delete: &PendingDelete) -> Result<()>;

    /// All pending deletes, oldest first
    async fn list_deletes(&self) -> Result<Vec<PendingDelete>>;

    /// Remove a delete; returns whether a row existed
    async fn remove_delete(&self, id: i64) -> Result<bool>;

    /// Row counts of both queues
    async fn counts(&self) -> Result<QueueCounts>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_upload(row: &Row) -> Result<PendingUpload> {
        let resume_token: String = row.get(3)?;
        Ok(PendingUpload {
            id: row.get(0)?,
            remote_path: row.get(1)?,
            local_source: row.get(2)?,
            resume_token: crate::util::normalize_text_option(Some(resume_token)),
        })
    }

    fn parse_delete(row: &Row) -> Result<PendingDelete> {
        Ok(PendingDelete {
            id: row.get(0)?,
            remote_path: row.get(1)?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn insert_upload(&self, upload: &NewPendingUpload) -> Result<PendingUpload> {
        self.conn
            .execute(
                "INSERT INTO images_to_upload (remote_path, local_source, resume_token)
                 VALUES (?, ?, '')",
                libsql::params![upload.remote_path.as_str(), upload.local_source.as_str()],
            )
            .await?;

        Ok(PendingUpload {
            id: self.conn.last_insert_rowid(),
            remote_path: upload.remote_path.clone(),
            local_source: upload.local_source.clone(),
            resume_token: None,
        })
    }

    async fn upsert_upload(&self, upload: &PendingUpload) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO images_to_upload (id, remote_path, local_source, resume_token)
                 VALUES (?, ?, ?, ?)",
                libsql::params![
                    upload.id,
                    upload.remote_path.as_str(),
                    upload.local_source.as_str(),
                    upload.resume_token.as_deref().unwrap_or_default(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_uploads(&self) -> Result<Vec<PendingUpload>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, remote_path, local_source, resume_token
                 FROM images_to_upload ORDER BY id ASC",
                (),
            )
            .await?;

        let mut uploads = Vec::new();
        while let Some(row) = rows.next().await? {
            uploads.push(Self::parse_upload(&row)?);
        }
        Ok(uploads)
    }

    async fn remove_upload(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM images_to_upload WHERE id = ?", [id])
            .await?;
        Ok(affected > 0)
    }

    async fn insert_delete(&self, remote_path: &str) -> Result<PendingDelete> {
        self.conn
            .execute(
                "INSERT INTO images_to_delete (remote_path) VALUES (?)",
                [remote_path],
            )
            .await?;

        Ok(PendingDelete {
            id: self.conn.last_insert_rowid(),
            remote_path: remote_path.to_string(),
        })
    }

    async fn upsert_delete(&self, delete: &PendingDelete) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO images_to_delete (id, remote_path) VALUES (?, ?)",
                libsql::params![delete.id, delete.remote_path.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn list_deletes(&self) -> Result<Vec<PendingDelete>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, remote_path FROM images_to_delete ORDER BY id ASC",
                (),
            )
            .await?;

        let mut deletes = Vec::new();
        while let Some(row) = rows.next().await? {
            deletes.push(Self::parse_delete(&row)?);
        }
        Ok(deletes)
    }

    async fn remove_delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM images_to_delete WHERE id = ?", [id])
            .await?;
        Ok(affected > 0)
    }

    async fn counts(&self) -> Result<QueueCounts> {
        Ok(QueueCounts {
            uploads: self.count_rows("images_to_upload").await?,
            deletes: self.count_rows("images_to_delete").await?,
        })
    }
}
