//! Diary entry repository implementation

use crate::error::{Error, Result};
use crate::models::{DiaryEntry, DiaryId, Mood};
use libsql::{Connection, Row};

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, title, description, mood, date, images, created_at, updated_at FROM diaries";

/// Trait for owner-scoped entry storage (async)
#[allow(async_fn_in_trait)]
pub trait DiaryRepository {
    /// Insert a new entry
    async fn create(&self, entry: &DiaryEntry) -> Result<()>;

    /// Get an entry by ID if `owner_id` owns it
    async fn get(&self, owner_id: &str, id: &DiaryId) -> Result<Option<DiaryEntry>>;

    /// All entries of an owner, newest date first
    async fn list(&self, owner_id: &str) -> Result<Vec<DiaryEntry>>;

    /// Entries whose date lies in `[start_ms, end_ms)`, newest first
    async fn list_between(&self, owner_id: &str, start_ms: i64, end_ms: i64)
        -> Result<Vec<DiaryEntry>>;

    /// Overwrite the editable fields of an existing entry
    async fn update(&self, entry: &DiaryEntry) -> Result<()>;

    /// Delete one entry; returns whether it existed
    async fn delete(&self, owner_id: &str, id: &DiaryId) -> Result<bool>;

    /// Delete every entry of an owner; returns how many were removed
    async fn delete_all(&self, owner_id: &str) -> Result<u64>;
}

/// libSQL implementation of `DiaryRepository`
pub struct LibSqlDiaryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDiaryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &Row) -> Result<DiaryEntry> {
        let id_str: String = row.get(0)?;
        let mood_str: String = row.get(4)?;
        let images_json: String = row.get(6)?;

        Ok(DiaryEntry {
            id: id_str
                .parse()
                .map_err(|e| Error::Database(format!("Invalid entry ID: {e}")))?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            mood: mood_str
                .parse::<Mood>()
                .map_err(|e| Error::Database(format!("Invalid mood: {e}")))?,
            date: row.get(5)?,
            images: serde_json::from_str(&images_json)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    async fn collect(&self, mut rows: libsql::Rows) -> Result<Vec<DiaryEntry>> {
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }
}

impl DiaryRepository for LibSqlDiaryRepository<'_> {
    async fn create(&self, entry: &DiaryEntry) -> Result<()> {
        let images = serde_json::to_string(&entry.images)?;
        self.conn
            .execute(
                "INSERT INTO diaries (id, owner_id, title, description, mood, date, images, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    entry.id.as_str(),
                    entry.owner_id.as_str(),
                    entry.title.as_str(),
                    entry.description.as_str(),
                    entry.mood.as_str(),
                    entry.date,
                    images,
                    entry.created_at,
                    entry.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, owner_id: &str, id: &DiaryId) -> Result<Option<DiaryEntry>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE id = ? AND owner_id = ?"),
                libsql::params![id.as_str(), owner_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<DiaryEntry>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE owner_id = ? ORDER BY date DESC"),
                [owner_id],
            )
            .await?;
        self.collect(rows).await
    }

    async fn list_between(
        &self,
        owner_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<DiaryEntry>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "{SELECT_COLUMNS} WHERE owner_id = ? AND date >= ? AND date < ? ORDER BY date DESC"
                ),
                libsql::params![owner_id, start_ms, end_ms],
            )
            .await?;
        self.collect(rows).await
    }

    async fn update(&self, entry: &DiaryEntry) -> Result<()> {
        let images = serde_json::to_string(&entry.images)?;
        let affected = self
            .conn
            .execute(
                "UPDATE diaries
                 SET title = ?, description = ?, mood = ?, date = ?, images = ?, updated_at = ?
                 WHERE id = ? AND owner_id = ?",
                libsql::params![
                    entry.title.as_str(),
                    entry.description.as_str(),
                    entry.mood.as_str(),
                    entry.date,
                    images,
                    entry.updated_at,
                    entry.id.as_str(),
                    entry.owner_id.as_str(),
                ],
            )
            .await?;

        if affected == 0 {
            return Err(Error::NotFound(entry.id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &DiaryId) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM diaries WHERE id = ? AND owner_id = ?",
                libsql::params![id.as_str(), owner_id],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_all(&self, owner_id: &str) -> Result<u64> {
        Ok(self
            .conn
            .execute("DELETE FROM diaries WHERE owner_id = ?", [owner_id])
            .await?)
    }
}
