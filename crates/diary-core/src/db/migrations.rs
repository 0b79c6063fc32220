//! Database migrations

use crate::error::Result;
use libsql::Connection;

use super::Schema;

type Migration = (i32, &'static [&'static str]);

const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
)";

const DIARY_MIGRATIONS: &[Migration] = &[
    (
        1,
        &[
            "CREATE TABLE IF NOT EXISTS diaries (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                mood TEXT NOT NULL,
                date INTEGER NOT NULL,
                images TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_diaries_owner_date ON diaries(owner_id, date DESC)",
        ],
    ),
];

const MEDIA_QUEUE_MIGRATIONS: &[Migration] = &[
    (
        1,
        &[
            "CREATE TABLE IF NOT EXISTS images_to_upload (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_path TEXT NOT NULL,
                local_source TEXT NOT NULL,
                resume_token TEXT NOT NULL DEFAULT ''
            )",
            "CREATE TABLE IF NOT EXISTS images_to_delete (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_path TEXT NOT NULL
            )",
        ],
    ),
];

const fn migrations_for(schema: Schema) -> &'static [Migration] {
    match schema {
        Schema::Diary => DIARY_MIGRATIONS,
        Schema::MediaQueue => MEDIA_QUEUE_MIGRATIONS,
    }
}

/// Latest schema version for the given table set
pub const fn current_version(schema: Schema) -> i32 {
    let migrations = migrations_for(schema);
    migrations[migrations.len() - 1].0
}

/// Run all pending migrations
pub async fn run(conn: &Connection, schema: Schema) -> Result<()> {
    conn.execute(SCHEMA_VERSION_TABLE, ()).await?;
    let version = get_version(conn).await?;

    for (target, statements) in migrations_for(schema) {
        if version < *target {
            apply(conn, *target, statements).await?;
        }
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Apply one migration inside a transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}
