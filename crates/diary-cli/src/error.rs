use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] diary_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("{0}")]
    AmbiguousEntryId(String),
    #[error("Invalid date '{0}'. Use YYYY-MM-DD or an RFC 3339 timestamp.")]
    InvalidDate(String),
    #[error("Image not attached to this entry: {0}")]
    UnknownImage(String),
    #[error("No pending {kind} with id {id}")]
    PendingNotFound { kind: &'static str, id: i64 },
    #[error("Refusing to delete every entry without --yes")]
    ConfirmationRequired,
    #[error(
        "Sync is not configured. Set TURSO_DATABASE_URL and TURSO_AUTH_TOKEN to enable `diary sync`."
    )]
    SyncNotConfigured,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Session error: {0}")]
    Session(String),
}
