//! Diary entry model

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Mood;
use crate::error::{Error, Result};

/// A unique identifier for a diary entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiaryId(Uuid);

impl DiaryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DiaryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DiaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DiaryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A dated journal entry owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    /// Unique identifier
    pub id: DiaryId,
    /// Identifier of the signed-in user that owns the entry
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub mood: Mood,
    /// The day the entry is about (Unix ms), editable by the user
    pub date: i64,
    /// Remote object paths of the attached photos, in gallery order
    pub images: Vec<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl DiaryEntry {
    /// Calendar day of [`Self::date`] in the local time zone.
    #[must_use]
    pub fn local_date(&self) -> NaiveDate {
        local_date_of(self.date)
    }
}

/// Convert a Unix millisecond timestamp into a local calendar day.
pub fn local_date_of(timestamp_ms: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .with_timezone(&Local)
        .date_naive()
}

/// One photo in an entry being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    /// Target object path in remote storage.
    pub remote_path: String,
    /// Local reference to the picked bytes; `None` for images already uploaded.
    pub local_source: Option<String>,
}

impl GalleryImage {
    /// An image that already lives in remote storage.
    pub fn remote(remote_path: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_source: None,
        }
    }

    /// A freshly picked image that still has to be uploaded.
    pub fn picked(remote_path: impl Into<String>, local_source: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_source: Some(local_source.into()),
        }
    }
}

/// Editor state submitted when an entry is saved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDraft {
    /// `None` creates a new entry.
    pub id: Option<DiaryId>,
    pub title: String,
    pub description: String,
    pub mood: Mood,
    /// Unix ms; `None` means "now".
    pub date: Option<i64>,
    /// Images the entry references after the save.
    pub images: Vec<GalleryImage>,
}

impl EntryDraft {
    /// Trim the text fields and reject drafts the editor would not save.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Title or description is empty.".to_string(),
            ));
        }
        for image in &self.images {
            if image.remote_path.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "Image remote path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
