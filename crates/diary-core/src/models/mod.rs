//! Data models for Diary

mod diary;
mod mood;
mod pending;

pub use diary::{local_date_of, DiaryEntry, DiaryId, EntryDraft, GalleryImage};
pub use mood::Mood;
pub use pending::{NewPendingUpload, PendingDelete, PendingUpload, QueueCounts};
