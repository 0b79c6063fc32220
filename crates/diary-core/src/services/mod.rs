//! Long-lived handles the front ends construct once and share.

mod diary;
mod pending_store;

pub use diary::{DeleteReport, DiaryService, SaveReport};
pub use pending_store::{DeleteWatch, PendingOperationStore};
