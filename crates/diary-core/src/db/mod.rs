//! Database layer for Diary

mod connection;
mod diary_repository;
mod migrations;
mod queue_repository;

pub use connection::{Database, Schema, SyncConfig};
pub use diary_repository::{DiaryRepository, LibSqlDiaryRepository};
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};
