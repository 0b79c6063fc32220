//! diary-core - Core library for Diary
//!
//! This crate contains the entry models, the local databases, and the
//! deferred media operation queue shared by every Diary front end.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod services;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use models::{DiaryEntry, DiaryId, Mood, PendingDelete, PendingUpload};
