//! Entry persistence for the signed-in user, with photos kept in step.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Days, Local, NaiveDate, TimeZone};
use tokio::sync::Mutex;

use crate::auth::CurrentUser;
use crate::db::{Database, DiaryRepository, LibSqlDiaryRepository, Schema, SyncConfig};
use crate::media::{build_remote_path, plan_media_changes, MediaBatch, MediaLifecycle};
use crate::models::{DiaryEntry, DiaryId, EntryDraft, GalleryImage};
use crate::storage::RemoteMediaClient;
use crate::util::unix_millis_now;
use crate::{Error, Result};

/// A committed entry plus the media work it started.
#[derive(Debug)]
pub struct SaveReport {
    pub entry: DiaryEntry,
    pub media: MediaBatch,
}

/// Entries removed plus the deletes queued for their photos.
#[derive(Debug)]
pub struct DeleteReport {
    pub removed: u64,
    pub media: MediaBatch,
}

/// Diary operations scoped to one user.
///
/// Constructed once by the front end and passed to whatever needs it.
pub struct DiaryService<C> {
    db: Arc<Mutex<Database>>,
    user: Arc<dyn CurrentUser>,
    media: MediaLifecycle<C>,
}

impl<C> Clone for DiaryService<C> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            user: Arc::clone(&self.user),
            media: self.media.clone(),
        }
    }
}

impl<C: RemoteMediaClient> DiaryService<C> {
    pub fn new(
        db: Database,
        user: impl CurrentUser + 'static,
        media: MediaLifecycle<C>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            user: Arc::new(user),
            media,
        }
    }

    /// Open the entry database at `db_path`, as a Turso replica when sync is
    /// configured.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        sync_config: Option<SyncConfig>,
        user: impl CurrentUser + 'static,
        media: MediaLifecycle<C>,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match sync_config.filter(SyncConfig::is_configured) {
            Some(config) => {
                tracing::info!(
                    "Sync enabled with Turso: {}",
                    config.url.as_deref().unwrap_or("unknown")
                );
                Database::open_with_sync(&db_path, config).await?
            }
            None => {
                tracing::info!("Running in local-only mode (no sync config)");
                Database::open(&db_path, Schema::Diary).await?
            }
        };
        Ok(Self::new(db, user, media))
    }

    /// In-memory entry database (primarily for tests).
    pub async fn open_in_memory(
        user: impl CurrentUser + 'static,
        media: MediaLifecycle<C>,
    ) -> Result<Self> {
        let db = Database::open_in_memory(Schema::Diary).await?;
        Ok(Self::new(db, user, media))
    }

    #[must_use]
    pub const fn media(&self) -> &MediaLifecycle<C> {
        &self.media
    }

    /// Attach a local photo, naming its future remote object.
    pub fn pick_image(&self, local_source: &str) -> Result<GalleryImage> {
        let owner = self.user.require_user_id()?;
        if local_source.trim().is_empty() {
            return Err(Error::InvalidInput("Image path cannot be empty".to_string()));
        }
        let remote_path = build_remote_path(&owner, local_source, unix_millis_now())?;
        Ok(GalleryImage::picked(remote_path, local_source.trim()))
    }

    /// Create or update an entry, then queue its photo changes.
    ///
    /// The entry is committed before any media record is written, and media
    /// failures never undo it.
    pub async fn save_entry(&self, draft: EntryDraft) -> Result<SaveReport> {
        draft.validate()?;
        let owner = self.user.require_user_id()?;
        let now = unix_millis_now();

        let gallery = normalize_gallery(&draft.images);
        let images = gallery
            .iter()
            .map(|image| image.remote_path.clone())
            .collect::<Vec<_>>();

        let (entry, before) = {
            let db = self.db.lock().await;
            let repo = LibSqlDiaryRepository::new(db.connection());

            match draft.id {
                Some(id) => {
                    let existing = repo
                        .get(&owner, &id)
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("Entry {id}")))?;
                    let before = existing.images.clone();
                    let entry = DiaryEntry {
                        title: draft.title.trim().to_string(),
                        description: draft.description.trim().to_string(),
                        mood: draft.mood,
                        date: draft.date.unwrap_or(existing.date),
                        images,
                        updated_at: now,
                        ..existing
                    };
                    repo.update(&entry).await?;
                    (entry, before)
                }
                None => {
                    let entry = DiaryEntry {
                        id: DiaryId::new(),
                        owner_id: owner,
                        title: draft.title.trim().to_string(),
                        description: draft.description.trim().to_string(),
                        mood: draft.mood,
                        date: draft.date.unwrap_or(now),
                        images,
                        created_at: now,
                        updated_at: now,
                    };
                    repo.create(&entry).await?;
                    (entry, Vec::new())
                }
            }
        };
        tracing::info!(id = %entry.id, "Saved entry");

        let media = self
            .media
            .apply(plan_media_changes(&before, &gallery))
            .await?;
        Ok(SaveReport { entry, media })
    }

    /// Delete one entry, then queue deletes for its photos.
    pub async fn delete_entry(&self, id: &DiaryId) -> Result<DeleteReport> {
        let owner = self.user.require_user_id()?;

        let entry = {
            let db = self.db.lock().await;
            let repo = LibSqlDiaryRepository::new(db.connection());
            let entry = repo
                .get(&owner, id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Entry {id}")))?;
            repo.delete(&owner, id).await?;
            entry
        };
        tracing::info!(id = %entry.id, images = entry.images.len(), "Deleted entry");

        let media = self.media.remove_all(entry.images).await?;
        Ok(DeleteReport { removed: 1, media })
    }

    /// Delete every entry of the signed-in user and all of their photos.
    pub async fn delete_all_entries(&self) -> Result<DeleteReport> {
        let owner = self.user.require_user_id()?;

        let (removed, images) = {
            let db = self.db.lock().await;
            let repo = LibSqlDiaryRepository::new(db.connection());
            let images = repo
                .list(&owner)
                .await?
                .into_iter()
                .flat_map(|entry| entry.images)
                .collect::<Vec<_>>();
            (repo.delete_all(&owner).await?, images)
        };
        tracing::info!(removed, images = images.len(), "Deleted all entries");

        let media = self.media.remove_all(images).await?;
        Ok(DeleteReport { removed, media })
    }

    pub async fn get_entry(&self, id: &DiaryId) -> Result<Option<DiaryEntry>> {
        let owner = self.user.require_user_id()?;
        let db = self.db.lock().await;
        let repo = LibSqlDiaryRepository::new(db.connection());
        repo.get(&owner, id).await
    }

    /// Every entry grouped by local calendar day.
    ///
    /// Iterate with `.iter().rev()` for newest day first; entries within a
    /// day are newest first.
    pub async fn list_entries(&self) -> Result<BTreeMap<NaiveDate, Vec<DiaryEntry>>> {
        let owner = self.user.require_user_id()?;
        let entries = {
            let db = self.db.lock().await;
            let repo = LibSqlDiaryRepository::new(db.connection());
            repo.list(&owner).await?
        };

        let mut days: BTreeMap<NaiveDate, Vec<DiaryEntry>> = BTreeMap::new();
        for entry in entries {
            days.entry(entry.local_date()).or_default().push(entry);
        }
        Ok(days)
    }

    /// Entries dated within one local calendar day.
    pub async fn entries_on(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        let owner = self.user.require_user_id()?;
        let (start, end) = local_day_bounds(date)?;

        let db = self.db.lock().await;
        let repo = LibSqlDiaryRepository::new(db.connection());
        repo.list_between(&owner, start, end).await
    }

    /// Sync the entry database with Turso when configured.
    pub async fn sync(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.sync().await
    }

    pub async fn is_sync_enabled(&self) -> bool {
        let db = self.db.lock().await;
        db.is_sync_enabled()
    }
}

/// Trimmed remote paths, first occurrence of each path kept.
fn normalize_gallery(images: &[GalleryImage]) -> Vec<GalleryImage> {
    let mut gallery: Vec<GalleryImage> = Vec::with_capacity(images.len());
    for image in images {
        let remote_path = image.remote_path.trim();
        if gallery.iter().any(|kept| kept.remote_path == remote_path) {
            continue;
        }
        gallery.push(GalleryImage {
            remote_path: remote_path.to_string(),
            local_source: image.local_source.clone(),
        });
    }
    gallery
}

/// `[start, end)` in Unix ms of a local calendar day.
fn local_day_bounds(date: NaiveDate) -> Result<(i64, i64)> {
    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::InvalidInput(format!("Date out of range: {date}")))?;
    Ok((start_of_local_day(date)?, start_of_local_day(next)?))
}

fn start_of_local_day(date: NaiveDate) -> Result<i64> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let local = Local.from_local_datetime(&midnight);
    // A DST jump at midnight leaves no exact local midnight
    local
        .earliest()
        .or_else(|| local.latest())
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|start| start.timestamp_millis())
        .ok_or_else(|| Error::InvalidInput(format!("No local midnight on {date}")))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::auth::AuthUser;
    use crate::media::RetryDriver;
    use crate::models::Mood;
    use crate::services::PendingOperationStore;
    use crate::storage::{InMemoryMediaClient, RemoteCall};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    async fn service_for(
        user: Option<AuthUser>,
        client: InMemoryMediaClient,
    ) -> DiaryService<InMemoryMediaClient> {
        let store = PendingOperationStore::open_in_memory().await.unwrap();
        let media = MediaLifecycle::new(RetryDriver::new(store, client));
        DiaryService::open_in_memory(user, media).await.unwrap()
    }

    async fn service(client: InMemoryMediaClient) -> DiaryService<InMemoryMediaClient> {
        service_for(Some(AuthUser::new("u1", None).unwrap()), client).await
    }

    fn write_photo(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn draft(title: &str) -> EntryDraft {
        EntryDraft {
            title: title.to_string(),
            description: format!("{title} body"),
            mood: Mood::Happy,
            ..EntryDraft::default()
        }
    }

    fn local_ms(date: NaiveDate, hour: u32) -> i64 {
        Local
            .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .timestamp_millis()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_entry_uploads_picked_images() {
        let tmp = tempdir().unwrap();
        let client = InMemoryMediaClient::new();
        let service = service(client.clone()).await;

        let image = service
            .pick_image(&write_photo(tmp.path(), "beach.jpg"))
            .unwrap();
        assert!(image.remote_path.starts_with("images/u1/beach-"));

        let saved = service
            .save_entry(EntryDraft {
                images: vec![image.clone()],
                ..draft("Beach")
            })
            .await
            .unwrap();
        assert_eq!(saved.entry.images, vec![image.remote_path.clone()]);
        assert_eq!(saved.media.uploads().len(), 1);

        let report = saved.media.finish().await.unwrap();
        assert!(report.is_success());
        assert!(client.contains(&image.remote_path));
        assert!(service
            .media()
            .driver()
            .store()
            .counts()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn edit_deletes_removed_images_and_keeps_the_rest() {
        let tmp = tempdir().unwrap();
        let client = InMemoryMediaClient::new();
        let service = service(client.clone()).await;

        let first = service.pick_image(&write_photo(tmp.path(), "a.jpg")).unwrap();
        let second = service.pick_image(&write_photo(tmp.path(), "b.jpg")).unwrap();
        let saved = service
            .save_entry(EntryDraft {
                images: vec![first.clone(), second.clone()],
                ..draft("Trip")
            })
            .await
            .unwrap();
        saved.media.finish().await.unwrap();

        let edited = service
            .save_entry(EntryDraft {
                id: Some(saved.entry.id),
                images: vec![GalleryImage::remote(&second.remote_path)],
                ..draft("Trip, edited")
            })
            .await
            .unwrap();

        assert_eq!(edited.entry.title, "Trip, edited");
        assert_eq!(edited.entry.created_at, saved.entry.created_at);
        assert_eq!(edited.media.deletes().len(), 1);
        assert!(edited.media.uploads().is_empty());
        edited.media.finish().await.unwrap();

        assert!(!client.contains(&first.remote_path));
        assert!(client.contains(&second.remote_path));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn padded_image_paths_are_the_same_image() {
        let tmp = tempdir().unwrap();
        let client = InMemoryMediaClient::new();
        let service = service(client.clone()).await;

        let photo = write_photo(tmp.path(), "x.jpg");
        let saved = service
            .save_entry(EntryDraft {
                images: vec![
                    GalleryImage::picked(" images/u1/x.jpg", &photo),
                    GalleryImage::picked("images/u1/x.jpg ", &photo),
                ],
                ..draft("Padded")
            })
            .await
            .unwrap();
        assert_eq!(saved.entry.images, vec!["images/u1/x.jpg"]);
        let uploads = saved
            .media
            .uploads()
            .iter()
            .map(|upload| upload.remote_path.clone())
            .collect::<Vec<_>>();
        assert_eq!(uploads, vec!["images/u1/x.jpg"]);
        saved.media.finish().await.unwrap();

        let edited = service
            .save_entry(EntryDraft {
                id: Some(saved.entry.id),
                images: vec![GalleryImage::remote(" images/u1/x.jpg")],
                ..draft("Padded, edited")
            })
            .await
            .unwrap();
        assert_eq!(edited.entry.images, vec!["images/u1/x.jpg"]);
        assert!(edited.media.deletes().is_empty());
        assert!(edited.media.uploads().is_empty());
        edited.media.finish().await.unwrap();

        assert!(client.contains("images/u1/x.jpg"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entry_commits_even_when_remote_is_down() {
        let tmp = tempdir().unwrap();
        let client = InMemoryMediaClient::offline();
        let service = service(client).await;

        let image = service.pick_image(&write_photo(tmp.path(), "a.jpg")).unwrap();
        let saved = service
            .save_entry(EntryDraft {
                images: vec![image],
                ..draft("Offline")
            })
            .await
            .unwrap();

        let report = saved.media.finish().await.unwrap();
        assert_eq!(report.failures().count(), 1);
        assert!(service.get_entry(&saved.entry.id).await.unwrap().is_some());

        let pending = service.media().driver().store().list_uploads().await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_entry_queues_every_image_before_network() {
        let client = InMemoryMediaClient::paused();
        let service = service(client.clone()).await;

        let saved = service
            .save_entry(EntryDraft {
                images: vec![
                    GalleryImage::remote("images/u1/one.jpg"),
                    GalleryImage::remote("images/u1/two.jpg"),
                ],
                ..draft("Two photos")
            })
            .await
            .unwrap();
        assert!(saved.media.is_finished());

        let deleted = service.delete_entry(&saved.entry.id).await.unwrap();
        assert!(service.get_entry(&saved.entry.id).await.unwrap().is_none());

        let paths = service
            .media()
            .driver()
            .store()
            .list_deletes()
            .await
            .unwrap()
            .into_iter()
            .map(|delete| delete.remote_path)
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["images/u1/one.jpg", "images/u1/two.jpg"]);
        assert!(client.calls().is_empty());

        client.resume();
        assert!(deleted.media.finish().await.unwrap().is_success());
        assert_eq!(
            client.calls(),
            vec![
                RemoteCall::Delete {
                    path: "images/u1/one.jpg".into()
                },
                RemoteCall::Delete {
                    path: "images/u1/two.jpg".into()
                },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_all_removes_every_entry_and_image() {
        let client = InMemoryMediaClient::new();
        let service = service(client.clone()).await;
        for (title, image) in [("a", "images/u1/a.jpg"), ("b", "images/u1/b.jpg")] {
            client.insert_object(image, title.as_bytes().to_vec());
            service
                .save_entry(EntryDraft {
                    images: vec![GalleryImage::remote(image)],
                    ..draft(title)
                })
                .await
                .unwrap();
        }

        let report = service.delete_all_entries().await.unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(report.media.deletes().len(), 2);
        assert!(report.media.finish().await.unwrap().is_success());

        assert!(service.list_entries().await.unwrap().is_empty());
        assert!(!client.contains("images/u1/a.jpg"));
        assert!(!client.contains("images/u1/b.jpg"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_are_grouped_and_filtered_by_local_day() {
        let service = service(InMemoryMediaClient::new()).await;
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        for (title, date) in [
            ("morning", local_ms(monday, 8)),
            ("evening", local_ms(monday, 21)),
            ("next", local_ms(tuesday, 9)),
        ] {
            service
                .save_entry(EntryDraft {
                    date: Some(date),
                    ..draft(title)
                })
                .await
                .unwrap();
        }

        let days = service.list_entries().await.unwrap();
        assert_eq!(days.keys().copied().collect::<Vec<_>>(), vec![monday, tuesday]);
        let monday_titles = days[&monday]
            .iter()
            .map(|entry| entry.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(monday_titles, vec!["evening", "morning"]);

        let on_tuesday = service.entries_on(tuesday).await.unwrap();
        assert_eq!(on_tuesday.len(), 1);
        assert_eq!(on_tuesday[0].title, "next");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn signed_out_user_cannot_touch_entries() {
        let service = service_for(None, InMemoryMediaClient::new()).await;

        assert!(matches!(
            service.save_entry(draft("x")).await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            service.list_entries().await,
            Err(Error::NotAuthenticated)
        ));
        assert!(matches!(
            service.pick_image("/a.jpg"),
            Err(Error::NotAuthenticated)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn editing_a_missing_entry_is_not_found() {
        let service = service(InMemoryMediaClient::new()).await;
        let result = service
            .save_entry(EntryDraft {
                id: Some(DiaryId::new()),
                ..draft("ghost")
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn day_bounds_span_one_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let (start, end) = local_day_bounds(date).unwrap();
        assert!(end > start);
        assert_eq!(crate::models::local_date_of(start), date);
        assert_eq!(crate::models::local_date_of(end - 1), date);
    }
}
