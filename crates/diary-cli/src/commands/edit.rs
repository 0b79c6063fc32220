use diary_core::models::{EntryDraft, GalleryImage};
use diary_core::DiaryEntry;

use crate::commands::common::{parse_entry_date, parse_mood, report_media, resolve_entry};
use crate::context::AppContext;
use crate::error::CliError;

pub struct EditArgs {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mood: Option<String>,
    pub date: Option<String>,
    pub add_images: Vec<String>,
    pub remove_images: Vec<String>,
}

pub async fn run_edit(args: EditArgs, ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;
    let entry = resolve_entry(&args.id, &service).await?;

    let mut images = kept_images(&entry, &args.remove_images)?;
    for path in &args.add_images {
        images.push(service.pick_image(path)?);
    }

    let draft = EntryDraft {
        id: Some(entry.id),
        title: args.title.unwrap_or(entry.title),
        description: args.description.unwrap_or(entry.description),
        mood: parse_mood(args.mood.as_deref())?.unwrap_or(entry.mood),
        date: Some(match args.date.as_deref() {
            Some(date) => parse_entry_date(date)?,
            None => entry.date,
        }),
        images,
    };

    let saved = service.save_entry(draft).await?;
    println!("{}", saved.entry.id);
    report_media(saved.media).await
}

/// Current images minus the ones asked to be removed.
pub fn kept_images(entry: &DiaryEntry, remove: &[String]) -> Result<Vec<GalleryImage>, CliError> {
    for path in remove {
        if !entry.images.iter().any(|image| image == path.trim()) {
            return Err(CliError::UnknownImage(path.clone()));
        }
    }

    Ok(entry
        .images
        .iter()
        .filter(|image| !remove.iter().any(|path| path.trim() == image.as_str()))
        .map(GalleryImage::remote)
        .collect())
}
