use diary_core::models::EntryDraft;

use crate::commands::common::{parse_entry_date, parse_mood, report_media};
use crate::context::AppContext;
use crate::error::CliError;

pub struct AddArgs {
    pub title: String,
    pub description: String,
    pub mood: Option<String>,
    pub date: Option<String>,
    pub images: Vec<String>,
}

pub async fn run_add(args: AddArgs, ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;

    let images = args
        .images
        .iter()
        .map(|path| service.pick_image(path))
        .collect::<Result<Vec<_>, _>>()?;
    let draft = EntryDraft {
        id: None,
        title: args.title,
        description: args.description,
        mood: parse_mood(args.mood.as_deref())?.unwrap_or_default(),
        date: args.date.as_deref().map(parse_entry_date).transpose()?,
        images,
    };

    let saved = service.save_entry(draft).await?;
    println!("{}", saved.entry.id);
    report_media(saved.media).await
}
