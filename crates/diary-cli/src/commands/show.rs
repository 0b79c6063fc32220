use crate::commands::common::{entry_to_list_item, format_timestamp, resolve_entry};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;
    let entry = resolve_entry(id, &service).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entry_to_list_item(&entry))?);
        return Ok(());
    }

    println!("{}", entry.title);
    println!("{}  ({})", format_timestamp(entry.date), entry.mood);
    println!();
    println!("{}", entry.description);
    if !entry.images.is_empty() {
        println!();
        for image in &entry.images {
            println!("  photo: {image}");
        }
    }
    Ok(())
}
