use crate::commands::common::{report_media, resolve_entry};
use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;
    let entry = resolve_entry(id, &service).await?;

    let report = service.delete_entry(&entry.id).await?;
    println!("{}", entry.id);
    report_media(report.media).await
}

pub async fn run_delete_all(confirmed: bool, ctx: &AppContext) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }

    let service = ctx.diary_service().await?;
    let report = service.delete_all_entries().await?;
    println!("Deleted {} entries", report.removed);
    report_media(report.media).await
}
