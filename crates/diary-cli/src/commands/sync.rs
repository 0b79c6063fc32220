use crate::context::AppContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    let service = ctx.diary_service().await?;
    if !service.is_sync_enabled().await {
        return Err(CliError::SyncNotConfigured);
    }

    service.sync().await?;
    println!("Sync completed");
    Ok(())
}
