use diary_core::media::DrainReport;
use diary_core::models::{PendingDelete, PendingUpload};
use serde::Serialize;

use crate::cli::QueueCommands;
use crate::commands::common::format_failure;
use crate::context::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub uploads: Vec<PendingUpload>,
    pub deletes: Vec<PendingDelete>,
}

pub async fn run_queue(command: QueueCommands, ctx: &AppContext) -> Result<(), CliError> {
    match command {
        QueueCommands::List { json } => {
            let snapshot = QueueSnapshot {
                uploads: ctx.store().list_uploads().await?,
                deletes: ctx.store().list_deletes().await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                for line in format_queue_lines(&snapshot) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        QueueCommands::Drain => {
            let report = ctx.driver().drain().await?;
            for line in format_drain_summary(&report) {
                println!("{line}");
            }
            Ok(())
        }
        QueueCommands::DiscardUpload { id } => {
            if !ctx.store().remove_upload(id).await? {
                return Err(CliError::PendingNotFound { kind: "upload", id });
            }
            println!("Discarded pending upload {id}");
            Ok(())
        }
        QueueCommands::DiscardDelete { id } => {
            if !ctx.store().remove_delete(id).await? {
                return Err(CliError::PendingNotFound { kind: "delete", id });
            }
            println!("Discarded pending delete {id}");
            Ok(())
        }
        QueueCommands::Watch => {
            eprintln!("Watching pending deletes; press Ctrl-C to stop.");
            ctx.driver()
                .watch_deletes(async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await?;
            Ok(())
        }
    }
}

pub fn format_queue_lines(snapshot: &QueueSnapshot) -> Vec<String> {
    if snapshot.uploads.is_empty() && snapshot.deletes.is_empty() {
        return vec!["No pending media operations.".to_string()];
    }

    let mut lines = Vec::new();
    for upload in &snapshot.uploads {
        let resumable = if upload.resume_token.is_some() {
            " (resumable)"
        } else {
            ""
        };
        lines.push(format!(
            "upload {:>5}  {} <- {}{resumable}",
            upload.id, upload.remote_path, upload.local_source
        ));
    }
    for delete in &snapshot.deletes {
        lines.push(format!("delete {:>5}  {}", delete.id, delete.remote_path));
    }
    lines
}

pub fn format_drain_summary(report: &DrainReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Attempted {} pending operation(s), {} succeeded",
        report.attempted(),
        report.succeeded()
    )];
    lines.extend(report.failures().into_iter().map(format_failure));
    lines
}
