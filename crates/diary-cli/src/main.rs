//! Diary CLI - dated journal entries with photos from the terminal
//!
//! Photos go through a durable media queue: a command never waits on object
//! storage to record an entry, and anything left pending is retried the next
//! time the CLI starts.

mod cli;
mod commands;
mod context;
mod error;
mod media_client;
mod session;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::delete::{run_delete, run_delete_all};
use crate::commands::queue::run_queue;
use crate::commands::sync::run_sync;
use crate::commands::{add, edit, list, show};
use crate::context::AppContext;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "diary=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let ctx = AppContext::open(cli.data_dir.clone()).await?;
    if cli.runs_startup_drain() {
        ctx.startup_drain().await?;
    }

    match cli.command {
        Commands::Auth { command } => run_auth(command, &ctx)?,
        Commands::Add {
            title,
            description,
            mood,
            date,
            images,
        } => {
            let args = add::AddArgs {
                title,
                description,
                mood,
                date,
                images,
            };
            add::run_add(args, &ctx).await?;
        }
        Commands::Edit {
            id,
            title,
            description,
            mood,
            date,
            add_images,
            remove_images,
        } => {
            let args = edit::EditArgs {
                id,
                title,
                description,
                mood,
                date,
                add_images,
                remove_images,
            };
            edit::run_edit(args, &ctx).await?;
        }
        Commands::Delete { id } => run_delete(&id, &ctx).await?,
        Commands::DeleteAll { yes } => run_delete_all(yes, &ctx).await?,
        Commands::List { date, json } => list::run_list(date.as_deref(), json, &ctx).await?,
        Commands::Show { id, json } => show::run_show(&id, json, &ctx).await?,
        Commands::Sync => run_sync(&ctx).await?,
        Commands::Queue { command } => run_queue(command, &ctx).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
