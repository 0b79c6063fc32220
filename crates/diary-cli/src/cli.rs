use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "diary")]
#[command(about = "Keep a dated diary with photos from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the entry and media queue databases
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Skip retrying pending media operations on startup
    #[arg(long, global = true)]
    pub no_drain: bool,
}

impl Cli {
    /// Whether pending media should be retried before the command runs.
    ///
    /// `queue drain` and `queue watch` attempt the queues themselves.
    pub const fn runs_startup_drain(&self) -> bool {
        if self.no_drain {
            return false;
        }
        !matches!(
            self.command,
            Commands::Queue {
                command: QueueCommands::Drain | QueueCommands::Watch
            }
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out, or show the current user
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Write a new entry
    #[command(alias = "new")]
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// One of the diary moods (default: neutral)
        #[arg(long)]
        mood: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD (default: now)
        #[arg(long)]
        date: Option<String>,
        /// Local photo to attach; repeatable
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<String>,
    },
    /// Change an existing entry
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        mood: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// Local photo to attach; repeatable
        #[arg(long = "add-image", value_name = "PATH")]
        add_images: Vec<String>,
        /// Remote path of an attached photo to drop; repeatable
        #[arg(long = "remove-image", value_name = "REMOTE_PATH")]
        remove_images: Vec<String>,
    },
    /// Delete an entry and its photos
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Delete every entry of the signed-in user and all their photos
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// List entries grouped by day, newest first
    List {
        /// Only entries on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one entry
    Show {
        /// Entry ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync local replica with remote Turso database
    Sync,
    /// Inspect and retry pending media operations
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Remember a signed-in user for this data directory
    Login {
        /// Identity provider user id; namespaces entries and photos
        #[arg(long, value_name = "ID")]
        user_id: String,
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
    },
    /// Show the signed-in user
    Status,
    /// Forget the signed-in user
    Logout,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show pending uploads and deletes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Attempt every pending operation once
    Drain,
    /// Drop a pending upload that can never succeed
    DiscardUpload {
        /// Pending upload id
        id: i64,
    },
    /// Drop a pending delete
    DiscardDelete {
        /// Pending delete id
        id: i64,
    },
    /// Keep retrying pending deletes as they appear, until Ctrl-C
    Watch,
}
