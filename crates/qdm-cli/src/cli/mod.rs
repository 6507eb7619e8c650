//! CLI for the QDM download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qdm_core::config;
use qdm_core::store::TaskStore;

use commands::{
    run_add, run_archive, run_discover, run_list, run_pause, run_queue, run_remove, run_resume,
    run_start,
};

/// Top-level CLI for the QDM download manager.
#[derive(Debug, Parser)]
#[command(name = "qdm")]
#[command(about = "QDM: queued, resumable download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add a download task to the queue.
    Add {
        /// HTTP/HTTPS URL (direct file or HLS playlist).
        url: String,
    },

    /// List queued tasks (or the archive with --archive).
    List {
        /// Show archived tasks instead of the active queue.
        #[arg(long)]
        archive: bool,
    },

    /// Run the engine: execute one task by queue position, or process the
    /// whole queue with --all.
    Start {
        /// Queue position of a single task to run.
        queue_id: Option<i64>,
        /// Process every queued task until the queue drains.
        #[arg(long)]
        all: bool,
        /// Run up to N tasks in parallel (overrides the config value).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Pause a downloading task by queue position, or all of them.
    Pause {
        /// Queue position.
        queue_id: Option<i64>,
        /// Pause every downloading task.
        #[arg(long)]
        all: bool,
    },

    /// Resume a paused task by queue position and run it.
    Resume {
        /// Queue position.
        queue_id: i64,
    },

    /// Remove a task by queue position.
    Remove {
        /// Queue position.
        queue_id: i64,
    },

    /// Reorder the queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Inspect or reuse archived tasks.
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },

    /// Classify a URL and list its downloadable candidates.
    Discover {
        /// URL to inspect (file, page, or HLS playlist).
        url: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueueAction {
    /// Move a task one position up or down.
    Move {
        /// Queue position of the task to move.
        queue_id: i64,
        /// Direction: "up" or "down".
        #[arg(value_enum)]
        direction: commands::MoveDirection,
    },
    /// Swap two queue positions.
    Swap {
        a: i64,
        b: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum ArchiveAction {
    /// List archived tasks, newest first.
    List,
    /// Re-queue an archived task as a fresh download.
    Clone {
        /// Archived task id.
        id: String,
    },
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = TaskStore::open_default().await?;

        match cli.command {
            CliCommand::Add { url } => run_add(&store, &url).await?,
            CliCommand::List { archive } => run_list(&store, archive).await?,
            CliCommand::Start { queue_id, all, jobs } => {
                run_start(&store, &cfg, queue_id, all, jobs).await?
            }
            CliCommand::Pause { queue_id, all } => run_pause(&store, &cfg, queue_id, all).await?,
            CliCommand::Resume { queue_id } => run_resume(&store, &cfg, queue_id).await?,
            CliCommand::Remove { queue_id } => run_remove(&store, queue_id).await?,
            CliCommand::Queue { action } => run_queue(&store, action).await?,
            CliCommand::Archive { action } => run_archive(&store, action).await?,
            CliCommand::Discover { url } => run_discover(&cfg, &url).await?,
        }

        Ok(())
    }
}
