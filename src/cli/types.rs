//! CLI type definitions: clap command structures.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image-orchestrator")]
#[command(about = "Batched image-generation task orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to a YAML config file, loaded in place of the default
    /// `orchestrator.yaml`/`orchestrator.local.yaml` layering.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run both subtask-worker pools (normal + ops) and the task-monitor
    /// respawn sweep in one process. Pair with the `image-orchestrator-serve`
    /// binary (in the `image-orchestrator-api` crate) for the HTTP surface.
    Serve,

    /// Run only the subtask-worker pool against one logical queue.
    Worker {
        /// Which logical queue to drain (`normal` or `ops`).
        #[arg(short, long, default_value = "normal")]
        queue: String,

        /// Number of subtasks processed concurrently.
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Run only the task-monitor respawn sweep (picks up every task still
    /// `processing` and watches it to a terminal state).
    Monitor,

    /// Apply embedded SQL migrations against the configured database.
    Migrate,

    /// Task management commands.
    #[command(subcommand)]
    Task(TaskCommands),
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Submit a new task from a `TaskSpec` JSON file (or stdin with `-`).
    Submit {
        /// Path to a JSON file holding the `TaskSpec`, or `-` for stdin.
        spec_file: String,

        /// User id to attribute the submission to.
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// List tasks.
    List {
        /// Filter by status (pending, processing, completed, failed, cancelled).
        #[arg(short, long)]
        status: Option<String>,

        /// Page number (1-indexed).
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size.
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },

    /// Show task details.
    Show {
        /// Task id.
        id: String,
    },

    /// Cancel a task.
    Cancel {
        /// Task id.
        id: String,
    },

    /// Show the coordinate-grid matrix view of a task (spec §4.8).
    Matrix {
        /// Task id.
        id: String,
    },
}
