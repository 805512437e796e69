//! Command-line interface for tasktree
//!
//! This module defines the CLI structure using clap derive macros.
//! Command handlers live in `task`; `session` replays stdin lines against a
//! single coordinator.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;

mod context;
mod session;
mod task;

pub use context::Context;
pub use session::split_line;

/// tasktree - hierarchical task manager
///
/// Keeps a parent/child task hierarchy in sync with a persistent store,
/// with undo of recent changes and a FIFO queue of scheduled tasks.
#[derive(Parser, Debug)]
#[command(name = "tasktree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding `.tasktree.toml` and the store (defaults to current directory)
    #[arg(long, global = true, env = "TASKTREE_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL events to a file path or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tasks, optionally filtered by one attribute
    List {
        #[arg(long, conflicts_with_all = ["priority", "kind"])]
        status: Option<String>,

        #[arg(long, conflicts_with = "kind")]
        priority: Option<String>,

        /// Filter by classification
        #[arg(long = "type")]
        kind: Option<String>,

        /// Order by creation time: asc or desc
        #[arg(long)]
        sort: Option<String>,
    },

    /// Show one task
    Show { id: String },

    /// Print the task hierarchy
    Tree,

    /// Create a top-level task
    Create {
        title: String,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Create a task under an existing parent
    Subtask {
        parent: String,
        title: String,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Change fields of an existing task
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: TaskFields,

        /// Move the task under another parent
        #[arg(long, conflicts_with = "root")]
        parent: Option<String>,

        /// Move the task to the top level
        #[arg(long)]
        root: bool,

        /// Set the configured in-progress status
        #[arg(long, conflicts_with = "status")]
        start: bool,
    },

    /// Delete a task and its subtasks
    Delete { id: String },

    /// Mark a task completed
    Complete { id: String },

    /// Reverse the most recent change
    Undo,

    /// Queue a task for processing
    Schedule { id: String },

    /// Take the next scheduled task
    Next,

    /// Show the next scheduled task without taking it
    Peek,

    /// List scheduled tasks in order
    Queue,

    /// Show the audit log
    Log {
        /// Only the most recent entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Read commands from stdin, one per line, sharing undo history and queue
    Session,
}

/// Optional task attributes shared by create, subtask and update
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TaskFields {
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    /// Classification label
    #[arg(long = "type")]
    pub kind: Option<String>,

    #[arg(long)]
    pub status: Option<String>,
}

impl Commands {
    /// Name used in JSON envelopes.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::List { .. } => "list",
            Commands::Show { .. } => "show",
            Commands::Tree => "tree",
            Commands::Create { .. } => "create",
            Commands::Subtask { .. } => "subtask",
            Commands::Update { .. } => "update",
            Commands::Delete { .. } => "delete",
            Commands::Complete { .. } => "complete",
            Commands::Undo => "undo",
            Commands::Schedule { .. } => "schedule",
            Commands::Next => "next",
            Commands::Peek => "peek",
            Commands::Queue => "queue",
            Commands::Log { .. } => "log",
            Commands::Session => "session",
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context::open(self.dir, self.events.as_deref())?;
        let output = ctx.output_options(self.json, self.quiet);
        match self.command {
            Commands::Session => session::run(&ctx, output, std::io::stdin().lock()),
            command => dispatch(&ctx, command, output),
        }
    }
}

/// Run one non-session command against `ctx`.
pub(crate) fn dispatch(ctx: &Context, command: Commands, output: OutputOptions) -> Result<()> {
    match command {
        Commands::List {
            status,
            priority,
            kind,
            sort,
        } => task::run_list(
            ctx,
            task::ListOptions {
                status,
                priority,
                kind,
                sort,
                output,
            },
        ),
        Commands::Show { id } => task::run_show(ctx, task::IdOptions { id, output }),
        Commands::Tree => task::run_tree(ctx, output),
        Commands::Create { title, fields } => task::run_create(
            ctx,
            task::CreateOptions {
                title,
                parent: None,
                fields,
                output,
            },
        ),
        Commands::Subtask {
            parent,
            title,
            fields,
        } => task::run_create(
            ctx,
            task::CreateOptions {
                title,
                parent: Some(parent),
                fields,
                output,
            },
        ),
        Commands::Update {
            id,
            title,
            fields,
            parent,
            root,
            start,
        } => task::run_update(
            ctx,
            task::UpdateOptions {
                id,
                title,
                fields,
                parent,
                root,
                start,
                output,
            },
        ),
        Commands::Delete { id } => task::run_delete(ctx, task::IdOptions { id, output }),
        Commands::Complete { id } => task::run_complete(ctx, task::IdOptions { id, output }),
        Commands::Undo => task::run_undo(ctx, output),
        Commands::Schedule { id } => task::run_schedule(ctx, task::IdOptions { id, output }),
        Commands::Next => task::run_next(ctx, output),
        Commands::Peek => task::run_peek(ctx, output),
        Commands::Queue => task::run_queue(ctx, output),
        Commands::Log { limit } => task::run_log(ctx, task::LogOptions { limit, output }),
        Commands::Session => Err(crate::error::Error::InvalidArgument(
            "session cannot be nested".to_string(),
        )),
    }
}
