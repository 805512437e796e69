//! tasktree - hierarchical task manager CLI
//!
//! Keeps a parent/child task hierarchy in sync with a JSON task store, with
//! undo of recent changes and a FIFO schedule queue.

use clap::Parser;
use tasktree::cli::Cli;
use tasktree::config::Config;
use tasktree::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_filter(raw: &str) -> Option<EnvFilter> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > 4096 {
        return None;
    }
    EnvFilter::try_new(raw).ok()
}

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();

    // Tracing is opt-in via RUST_LOG, then `log_filter` in the config.
    // Invalid or oversized filters fall back to off.
    let config_filter = cli
        .dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .and_then(|dir| Config::load_from_dir(&dir).ok())
        .and_then(|config| config.log_filter);
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| parse_filter(&raw))
        .or_else(|| config_filter.as_deref().and_then(parse_filter))
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let events_to_stdout = cli
        .events
        .as_deref()
        .map(|value| value.trim() == "-")
        .unwrap_or(false);
    let json = cli.json && !events_to_stdout;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
