//! Line-oriented session: every stdin line is one command run against the
//! same coordinator, so undo history and the schedule queue carry over.

use std::io::BufRead;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;

use crate::cli::{dispatch, Commands, Context};
use crate::error::{Error, Result};
use crate::output::{emit_error, OutputOptions};

#[derive(Parser, Debug)]
#[command(name = "tasktree", no_binary_name = true, disable_version_flag = true)]
struct SessionLine {
    #[command(subcommand)]
    command: Commands,
}

pub fn run(ctx: &Context, output: OutputOptions, input: impl BufRead) -> Result<()> {
    let mut commands = 0usize;
    let mut failures = 0usize;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            break;
        }
        commands += 1;

        let tokens = match split_line(trimmed) {
            Ok(tokens) => tokens,
            Err(err) => {
                failures += 1;
                emit_error("session", &err, output.json)?;
                continue;
            }
        };
        let command = match SessionLine::try_parse_from(tokens) {
            Ok(parsed) => parsed.command,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::DisplayHelp
                        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) =>
            {
                if !output.quiet {
                    print!("{err}");
                }
                continue;
            }
            Err(err) => {
                failures += 1;
                let rendered = err.to_string();
                let first = rendered.lines().next().unwrap_or_default();
                let err = Error::InvalidArgument(first.trim_start_matches("error: ").to_string());
                emit_error("session", &err, output.json)?;
                continue;
            }
        };

        let name = command.name();
        if let Err(err) = dispatch(ctx, command, output) {
            failures += 1;
            emit_error(name, &err, output.json)?;
        }
    }

    info!(commands, failures, "session finished");
    Ok(())
}

/// Split a command line into words with shell quoting rules.
pub fn split_line(line: &str) -> Result<Vec<String>> {
    shell_words::split(line)
        .map_err(|err| Error::InvalidArgument(format!("cannot split command line: {err}")))
}
