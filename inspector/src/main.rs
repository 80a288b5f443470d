//! Replay DOM mutation traces against a selection tracker.
//!
//! Each trace describes a document and a sequence of selections and tree
//! edits. The command prints every event the selection publishes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use inspector::exit_codes;
use inspector::io::config::{TrackerConfig, load_config};
use inspector::io::trace_store::{TRACE_SCHEMA, load_trace};
use inspector::logging;
use inspector::replay::replay;

#[derive(Parser)]
#[command(
    name = "inspector",
    version,
    about = "Replay DOM mutation traces against a selection tracker"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a trace and print the events the selection publishes.
    Replay {
        /// Path to the trace JSON file.
        trace: PathBuf,
        /// Tracker configuration (TOML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the outcome as JSON instead of one line per event.
        #[arg(long)]
        json: bool,
    },
    /// Print the trace JSON Schema.
    Schema,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            trace,
            config,
            json,
        } => cmd_replay(&trace, config.as_deref(), json),
        Command::Schema => {
            print!("{}", TRACE_SCHEMA);
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_replay(trace_path: &Path, config: Option<&Path>, json: bool) -> Result<i32> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => TrackerConfig::default(),
    };
    let trace = load_trace(trace_path)?;
    let outcome = replay(&trace, &config)
        .with_context(|| format!("replay {}", trace_path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serialize outcome")?
        );
    } else {
        for event in &outcome.events {
            println!("{}", event);
        }
    }
    Ok(outcome.exit_code())
}
