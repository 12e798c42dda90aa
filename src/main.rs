//! crucible: generate, test and repair code in disposable Docker sandboxes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod extract;
mod files;
mod heal;
mod llm;
mod profile;
mod report;
mod sandbox;
mod session;
mod templates;

#[derive(Parser)]
#[command(name = "crucible")]
#[command(
    author,
    version,
    about = "Self-healing sandbox loops - generate, test and repair code in disposable containers"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task in a fresh sandbox until its tests pass or attempts run out
    Run {
        /// Task description (e.g. "Create a Flask hello world with a pytest test")
        task: Option<String>,

        /// Read the task description from a file
        #[arg(short = 'f', long, conflicts_with = "task")]
        task_file: Option<PathBuf>,

        /// LLM provider: gemini or openai (overrides config)
        #[arg(short, long)]
        provider: Option<String>,

        /// Write the final file tree to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON session report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show the language profile a task resolves to
    Profile {
        /// Task description
        task: String,
    },

    /// Write a default crucible.toml in the current directory
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run {
            task,
            task_file,
            provider,
            output,
            report,
        } => {
            commands::run::run(commands::run::RunOptions {
                task,
                task_file,
                provider,
                output,
                report,
            })
            .await?;
        }
        Commands::Profile { task } => {
            commands::profile::run(&task)?;
        }
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
    }

    Ok(())
}

/// Sets up terminal logging and the optional JSON log file.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "crucible=debug" } else { "crucible=info" };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(level)),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}
