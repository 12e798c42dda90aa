//! The `run` command: one self-healing sandbox session for a task.

mod format;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::llm::{build_provider, PromptedGenerator, Provider};
use crate::profile::resolve;
use crate::sandbox::DockerEngine;
use crate::session::{Session, SessionOutcome};

use format::{format_banner, format_build_failed, format_event, format_summary, BannerInfo};

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunOptions {
    pub task: Option<String>,
    pub task_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Runs a sandbox session and prints or writes the artifact.
pub(crate) async fn run(options: RunOptions) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd).context("Failed to load crucible.toml")?;

    let task = read_task(options.task.as_deref(), options.task_file.as_deref())?;
    let provider = resolve_provider(&config, options.provider.as_deref())?;

    let generator = PromptedGenerator::new(build_provider(provider, &config.llm)?);
    let profile = resolve(&task);
    let banner = BannerInfo::new(&profile, generator.provider_name(), &config.llm.model);
    print!("{}", format_banner(&banner));

    let engine = match DockerEngine::connect(config.sandbox.stop_timeout_secs).await {
        Ok(engine) => engine,
        Err(e) if e.is_docker_unavailable() => {
            bail!("{e}\nIs the Docker daemon running and reachable by this user?")
        }
        Err(e) => return Err(e).context("Failed to connect to Docker"),
    };
    let session = Session::new(Arc::new(engine), &config.sandbox, Box::new(generator));

    let outcome = session
        .run(&task, |event| println!("{}", format_event(event)))
        .await?;

    match &outcome {
        SessionOutcome::BuildFailed { message } => {
            println!("{}", format_build_failed(message));
        }
        SessionOutcome::Completed(report) => {
            print!("{}", format_summary(report));
            if let Some(path) = &options.report {
                report.save(path)?;
                println!("  Report:     {}", path.display().to_string().cyan());
            }
        }
    }

    emit_artifact(outcome.artifact(), options.output.as_deref())
}

/// Takes the task from the argument or from a file; exactly one must be given.
fn read_task(task: Option<&str>, task_file: Option<&Path>) -> Result<String> {
    let task = match (task, task_file) {
        (Some(_), Some(_)) => bail!("Pass the task as an argument or with --task-file, not both"),
        (Some(task), None) => task.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file: {}", path.display()))?,
        (None, None) => bail!("No task given. Pass it as an argument or with --task-file"),
    };

    let task = task.trim();
    if task.is_empty() {
        bail!("Task cannot be empty");
    }
    Ok(task.to_string())
}

fn emit_artifact(artifact: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, artifact)
                .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
            println!("  Artifact:   {}", path.display().to_string().cyan());
        }
        None => {
            println!("\n{}", "Final files:".yellow().bold());
            println!("{artifact}");
        }
    }
    Ok(())
}

/// Resolves the provider from CLI, env var, or config.
/// Priority: CLI flag > `CRUCIBLE_PROVIDER` env var > config file.
fn resolve_provider(config: &Config, provider_override: Option<&str>) -> Result<Provider> {
    let env_provider = std::env::var("CRUCIBLE_PROVIDER").ok();
    resolve_provider_with_env(config, provider_override, env_provider.as_deref())
}

/// Provider resolution with the env var value passed in.
fn resolve_provider_with_env(
    config: &Config,
    provider_override: Option<&str>,
    env_provider: Option<&str>,
) -> Result<Provider> {
    if let Some(p) = provider_override {
        debug!("Using CLI provider override: {}", p);
        return p.parse();
    }

    if let Some(env_val) = env_provider.filter(|v| !v.is_empty()) {
        debug!("Using CRUCIBLE_PROVIDER env var: {}", env_val);
        return env_val.parse();
    }

    config.llm.get_provider()
}
