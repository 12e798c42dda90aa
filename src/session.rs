//! One end-to-end sandbox session.
//!
//! Acquisition order is image, container, loop, extraction; release runs in
//! reverse and happens exactly once whether the loop passed, ran out of
//! attempts, or failed.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SandboxConfig;
use crate::extract::extract;
use crate::heal::{HealingLoop, LoopEvent, LoopReport};
use crate::llm::CodeGenerator;
use crate::profile::{resolve, LanguageProfile};
use crate::report::SessionReport;
use crate::sandbox::{ContainerEngine, ImageBuilder, Sandbox, SandboxRuntime};

/// Artifact text returned when the sandbox image cannot be built.
pub(crate) const BUILD_FAILED_ARTIFACT: &str = "Error: Docker build failed.";

/// Result of a session that did not hit a fatal error.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// The image build failed; no container was started.
    BuildFailed { message: String },
    /// The loop ran to a terminal state and the tree was extracted.
    Completed(Box<SessionReport>),
}

impl SessionOutcome {
    pub fn artifact(&self) -> &str {
        match self {
            Self::BuildFailed { .. } => BUILD_FAILED_ARTIFACT,
            Self::Completed(report) => &report.artifact,
        }
    }
}

pub(crate) struct Session {
    builder: ImageBuilder,
    runtime: SandboxRuntime,
    generator: Box<dyn CodeGenerator>,
}

impl Session {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        config: &SandboxConfig,
        generator: Box<dyn CodeGenerator>,
    ) -> Self {
        Self {
            builder: ImageBuilder::new(Arc::clone(&engine), config.build_dir()),
            runtime: SandboxRuntime::new(engine, config.exec_timeout(), config.remove_image),
            generator,
        }
    }

    /// Runs `task` in a fresh sandbox, reporting loop progress to `observer`.
    pub async fn run(
        &self,
        task: &str,
        observer: impl Fn(&LoopEvent<'_>) + Send + Sync,
    ) -> Result<SessionOutcome> {
        let started_at = Utc::now();
        let profile = resolve(task);
        info!(
            event = "session_start",
            profile = %profile.language,
            "Starting session ({} profile)",
            profile.language
        );

        let image = match self.builder.build(&profile).await {
            Ok(image) => image,
            Err(e) if e.is_build_failure() => {
                warn!("{}", e);
                return Ok(SessionOutcome::BuildFailed {
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e).context("Failed to build sandbox image"),
        };
        info!(event = "image_built", tag = %image.tag);

        let sandbox = match self.runtime.start(image.clone()).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                self.runtime.discard_image(&image).await;
                return Err(e).context("Failed to start sandbox container");
            }
        };

        let result = self.drive(&sandbox, &profile, task, observer).await;
        sandbox.teardown().await;
        let (outcome, artifact) = result?;

        let report = SessionReport::new(
            task,
            profile.language,
            &image.tag,
            outcome,
            artifact,
            started_at,
        );
        info!(
            event = "session_end",
            status = %report.status,
            test_runs = report.test_runs,
            patches = report.patches.len(),
        );
        Ok(SessionOutcome::Completed(Box::new(report)))
    }

    async fn drive(
        &self,
        sandbox: &Sandbox,
        profile: &LanguageProfile,
        task: &str,
        observer: impl Fn(&LoopEvent<'_>) + Send + Sync,
    ) -> Result<(LoopReport, String)> {
        let outcome = HealingLoop::new(self.generator.as_ref(), sandbox, profile)
            .with_observer(observer)
            .run(task)
            .await?;
        let artifact = extract(sandbox).await?;
        Ok((outcome, artifact))
    }
}
