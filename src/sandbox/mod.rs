//! Disposable Docker sandboxes for generated code.
//!
//! The [`ContainerEngine`] trait is the seam to the container engine; the
//! Docker implementation talks to the daemon through bollard. A started
//! [`Sandbox`] is the only way the rest of the crate touches container state.

mod docker;
mod error;
mod image;
#[cfg(test)]
pub(crate) mod mock;

pub(crate) use docker::DockerEngine;
pub use error::SandboxError;
pub(crate) use image::ImageBuilder;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tar::{Builder, Header};
use tracing::{debug, info, warn};

use crate::profile::WORKDIR;

/// A built sandbox image, identified by its unique tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SandboxImage {
    pub tag: String,
}

/// Captured result of a command run inside the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExecOutput {
    /// Exit code reported by the engine, when it reports one.
    pub exit_code: Option<i64>,
    /// Interleaved stdout and stderr.
    pub output: String,
}

/// Operations the sandbox needs from a container engine.
#[async_trait]
pub(crate) trait ContainerEngine: Send + Sync {
    /// Builds an image from a tar build context and tags it.
    async fn build_image(&self, tag: &str, context: Bytes) -> Result<(), SandboxError>;

    /// Starts a detached container with a TTY and returns its id.
    async fn start_container(&self, image: &SandboxImage) -> Result<String, SandboxError>;

    /// Runs a command in the container's working directory.
    async fn exec(&self, container_id: &str, argv: &[String]) -> Result<ExecOutput, SandboxError>;

    /// Copies a tar archive into `dir` inside the container.
    async fn upload(&self, container_id: &str, dir: &str, archive: Bytes)
        -> Result<(), SandboxError>;

    async fn stop_container(&self, container_id: &str) -> Result<(), SandboxError>;

    async fn remove_container(&self, container_id: &str) -> Result<(), SandboxError>;

    async fn remove_image(&self, image: &SandboxImage) -> Result<(), SandboxError>;
}

/// Starts sandboxes and carries the per-session runtime settings.
#[derive(Clone)]
pub(crate) struct SandboxRuntime {
    engine: Arc<dyn ContainerEngine>,
    exec_timeout: Option<Duration>,
    remove_image: bool,
}

impl SandboxRuntime {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        exec_timeout: Option<Duration>,
        remove_image: bool,
    ) -> Self {
        Self {
            engine,
            exec_timeout,
            remove_image,
        }
    }

    /// Starts a container from `image`.
    ///
    /// The returned [`Sandbox`] owns both the container and the image; call
    /// [`Sandbox::teardown`] to release them.
    pub async fn start(&self, image: SandboxImage) -> Result<Sandbox, SandboxError> {
        info!("Starting sandbox container from {}", image.tag);
        let container_id = self.engine.start_container(&image).await?;
        debug!("Sandbox container started: {}", container_id);

        Ok(Sandbox {
            engine: Arc::clone(&self.engine),
            image,
            container_id,
            exec_timeout: self.exec_timeout,
            remove_image: self.remove_image,
            torn_down: false,
        })
    }

    /// Removes an image that never got a container.
    pub async fn discard_image(&self, image: &SandboxImage) {
        if !self.remove_image {
            return;
        }
        if let Err(e) = self.engine.remove_image(image).await {
            warn!("Failed to remove image {}: {}", image.tag, e);
        }
    }
}

/// A running sandbox container.
pub(crate) struct Sandbox {
    engine: Arc<dyn ContainerEngine>,
    image: SandboxImage,
    container_id: String,
    exec_timeout: Option<Duration>,
    remove_image: bool,
    torn_down: bool,
}

impl Sandbox {
    /// Runs a shell-style command line, e.g. `npm test`.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput, SandboxError> {
        let argv = shell_words::split(command).map_err(|e| {
            SandboxError::container_failed(format!("Failed to parse command `{command}`: {e}"))
        })?;
        if argv.is_empty() {
            return Err(SandboxError::container_failed("Command cannot be empty"));
        }
        self.exec_args(&argv).await
    }

    /// Runs a command given as an argument vector.
    ///
    /// With a timeout configured the command runs under coreutils `timeout`
    /// inside the container, so an overrunning process is killed there and
    /// never outlives its run.
    pub async fn exec_args(&self, argv: &[String]) -> Result<ExecOutput, SandboxError> {
        debug!("exec in {}: {:?}", self.container_id, argv);
        let Some(limit) = self.exec_timeout else {
            return self.engine.exec(&self.container_id, argv).await;
        };

        let wrapped = with_timeout(argv, limit);
        let backstop = limit + Duration::from_secs(KILL_AFTER_SECS + BACKSTOP_SLACK_SECS);
        let output = tokio::time::timeout(backstop, self.engine.exec(&self.container_id, &wrapped))
            .await
            .map_err(|_| SandboxError::timeout(argv.join(" "), limit))??;

        if output.exit_code.is_some_and(|code| TIMEOUT_EXIT_CODES.contains(&code)) {
            return Err(SandboxError::timeout(argv.join(" "), limit));
        }
        Ok(output)
    }

    /// Writes `content` to `filename` in the sandbox working directory.
    pub async fn write_file(&self, filename: &str, content: &str) -> Result<(), SandboxError> {
        let archive = single_file_archive(filename, content.as_bytes())
            .map_err(|e| SandboxError::container_failed(format!("Failed to pack {filename}: {e}")))?;
        self.engine
            .upload(&self.container_id, WORKDIR, archive)
            .await?;
        debug!("Wrote {} ({} bytes)", filename, content.len());
        Ok(())
    }

    /// Reads a file from the sandbox working directory.
    pub async fn read_file(&self, filename: &str) -> Result<String, SandboxError> {
        let out = self
            .exec_args(&["cat".to_string(), filename.to_string()])
            .await?;
        Ok(out.output)
    }

    /// Stops and removes the container, then removes its image.
    ///
    /// Failures are logged; teardown always runs every step.
    pub async fn teardown(mut self) {
        info!("Cleaning up sandbox container {}", self.container_id);
        if let Err(e) = self.engine.stop_container(&self.container_id).await {
            warn!("Failed to stop container {}: {}", self.container_id, e);
        }
        if let Err(e) = self.engine.remove_container(&self.container_id).await {
            warn!("Failed to remove container {}: {}", self.container_id, e);
        }
        if self.remove_image {
            if let Err(e) = self.engine.remove_image(&self.image).await {
                warn!("Failed to remove image {}: {}", self.image.tag, e);
            }
        }
        self.torn_down = true;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!(
                "Sandbox container {} dropped without teardown; remove it manually",
                self.container_id
            );
        }
    }
}

/// Seconds between the TERM and KILL signals sent by `timeout`.
const KILL_AFTER_SECS: u64 = 5;

/// Extra wait on the host before giving up on an unresponsive exec.
const BACKSTOP_SLACK_SECS: u64 = 5;

/// `timeout` exits 124 after TERM and 137 when it had to KILL.
const TIMEOUT_EXIT_CODES: [i64; 2] = [124, 137];

/// Prefixes `argv` with coreutils `timeout` for `limit`.
fn with_timeout(argv: &[String], limit: Duration) -> Vec<String> {
    let mut wrapped = vec![
        "timeout".to_string(),
        "-k".to_string(),
        format!("{KILL_AFTER_SECS}s"),
        format!("{}s", limit.as_secs_f64()),
    ];
    wrapped.extend_from_slice(argv);
    wrapped
}

/// Packs a single file into an in-memory tar archive.
///
/// The entry carries the current time as its mtime; bytecode caches inside
/// the container use it to notice rewritten sources of the same size.
pub(crate) fn single_file_archive(name: &str, content: &[u8]) -> std::io::Result<Bytes> {
    let mut buf = Vec::new();
    {
        let mut tar = Builder::new(&mut buf);
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(u64::try_from(Utc::now().timestamp()).unwrap_or_default());
        header.set_cksum();
        tar.append_data(&mut header, name, content)?;
        tar.finish()?;
    }
    Ok(Bytes::from(buf))
}
