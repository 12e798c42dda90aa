//! Domain-specific error types for sandbox operations.
//!
//! Typed errors let the session tell a soft build failure apart from
//! failures that must abort the session.

use std::time::Duration;

/// Errors that can occur during sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// The image build step failed.
    #[error("Image build failed for {tag}: {message}")]
    BuildFailed { tag: String, message: String },

    /// A command inside the container exceeded the configured timeout.
    #[error("Command `{command}` timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// Container operation failed (create, start, exec, upload, etc.).
    #[error("Container operation failed: {message}")]
    ContainerFailed { message: String },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `BuildFailed` error.
    pub fn build_failed(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BuildFailed {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error from a `Duration`.
    pub fn timeout(command: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout_secs: duration.as_secs(),
        }
    }

    /// Creates a `ContainerFailed` error.
    pub fn container_failed(message: impl Into<String>) -> Self {
        Self::ContainerFailed {
            message: message.into(),
        }
    }

    /// Returns true if this is a build failure.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::BuildFailed { .. })
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if this is a Docker unavailability error.
    pub fn is_docker_unavailable(&self) -> bool {
        matches!(self, Self::DockerUnavailable { .. })
    }
}

impl From<bollard::errors::Error> for SandboxError {
    fn from(err: bollard::errors::Error) -> Self {
        Self::container_failed(err.to_string())
    }
}
