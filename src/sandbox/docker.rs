use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, RemoveContainerOptions,
    StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use super::{ContainerEngine, ExecOutput, SandboxError, SandboxImage};
use crate::profile::WORKDIR;

/// [`ContainerEngine`] backed by the local Docker daemon.
pub(crate) struct DockerEngine {
    docker: Docker,
    stop_timeout_secs: i64,
}

impl DockerEngine {
    /// Connects to the local daemon and checks that it answers.
    pub async fn connect(stop_timeout_secs: i64) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            SandboxError::docker_unavailable(format!("Failed to connect to Docker: {e}"))
        })?;

        docker.ping().await.map_err(|e| {
            SandboxError::docker_unavailable(format!("Cannot ping Docker daemon: {e}"))
        })?;

        Ok(Self {
            docker,
            stop_timeout_secs,
        })
    }
}

fn container_name(image: &SandboxImage) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-run-{}", image.tag, &id[..8])
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build_image(&self, tag: &str, context: Bytes) -> Result<(), SandboxError> {
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self.docker.build_image(options, None, Some(context));

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(info) => {
                    if let Some(text) = &info.stream {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            debug!("build: {}", trimmed);
                        }
                    } else if let Some(error) = &info.error {
                        return Err(SandboxError::build_failed(tag, error.clone()));
                    } else if let Some(message) =
                        info.error_detail.as_ref().and_then(|d| d.message.as_ref())
                    {
                        return Err(SandboxError::build_failed(tag, message.clone()));
                    }
                }
                Err(e) => return Err(SandboxError::build_failed(tag, e.to_string())),
            }
        }

        Ok(())
    }

    async fn start_container(&self, image: &SandboxImage) -> Result<String, SandboxError> {
        let name = container_name(image);
        let config = ContainerConfig {
            image: Some(image.tag.clone()),
            working_dir: Some(WORKDIR.to_string()),
            tty: Some(true),
            open_stdin: Some(true),
            ..Default::default()
        };

        debug!("Creating container: {}", name);
        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;

        debug!("Starting container: {}", name);
        if let Err(e) = self.docker.start_container::<String>(&name, None).await {
            let _ = self
                .docker
                .remove_container(
                    &name,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
            return Err(e.into());
        }

        info!("Container running: {}", name);
        Ok(name)
    }

    async fn exec(&self, container_id: &str, argv: &[String]) -> Result<ExecOutput, SandboxError> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some(WORKDIR.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let mut frames = Vec::new();

        if let StartExecResults::Attached {
            output: mut stream, ..
        } = self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(
                        LogOutput::StdOut { message }
                        | LogOutput::StdErr { message }
                        | LogOutput::Console { message },
                    ) => {
                        frames.push(message);
                    }
                    Ok(LogOutput::StdIn { .. }) => {}
                    Err(e) => {
                        warn!("Error reading exec output: {}", e);
                    }
                }
            }
        }

        let exit_code = self.docker.inspect_exec(&exec.id).await?.exit_code;
        Ok(ExecOutput {
            exit_code,
            output: decode_frames(&frames),
        })
    }

    async fn upload(
        &self,
        container_id: &str,
        dir: &str,
        archive: Bytes,
    ) -> Result<(), SandboxError> {
        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptions {
                    path: dir.to_string(),
                    ..Default::default()
                }),
                archive,
            )
            .await?;
        Ok(())
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), SandboxError> {
        self.docker
            .stop_container(
                container_id,
                Some(StopContainerOptions {
                    t: self.stop_timeout_secs,
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), SandboxError> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_image(&self, image: &SandboxImage) -> Result<(), SandboxError> {
        self.docker
            .remove_image(
                &image.tag,
                Some(RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        debug!("Removed image {}", image.tag);
        Ok(())
    }
}

/// Decodes exec stream frames as one buffer; a character may straddle two frames.
fn decode_frames(frames: &[Bytes]) -> String {
    let bytes: Vec<u8> = frames.iter().flat_map(|f| f.iter().copied()).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_derives_from_image_tag() {
        let image = SandboxImage {
            tag: "crucible-sandbox-1a2b3c4d".to_string(),
        };
        let first = container_name(&image);
        let second = container_name(&image);
        assert!(first.starts_with("crucible-sandbox-1a2b3c4d-run-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_decode_frames_keeps_split_characters() {
        let frames = [
            Bytes::from_static(b"caf\xc3"),
            Bytes::from_static(b"\xa9 ok\n"),
        ];
        assert_eq!(decode_frames(&frames), "café ok\n");
    }

    #[test]
    fn test_decode_frames_replaces_invalid_bytes() {
        let frames = [Bytes::from_static(b"a\xff"), Bytes::from_static(b"b")];
        assert_eq!(decode_frames(&frames), "a\u{fffd}b");
    }

    #[tokio::test]
    async fn test_connect_without_docker() {
        // Passes with or without a daemon; only the error shape is checked.
        match DockerEngine::connect(5).await {
            Ok(_) => {}
            Err(e) => assert!(e.is_docker_unavailable(), "Unexpected error: {e}"),
        }
    }
}
