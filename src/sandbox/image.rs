//! Ephemeral sandbox image builds.

use bytes::Bytes;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Builder;
use tracing::{debug, info, warn};

use super::{single_file_archive, ContainerEngine, SandboxError, SandboxImage};
use crate::profile::{LanguageProfile, Manifest};

const TAG_PREFIX: &str = "crucible-sandbox";

/// Builds one uniquely tagged image per call.
pub(crate) struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
    build_dir: PathBuf,
}

impl ImageBuilder {
    /// `build_dir` is where on-disk build contexts are created.
    pub fn new(engine: Arc<dyn ContainerEngine>, build_dir: PathBuf) -> Self {
        Self { engine, build_dir }
    }

    /// Builds the sandbox image for `profile`.
    ///
    /// Profiles with a package manifest get an on-disk build context that is
    /// deleted as soon as the engine returns, whether or not the build worked.
    pub async fn build(&self, profile: &LanguageProfile) -> Result<SandboxImage, SandboxError> {
        let tag = unique_tag();
        info!("Building sandbox image {} ({})", tag, profile.language);

        let dockerfile = profile.dockerfile();
        let result = match &profile.manifest {
            Some(manifest) => {
                let context = BuildContext::write(&self.build_dir, &tag, &dockerfile, manifest)
                    .map_err(|e| {
                        SandboxError::build_failed(&tag, format!("Failed to write build context: {e}"))
                    })?;
                let archive = context.archive().map_err(|e| {
                    SandboxError::build_failed(&tag, format!("Failed to archive build context: {e}"))
                })?;
                let result = self.engine.build_image(&tag, archive).await;
                drop(context);
                result
            }
            None => {
                let archive = single_file_archive("Dockerfile", dockerfile.as_bytes()).map_err(
                    |e| SandboxError::build_failed(&tag, format!("Failed to pack Dockerfile: {e}")),
                )?;
                self.engine.build_image(&tag, archive).await
            }
        };

        result?;
        info!("Image built: {}", tag);
        Ok(SandboxImage { tag })
    }
}

/// Generates an image tag no other call will produce.
pub(crate) fn unique_tag() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{TAG_PREFIX}-{}", &id[..8])
}

/// On-disk build context; its files are removed on drop.
struct BuildContext {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl BuildContext {
    fn write(
        build_root: &Path,
        tag: &str,
        dockerfile: &str,
        manifest: &Manifest,
    ) -> std::io::Result<Self> {
        let dir = build_root.join(tag);
        fs::create_dir_all(&dir)?;
        let mut context = Self {
            dir,
            files: Vec::new(),
        };

        for (name, content) in [(manifest.filename, manifest.content), ("Dockerfile", dockerfile)] {
            let path = context.dir.join(name);
            fs::write(&path, content)?;
            context.files.push(path);
        }
        debug!("Build context written to {}", context.dir.display());
        Ok(context)
    }

    fn archive(&self) -> std::io::Result<Bytes> {
        let mut buf = Vec::new();
        {
            let mut tar = Builder::new(&mut buf);
            tar.append_dir_all(".", &self.dir)?;
            tar.finish()?;
        }
        Ok(Bytes::from(buf))
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = fs::remove_file(file) {
                warn!("Failed to remove build file {}: {}", file.display(), e);
            }
        }
        let _ = fs::remove_dir(&self.dir);
        debug!("Build context removed: {}", self.dir.display());
    }
}
