use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::files::FileState;
use crate::heal::{LoopReport, LoopStatus, PatchRecord};
use crate::profile::Language;

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionReport {
    pub task: String,
    pub profile: Language,
    pub image_tag: String,
    pub status: LoopStatus,
    pub test_runs: u32,
    pub patches: Vec<PatchRecord>,
    pub last_test_output: String,
    pub file_state: FileState,
    pub artifact: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn new(
        task: &str,
        profile: Language,
        image_tag: &str,
        outcome: LoopReport,
        artifact: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task: task.to_string(),
            profile,
            image_tag: image_tag.to_string(),
            status: outcome.status,
            test_runs: outcome.test_runs,
            patches: outcome.patches,
            last_test_output: outcome.last_test_output,
            file_state: outcome.file_state,
            artifact,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize report")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        Ok(())
    }
}
