//! Final artifact extraction.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::sandbox::Sandbox;

/// Lists the sandbox tree, then prints every file as a `---path---` record.
pub(crate) const EXTRACT_SCRIPT: &str =
    r#"ls -R && for f in $(find . -type f); do echo "---$f---"; cat $f; done"#;

/// Serializes the sandbox working directory into one text blob.
///
/// The output is returned unparsed.
pub(crate) async fn extract(sandbox: &Sandbox) -> Result<String> {
    info!("Extracting final file tree");
    let argv = [
        "bash".to_string(),
        "-c".to_string(),
        EXTRACT_SCRIPT.to_string(),
    ];
    let result = sandbox
        .exec_args(&argv)
        .await
        .context("Failed to extract files from sandbox")?;
    debug!("Artifact: {} bytes", result.output.len());
    Ok(result.output)
}
