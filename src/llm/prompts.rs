//! Prompt templates bound to a completion provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{CodeGenerator, CompletionProvider};
use crate::templates;

/// [`CodeGenerator`] that renders the embedded templates for a provider.
pub(crate) struct PromptedGenerator {
    provider: Box<dyn CompletionProvider>,
}

impl PromptedGenerator {
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

#[async_trait]
impl CodeGenerator for PromptedGenerator {
    async fn generate(&self, task: &str, file_state: &str) -> Result<String> {
        let human = render_template(
            templates::GENERATE_HUMAN,
            &[("task", task), ("file_state", file_state)],
        );
        debug!("Generation prompt: {} bytes", human.len());
        self.provider
            .complete(templates::GENERATE_SYSTEM, &human)
            .await
            .with_context(|| format!("{} generation call failed", self.provider.name()))
    }

    async fn repair(&self, file_state: &str, error_output: &str) -> Result<String> {
        let human = render_template(
            templates::REPAIR_HUMAN,
            &[("file_state", file_state), ("error", error_output)],
        );
        debug!("Repair prompt: {} bytes", human.len());
        self.provider
            .complete(templates::REPAIR_SYSTEM, &human)
            .await
            .with_context(|| format!("{} repair call failed", self.provider.name()))
    }
}

/// Substitutes `{name}` placeholders in one pass.
///
/// Substituted values are never rescanned, so braces inside a task or a
/// file body come through untouched. Unknown placeholders are kept as-is.
pub(crate) fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
