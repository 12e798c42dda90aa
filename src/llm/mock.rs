//! Scripted code generator for testing.
//!
//! Returns predetermined generation and repair responses and records every
//! call so loop tests can assert on the context the collaborator saw.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::CodeGenerator;

/// A single scripted response.
#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    /// Return the given text.
    Success(String),
    /// Fail with the given message.
    Error(String),
}

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GeneratorCall {
    Generate { task: String, file_state: String },
    Repair { file_state: String, error_output: String },
}

#[derive(Debug, Default)]
struct Script {
    generate: VecDeque<MockResponse>,
    repair: VecDeque<MockResponse>,
    calls: Vec<GeneratorCall>,
}

/// A [`CodeGenerator`] driven by scripted responses.
///
/// Once a queue is exhausted its last response repeats.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    pub fn new(generate: Vec<MockResponse>, repair: Vec<MockResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                generate: generate.into(),
                repair: repair.into(),
                calls: Vec::new(),
            })),
        }
    }

    /// Generates `app` then `test`, and answers every repair with `fix`.
    pub fn files(app: &str, test: &str, fix: &str) -> Self {
        Self::new(
            vec![
                MockResponse::Success(app.to_string()),
                MockResponse::Success(test.to_string()),
            ],
            vec![MockResponse::Success(fix.to_string())],
        )
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn repair_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GeneratorCall::Repair { .. }))
            .count()
    }
}

fn next(queue: &mut VecDeque<MockResponse>) -> Result<String> {
    let response = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    match response {
        Some(MockResponse::Success(text)) => Ok(text),
        Some(MockResponse::Error(msg)) => anyhow::bail!("{msg}"),
        None => anyhow::bail!("no scripted response left"),
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(&self, task: &str, file_state: &str) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GeneratorCall::Generate {
            task: task.to_string(),
            file_state: file_state.to_string(),
        });
        next(&mut script.generate)
    }

    async fn repair(&self, file_state: &str, error_output: &str) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GeneratorCall::Repair {
            file_state: file_state.to_string(),
            error_output: error_output.to_string(),
        });
        next(&mut script.repair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generator_order_and_repeat() {
        let generator = ScriptedGenerator::files("app", "test", "fix");
        assert_eq!(generator.generate("t", "s").await.unwrap(), "app");
        assert_eq!(generator.generate("t", "s").await.unwrap(), "test");
        assert_eq!(generator.generate("t", "s").await.unwrap(), "test");
        assert_eq!(generator.repair("s", "e").await.unwrap(), "fix");
        assert_eq!(generator.repair("s", "e").await.unwrap(), "fix");
        assert_eq!(generator.repair_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_generator_error() {
        let generator = ScriptedGenerator::new(
            vec![MockResponse::Error("quota exceeded".to_string())],
            vec![],
        );
        let err = generator.generate("t", "s").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(generator.repair("s", "e").await.is_err());
    }
}
