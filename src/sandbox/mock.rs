//! In-memory container engine for tests.
//!
//! Keeps a fake working directory, replays scripted test-runner output and
//! records every call so tests can assert on lifecycle ordering.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ContainerEngine, ExecOutput, SandboxError, SandboxImage};

/// Output returned for test runs once the scripted outputs are used up.
const DEFAULT_TEST_OUTPUT: &str = "1 passed in 0.01s";

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EngineCall {
    /// Image build with the tag and the file names found in the context archive.
    Build(String, Vec<String>),
    Start(String),
    Exec(Vec<String>),
    Upload(Vec<String>),
    Stop,
    Remove,
    RemoveImage(String),
}

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<String, String>,
    test_outputs: VecDeque<String>,
    calls: Vec<EngineCall>,
}

/// A scripted [`ContainerEngine`].
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect another.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockEngine {
    state: Arc<Mutex<MockState>>,
    build_error: Option<String>,
    start_error: Option<String>,
    exec_delay: Option<Duration>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test runs return these outputs in order, then [`DEFAULT_TEST_OUTPUT`].
    pub fn with_test_outputs(self, outputs: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .test_outputs
            .extend(outputs.iter().map(|s| (*s).to_string()));
        self
    }

    /// Makes every image build fail with `message`.
    pub fn failing_build(mut self, message: &str) -> Self {
        self.build_error = Some(message.to_string());
        self
    }

    /// Makes container start fail with `message`.
    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    pub fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Number of exec calls that ran the test command.
    pub fn test_runs(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Exec(argv) if is_test_run(argv)))
    }

    pub fn file(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(name).cloned()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn is_test_run(argv: &[String]) -> bool {
    let (_, command) = split_timeout(argv);
    !matches!(command.first().map(String::as_str), Some("cat" | "bash"))
}

/// Splits a `timeout -k <grace> <limit> cmd...` wrapper into its limit and
/// the wrapped command.
fn split_timeout(argv: &[String]) -> (Option<Duration>, &[String]) {
    match argv {
        [timeout, _, _, limit, command @ ..] if timeout == "timeout" => {
            let limit = limit
                .trim_end_matches('s')
                .parse::<f64>()
                .ok()
                .map(Duration::from_secs_f64);
            (limit, command)
        }
        _ => (None, argv),
    }
}

fn unpack(archive: &Bytes) -> Vec<(String, String)> {
    let mut tar = tar::Archive::new(archive.as_ref());
    let mut files = Vec::new();
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().unwrap().display().to_string();
        let path = path.trim_start_matches("./").to_string();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        files.push((path, content));
    }
    files
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn build_image(&self, tag: &str, context: Bytes) -> Result<(), SandboxError> {
        let names = unpack(&context).into_iter().map(|(name, _)| name).collect();
        self.record(EngineCall::Build(tag.to_string(), names));
        match &self.build_error {
            Some(message) => Err(SandboxError::build_failed(tag, message.clone())),
            None => Ok(()),
        }
    }

    async fn start_container(&self, image: &SandboxImage) -> Result<String, SandboxError> {
        self.record(EngineCall::Start(image.tag.clone()));
        match &self.start_error {
            Some(message) => Err(SandboxError::container_failed(message.clone())),
            None => Ok(format!("{}-container", image.tag)),
        }
    }

    async fn exec(&self, _container_id: &str, argv: &[String]) -> Result<ExecOutput, SandboxError> {
        self.record(EngineCall::Exec(argv.to_vec()));
        let (limit, argv) = split_timeout(argv);
        if let Some(delay) = self.exec_delay {
            if let Some(limit) = limit.filter(|limit| delay > *limit) {
                tokio::time::sleep(limit).await;
                return Ok(ExecOutput {
                    exit_code: Some(124),
                    output: String::new(),
                });
            }
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let output = match argv.first().map(String::as_str) {
            Some("cat") => match argv.get(1).and_then(|name| state.files.get(name)) {
                Some(content) => ExecOutput {
                    exit_code: Some(0),
                    output: content.clone(),
                },
                None => ExecOutput {
                    exit_code: Some(1),
                    output: "cat: No such file or directory\n".to_string(),
                },
            },
            Some("bash") => {
                let mut listing = String::from(".:\n");
                for name in state.files.keys() {
                    listing.push_str(name);
                    listing.push('\n');
                }
                for (name, content) in &state.files {
                    listing.push_str(&format!("---./{name}---\n{content}\n"));
                }
                ExecOutput {
                    exit_code: Some(0),
                    output: listing,
                }
            }
            _ => {
                let output = state
                    .test_outputs
                    .pop_front()
                    .unwrap_or_else(|| DEFAULT_TEST_OUTPUT.to_string());
                ExecOutput {
                    exit_code: Some(0),
                    output,
                }
            }
        };
        Ok(output)
    }

    async fn upload(
        &self,
        _container_id: &str,
        _dir: &str,
        archive: Bytes,
    ) -> Result<(), SandboxError> {
        let files = unpack(&archive);
        self.record(EngineCall::Upload(
            files.iter().map(|(name, _)| name.clone()).collect(),
        ));
        let mut state = self.state.lock().unwrap();
        for (name, content) in files {
            state.files.insert(name, content);
        }
        Ok(())
    }

    async fn stop_container(&self, _container_id: &str) -> Result<(), SandboxError> {
        self.record(EngineCall::Stop);
        Ok(())
    }

    async fn remove_container(&self, _container_id: &str) -> Result<(), SandboxError> {
        self.record(EngineCall::Remove);
        Ok(())
    }

    async fn remove_image(&self, image: &SandboxImage) -> Result<(), SandboxError> {
        self.record(EngineCall::RemoveImage(image.tag.clone()));
        Ok(())
    }
}
