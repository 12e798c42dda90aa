//! The write/test/repair state machine.
//!
//! ```text
//! WriteApp -> WriteTest -> RunTests -+-> Done
//!                             ^      +-> Patch --+
//!                             |                  |
//!                             +------------------+
//!                                    +-> Aborted
//! ```
//!
//! The loop runs the tests at most [`MAX_TEST_RUNS`] times. A failing run
//! is followed by one patch unless it was the last allowed run. A test run
//! that hits the exec timeout counts as a failing run.

mod classify;

pub(crate) use classify::TestVerdict;
use classify::{choose_patch_target, classify_test_output, strip_fences};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::files::FileState;
use crate::llm::CodeGenerator;
use crate::profile::LanguageProfile;
use crate::sandbox::{ExecOutput, Sandbox};

/// Test runs per session, including the first.
pub(crate) const MAX_TEST_RUNS: u32 = 4;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LoopStatus {
    /// A test run passed.
    Passed,
    /// Every test run failed.
    Exhausted,
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// One applied repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct PatchRecord {
    /// The failing attempt this patch followed.
    pub attempt: u32,
    pub target: String,
}

/// Summary of a finished loop.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoopReport {
    pub status: LoopStatus,
    pub test_runs: u32,
    pub patches: Vec<PatchRecord>,
    pub last_test_output: String,
    pub file_state: FileState,
}

/// Progress notifications for display.
#[derive(Debug)]
pub(crate) enum LoopEvent<'a> {
    FileWritten {
        filename: &'a str,
    },
    TestRun {
        attempt: u32,
        verdict: TestVerdict,
        output: &'a str,
    },
    Patched {
        attempt: u32,
        target: &'a str,
    },
}

/// Decision after a classified test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    Done,
    Patch,
    Abort,
}

/// Chooses what follows test run number `attempt` (0-based).
pub(crate) fn after_test_run(attempt: u32, verdict: TestVerdict) -> Next {
    match verdict {
        TestVerdict::Pass => Next::Done,
        TestVerdict::Fail if attempt + 1 < MAX_TEST_RUNS => Next::Patch,
        TestVerdict::Fail => Next::Abort,
    }
}

#[derive(Debug)]
enum Phase {
    WriteApp,
    WriteTest,
    RunTests { attempt: u32 },
    Patch { attempt: u32, test_output: String },
    Done,
    Aborted,
}

type Observer<'a> = Box<dyn Fn(&LoopEvent<'_>) + Send + Sync + 'a>;

/// Drives one session's generate/write/test/repair cycle.
pub(crate) struct HealingLoop<'a> {
    generator: &'a dyn CodeGenerator,
    sandbox: &'a Sandbox,
    profile: &'a LanguageProfile,
    observer: Option<Observer<'a>>,
}

impl<'a> HealingLoop<'a> {
    pub fn new(
        generator: &'a dyn CodeGenerator,
        sandbox: &'a Sandbox,
        profile: &'a LanguageProfile,
    ) -> Self {
        Self {
            generator,
            sandbox,
            profile,
            observer: None,
        }
    }

    /// Calls `observer` on every loop event.
    pub fn with_observer(mut self, observer: impl Fn(&LoopEvent<'_>) + Send + Sync + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn emit(&self, event: &LoopEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    /// Runs the loop to a terminal state.
    ///
    /// Exhausting the attempts is a normal outcome; errors come only from
    /// the collaborator or the sandbox.
    pub async fn run(&self, task: &str) -> Result<LoopReport> {
        let mut files = FileState::new();
        let mut phase = Phase::WriteApp;
        let mut test_runs = 0;
        let mut patches = Vec::new();
        let mut last_test_output = String::new();

        let status = loop {
            debug!("Loop phase: {:?}", phase);
            phase = match phase {
                Phase::WriteApp => {
                    self.write_generated(task, self.profile.app_filename, &mut files)
                        .await?;
                    Phase::WriteTest
                }
                Phase::WriteTest => {
                    self.write_generated(task, self.profile.test_filename, &mut files)
                        .await?;
                    Phase::RunTests { attempt: 0 }
                }
                Phase::RunTests { attempt } => {
                    info!(
                        "Running tests (attempt {}/{}): {}",
                        attempt + 1,
                        MAX_TEST_RUNS,
                        self.profile.test_command
                    );
                    let result = match self.sandbox.exec(self.profile.test_command).await {
                        Ok(result) => result,
                        Err(e) if e.is_timeout() => {
                            warn!("{}", e);
                            ExecOutput {
                                exit_code: None,
                                output: format!("Error: {e}"),
                            }
                        }
                        Err(e) => return Err(e).context("Failed to run tests in sandbox"),
                    };
                    test_runs += 1;

                    let verdict = classify_test_output(&result.output);
                    tracing::info!(
                        event = "test_run",
                        attempt,
                        verdict = ?verdict,
                        exit_code = ?result.exit_code,
                    );
                    self.emit(&LoopEvent::TestRun {
                        attempt,
                        verdict,
                        output: &result.output,
                    });

                    last_test_output = result.output;
                    match after_test_run(attempt, verdict) {
                        Next::Done => Phase::Done,
                        Next::Patch => Phase::Patch {
                            attempt,
                            test_output: last_test_output.clone(),
                        },
                        Next::Abort => Phase::Aborted,
                    }
                }
                Phase::Patch {
                    attempt,
                    test_output,
                } => {
                    let target = self.patch(&files, &test_output).await?;
                    files = self.read_back().await?;

                    tracing::info!(event = "patch_applied", attempt, target);
                    self.emit(&LoopEvent::Patched { attempt, target });
                    patches.push(PatchRecord {
                        attempt,
                        target: target.to_string(),
                    });
                    Phase::RunTests {
                        attempt: attempt + 1,
                    }
                }
                Phase::Done => break LoopStatus::Passed,
                Phase::Aborted => break LoopStatus::Exhausted,
            };
        };

        match status {
            LoopStatus::Passed => info!("Tests passed after {} run(s)", test_runs),
            LoopStatus::Exhausted => info!("Max test runs ({}) reached. Aborting.", MAX_TEST_RUNS),
        }

        Ok(LoopReport {
            status,
            test_runs,
            patches,
            last_test_output,
            file_state: files,
        })
    }

    /// Asks for the next file, writes it and records it.
    async fn write_generated(
        &self,
        task: &str,
        filename: &str,
        files: &mut FileState,
    ) -> Result<()> {
        info!("Writing {}", filename);
        let raw = self
            .generator
            .generate(task, &files.render())
            .await
            .with_context(|| format!("Failed to generate {filename}"))?;
        let content = strip_fences(&raw);

        self.sandbox
            .write_file(filename, &content)
            .await
            .with_context(|| format!("Failed to write {filename} to sandbox"))?;
        files.update(filename, content);
        self.emit(&LoopEvent::FileWritten { filename });
        Ok(())
    }

    /// Requests a repair and writes it over the chosen file.
    async fn patch(&self, files: &FileState, test_output: &str) -> Result<&'static str> {
        let raw = self
            .generator
            .repair(&files.render(), test_output)
            .await
            .context("Failed to generate repair")?;
        let fix = strip_fences(&raw);
        let target = choose_patch_target(&fix).filename(self.profile);
        info!("Attempting to fix {}", target);

        self.sandbox
            .write_file(target, &fix)
            .await
            .with_context(|| format!("Failed to write patch to {target}"))?;
        Ok(target)
    }

    /// Rebuilds the file state from the sandbox's copies of both files.
    async fn read_back(&self) -> Result<FileState> {
        let mut files = FileState::new();
        for filename in [self.profile.app_filename, self.profile.test_filename] {
            let content = self
                .sandbox
                .read_file(filename)
                .await
                .with_context(|| format!("Failed to read {filename} back from sandbox"))?;
            files.update(filename, content);
        }
        Ok(files)
    }
}
