//! Text heuristics used by the self-healing loop.
//!
//! Each decision lives in its own function so it can be swapped (exit-code
//! verdicts, diff-based targeting) without touching the state machine.

use serde::Serialize;

use crate::profile::LanguageProfile;

/// Outcome of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TestVerdict {
    Pass,
    Fail,
}

/// Which file a repair overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PatchTarget {
    App,
    Test,
}

impl PatchTarget {
    pub fn filename(self, profile: &LanguageProfile) -> &'static str {
        match self {
            Self::App => profile.app_filename,
            Self::Test => profile.test_filename,
        }
    }
}

/// Classifies test-runner output; the exit code is not consulted.
///
/// Any case-insensitive "failed" or "error" counts as a failure.
pub(crate) fn classify_test_output(output: &str) -> TestVerdict {
    let lowered = output.to_lowercase();
    if lowered.contains("failed") || lowered.contains("error") {
        TestVerdict::Fail
    } else {
        TestVerdict::Pass
    }
}

/// Picks the file a repair is meant for.
///
/// Any mention of "test" routes to the test file, so an application fix that
/// talks about tests lands in the wrong file.
pub(crate) fn choose_patch_target(repair: &str) -> PatchTarget {
    if repair.to_lowercase().contains("test") {
        PatchTarget::Test
    } else {
        PatchTarget::App
    }
}

/// Removes markdown code fences and surrounding whitespace.
///
/// Drops every line that is only a fence marker, bare or language-tagged.
pub(crate) fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !is_fence_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn is_fence_line(line: &str) -> bool {
    line.trim()
        .strip_prefix("```")
        .is_some_and(|tag| !tag.contains(char::is_whitespace) && !tag.contains('`'))
}
