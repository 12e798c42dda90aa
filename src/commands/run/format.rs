//! Formatting functions for session output display.
//!
//! Pure functions that return strings; the caller decides where to print.

use chrono::Duration;
use colored::Colorize;
use std::fmt::Write;

use crate::heal::{LoopEvent, TestVerdict, MAX_TEST_RUNS};
use crate::profile::LanguageProfile;
use crate::report::SessionReport;

/// Lines of test output shown per failing run.
const OUTPUT_TAIL_LINES: usize = 15;

/// Banner information for display at session start.
#[derive(Debug, Clone)]
pub(crate) struct BannerInfo {
    pub provider: String,
    pub model: String,
    pub profile: String,
    pub base_image: String,
    pub files: String,
    pub test_command: String,
}

impl BannerInfo {
    pub fn new(profile: &LanguageProfile, provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            profile: profile.language.to_string(),
            base_image: profile.base_image.to_string(),
            files: format!("{}, {}", profile.app_filename, profile.test_filename),
            test_command: profile.test_command.to_string(),
        }
    }
}

/// Formats a duration for display (e.g., "2m 5s").
pub(crate) fn format_duration(duration: &Duration) -> String {
    let total_seconds = duration.num_seconds();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;

    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Formats the startup banner for display.
pub(crate) fn format_banner(info: &BannerInfo) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", "━".repeat(50).dimmed());
    let _ = writeln!(out, "{}", "   Crucible Session Starting".yellow().bold());
    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());

    let _ = writeln!(
        out,
        "  Provider:   {} ({})",
        info.provider.cyan().bold(),
        info.model.cyan()
    );
    let _ = writeln!(out, "  Profile:    {}", info.profile.cyan());
    let _ = writeln!(out, "  Image:      {}", info.base_image.cyan());
    let _ = writeln!(out, "  Files:      {}", info.files.cyan());
    let _ = writeln!(out, "  Tests:      {}", info.test_command.cyan());
    let _ = writeln!(out, "  Max runs:   {}", MAX_TEST_RUNS.to_string().cyan());
    let _ = writeln!(out, "{}", "━".repeat(50).dimmed());

    out
}

/// Formats a single loop event as a progress line.
pub(crate) fn format_event(event: &LoopEvent<'_>) -> String {
    match event {
        LoopEvent::FileWritten { filename } => {
            format!("  {} wrote {}", "✎".blue(), filename.cyan())
        }
        LoopEvent::TestRun {
            attempt,
            verdict,
            output,
        } => {
            let mut out = format!(
                "\n{} Test run {}/{} {}\n",
                "━".repeat(15).dimmed(),
                (attempt + 1).to_string().cyan().bold(),
                MAX_TEST_RUNS,
                "━".repeat(15).dimmed()
            );
            match verdict {
                TestVerdict::Pass => {
                    let _ = writeln!(out, "  {} tests passed", "✓".green().bold());
                }
                TestVerdict::Fail => {
                    let _ = writeln!(out, "  {} tests failed", "✗".red().bold());
                    for line in tail(output, OUTPUT_TAIL_LINES) {
                        let _ = writeln!(out, "    {}", line.dimmed());
                    }
                }
            }
            out
        }
        LoopEvent::Patched { attempt, target } => format!(
            "  {} patched {} after run {}",
            "↻".yellow(),
            target.cyan(),
            attempt + 1
        ),
    }
}

fn tail(text: &str, n: usize) -> impl Iterator<Item = &str> {
    let lines: Vec<_> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines.into_iter().skip(skip)
}

/// Formats the end-of-session summary.
pub(crate) fn format_summary(report: &SessionReport) -> String {
    let mut out = String::new();
    let elapsed = report.finished_at.signed_duration_since(report.started_at);

    let status = match report.status {
        crate::heal::LoopStatus::Passed => "passed".green().bold(),
        crate::heal::LoopStatus::Exhausted => "exhausted".red().bold(),
    };
    let _ = writeln!(out, "\n{} Session finished: {}", "■".dimmed(), status);
    let _ = writeln!(
        out,
        "  Test runs:  {}",
        report.test_runs.to_string().cyan()
    );
    let _ = writeln!(
        out,
        "  Patches:    {}",
        report.patches.len().to_string().cyan()
    );
    if !report.file_state.is_empty() {
        let _ = writeln!(
            out,
            "  Files:      {}",
            report.file_state.len().to_string().cyan()
        );
    }
    let _ = writeln!(out, "  Duration:   {}", format_duration(&elapsed).cyan());

    out
}

/// Formats the soft failure shown when the image cannot be built.
pub(crate) fn format_build_failed(message: &str) -> String {
    format!("\n{} {}\n  {}", "✗".red().bold(), "Image build failed".red(), message.dimmed())
}
