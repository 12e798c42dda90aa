//! Shows which language profile a task resolves to, without touching Docker.

use anyhow::{bail, Result};
use colored::Colorize;
use std::fmt::Write;

use crate::profile::{resolve, LanguageProfile};

pub(crate) fn run(task: &str) -> Result<()> {
    if task.trim().is_empty() {
        bail!("Task cannot be empty");
    }
    print!("{}", format_profile(&resolve(task)));
    Ok(())
}

fn format_profile(profile: &LanguageProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Profile:    {}", profile.language.to_string().cyan().bold());
    let _ = writeln!(out, "Image:      {}", profile.base_image);
    let _ = writeln!(out, "App file:   {}", profile.app_filename);
    let _ = writeln!(out, "Test file:  {}", profile.test_filename);
    let _ = writeln!(out, "Command:    {}", profile.test_command);
    let _ = writeln!(out, "\n{}", "Dockerfile:".dimmed());
    out.push_str(&profile.dockerfile());
    out
}
