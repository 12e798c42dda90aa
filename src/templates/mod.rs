//! Embedded templates for prompts and project files.

/// Default `crucible.toml` configuration.
pub(crate) const CRUCIBLE_TOML: &str = include_str!("crucible.toml");

/// System prompt for writing the application and test files.
pub(crate) const GENERATE_SYSTEM: &str = include_str!("generate_system.md");

/// Human prompt for generation; placeholders `{task}` and `{file_state}`.
pub(crate) const GENERATE_HUMAN: &str = include_str!("generate_human.md");

/// System prompt for repair turns.
pub(crate) const REPAIR_SYSTEM: &str = include_str!("repair_system.md");

/// Human prompt for repair; placeholders `{file_state}` and `{error}`.
pub(crate) const REPAIR_HUMAN: &str = include_str!("repair_human.md");
