//! CLI command implementations.
//!
//! Each submodule implements one crucible subcommand, keeping formatting and
//! decision logic in pure functions so they can be tested without Docker.

pub(crate) mod init;
pub(crate) mod profile;
pub(crate) mod run;
