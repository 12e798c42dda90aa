//! Authoritative record of the files written into the sandbox.

use serde::Serialize;

/// What [`FileState::render`] returns before anything is tracked.
pub(crate) const EMPTY_FILE_STATE: &str = "No files yet.";

/// Ordered filename to content mapping.
///
/// A filename keeps the position of its first insertion; later updates only
/// replace the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct FileState {
    files: Vec<(String, String)>,
}

impl FileState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file or overwrites its content in place.
    pub fn update(&mut self, filename: &str, content: impl Into<String>) {
        let content = content.into();
        match self.files.iter_mut().find(|(name, _)| name == filename) {
            Some((_, existing)) => *existing = content,
            None => self.files.push((filename.to_string(), content)),
        }
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(name, _)| name == filename)
            .map(|(_, content)| content.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Renders every file as `name:\ncontent`, separated by blank lines.
    pub fn render(&self) -> String {
        if self.files.is_empty() {
            return EMPTY_FILE_STATE.to_string();
        }
        self.files
            .iter()
            .map(|(name, content)| format!("{name}:\n{content}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
