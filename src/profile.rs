//! Language profiles for sandbox sessions.
//!
//! A profile describes how to build the sandbox image for a task and which
//! files and test command the self-healing loop works with. Exactly two
//! profiles exist; the task text picks one by keyword.

use serde::Serialize;

/// Keywords that select the Node profile. Matched case-insensitively.
const NODE_KEYWORDS: &[&str] = &["node.js", "express", "javascript"];

/// Working directory inside every sandbox image.
pub(crate) const WORKDIR: &str = "/app";

/// Supported language presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Language {
    /// Python with pytest and Flask preinstalled.
    Python,
    /// Node.js with Express, Jest and Supertest preinstalled.
    Node,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Node => write!(f, "node"),
        }
    }
}

/// Build and run settings for one language preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct LanguageProfile {
    pub language: Language,
    /// Base image the sandbox is built `FROM`.
    pub base_image: &'static str,
    /// Dockerfile instructions that install the toolchain and test runner.
    pub dependency_setup: &'static str,
    pub app_filename: &'static str,
    pub test_filename: &'static str,
    pub test_command: &'static str,
    /// Package manifest copied into the build context, if the preset needs one.
    pub manifest: Option<Manifest>,
}

/// A file written next to the Dockerfile in the build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Manifest {
    pub filename: &'static str,
    pub content: &'static str,
}

const NODE_PACKAGE_JSON: &str = r#"{
  "name": "sandbox-app",
  "version": "1.0.0",
  "description": "",
  "main": "app.js",
  "scripts": {
    "test": "jest"
  },
  "dependencies": {
    "express": "^4.17.1"
  },
  "devDependencies": {
    "jest": "^27.0.0",
    "supertest": "^6.0.0"
  }
}
"#;

impl LanguageProfile {
    /// Python preset: Flask app tested with pytest.
    pub(crate) fn python() -> Self {
        Self {
            language: Language::Python,
            base_image: "python:3.11-slim",
            dependency_setup: "RUN pip install pytest flask",
            app_filename: "app.py",
            test_filename: "test_main.py",
            test_command: "pytest",
            manifest: None,
        }
    }

    /// Node preset: Express app tested with Jest.
    pub(crate) fn node() -> Self {
        Self {
            language: Language::Node,
            base_image: "node:18-slim",
            dependency_setup: "RUN npm install express jest supertest\nCOPY package.json .\nRUN npm install",
            app_filename: "app.js",
            test_filename: "app.test.js",
            test_command: "npm test",
            manifest: Some(Manifest {
                filename: "package.json",
                content: NODE_PACKAGE_JSON,
            }),
        }
    }

    /// Renders the Dockerfile for this profile.
    pub(crate) fn dockerfile(&self) -> String {
        format!(
            "FROM {}\nWORKDIR {WORKDIR}\n{}\n",
            self.base_image, self.dependency_setup
        )
    }
}

/// Picks the profile for a task.
///
/// Any Node keyword anywhere in the task selects Node; everything else is Python.
pub(crate) fn resolve(task: &str) -> LanguageProfile {
    let lowered = task.to_lowercase();
    if NODE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        LanguageProfile::node()
    } else {
        LanguageProfile::python()
    }
}
