//! Discovery of the linter's own configuration file
//!
//! The nearest file in the document's directory or its parents wins; unsaved
//! buffers and files outside any configured project fall back to the copy in
//! the user's home directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for locating the linter configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfigDiscovery {
    /// File name searched for
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Maximum number of directories inspected walking upwards
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Whether to fall back to the home directory
    #[serde(default = "default_true")]
    pub home_fallback: bool,
}

impl Default for LintConfigDiscovery {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            max_depth: default_max_depth(),
            home_fallback: true,
        }
    }
}

fn default_file_name() -> String {
    ".eslintrc".to_string()
}

fn default_max_depth() -> usize {
    30
}

fn default_true() -> bool {
    true
}

/// Search for `file_name` in `dir` and its ancestors, inspecting at most `max_depth` directories
pub fn find_up_the_tree(dir: &Path, file_name: &str, max_depth: usize) -> Option<PathBuf> {
    let start = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    start
        .ancestors()
        .take(max_depth)
        .map(|ancestor| ancestor.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Locate the most relevant lint configuration file.
///
/// `start_dir` is the directory of the document being validated (absent for
/// unsaved buffers); `home` is the user's home directory.
pub fn find_lint_config(
    start_dir: Option<&Path>,
    home: Option<&Path>,
    discovery: &LintConfigDiscovery,
) -> Option<PathBuf> {
    if let Some(dir) = start_dir {
        if let Some(found) = find_up_the_tree(dir, &discovery.file_name, discovery.max_depth) {
            tracing::debug!("Found lint config {}", found.display());
            return Some(found);
        }
    }

    if !discovery.home_fallback {
        return None;
    }

    let candidate = home?.join(&discovery.file_name);
    if candidate.is_file() {
        tracing::debug!("Using home lint config {}", candidate.display());
        Some(candidate)
    } else {
        None
    }
}

/// The current user's home directory, from the environment
pub fn home_directory() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
