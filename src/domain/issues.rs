//! Core domain models for linter issues and validation results
//!
//! Architecture: Rich Domain Models - Issues carry their own classification
//! - Severity is derived from the external tool's code, never guessed later
//! - LintReport acts as the aggregate root holding issues and their counts
//! - Reports live only for the duration of a single run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Severity levels reported by the external linter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Codes that are neither errors nor warnings
    Info,
    /// Codes starting with `W`
    Warning,
    /// Codes starting with `E`
    Error,
}

impl Severity {
    /// Classify a tool code such as `Error`, `Warning`, `E001` or `W117`
    pub fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('E') => Self::Error,
            Some('W') => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single problem reported by the external linter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Line number (1-indexed, offset already applied)
    pub line: u32,
    /// Column number (1-indexed)
    pub character: u32,
    /// Raw code reported by the tool (e.g. `Error`)
    pub code: String,
    /// Severity derived from `code`
    pub severity: Severity,
    /// Human-readable message
    pub reason: String,
    /// Short rule name, when the tool reported one
    pub shortname: Option<String>,
    /// Editor navigation link for this position
    pub url: String,
}

impl Issue {
    /// Create an issue at the given position; severity follows the code
    pub fn new(line: u32, character: u32, code: impl Into<String>, reason: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            line,
            character,
            severity: Severity::from_code(&code),
            code,
            reason: reason.into(),
            shortname: None,
            url: String::new(),
        }
    }

    /// Attach the rule name
    pub fn with_shortname(mut self, shortname: impl Into<String>) -> Self {
        self.shortname = Some(shortname.into());
        self
    }

    /// Attach the navigation link
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Reason followed by the rule name in parentheses, as shown in gutter marks
    pub fn labelled_reason(&self) -> String {
        match &self.shortname {
            Some(name) => format!("{} ({})", self.reason, name),
            None => self.reason.clone(),
        }
    }
}

/// Count of issues by severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl IssueCounts {
    /// Tally a sequence of issues
    pub fn tally<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            counts.add(issue.severity);
        }
        counts
    }

    /// Whether any errors or warnings were counted
    pub fn has_errors_or_warnings(&self) -> bool {
        self.error + self.warning > 0
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// The document a report was produced for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintTarget {
    /// Absolute path of the saved file, if any
    pub filename: Option<PathBuf>,
    /// Name shown in report headers
    pub display_name: String,
    /// Editor link that opens the document
    pub url: String,
}

impl LintTarget {
    /// Name used for buffers that were never saved
    pub const UNSAVED_NAME: &'static str = "(current unsaved file)";

    /// Target for an unsaved buffer
    pub fn unsaved(link_base: &str) -> Self {
        Self {
            filename: None,
            display_name: Self::UNSAVED_NAME.to_string(),
            url: format!("{link_base}?line=1&column=0"),
        }
    }

    /// Target for a saved file; relative paths are resolved against the current directory
    pub fn saved(filename: PathBuf, display_name: impl Into<String>, link_base: &str) -> Self {
        let filename = absolute_path(&filename);
        let url = format!("{link_base}?url=file://{}", filename.display());
        Self { filename: Some(filename), display_name: display_name.into(), url }
    }
}

/// `path` made absolute without touching the filesystem
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Complete result of one linter run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintReport {
    /// Issues in the order the tool reported them
    pub issues: Vec<Issue>,
    /// Summary counts over `issues`
    pub counts: IssueCounts,
    /// Document that was validated
    pub target: LintTarget,
    /// Lint configuration file passed to the tool, if one was found
    pub lint_config: Option<PathBuf>,
    /// Timestamp when validation was performed
    pub validated_at: DateTime<Utc>,
}

impl LintReport {
    /// Create a report for the given target
    pub fn new(target: LintTarget, issues: Vec<Issue>) -> Self {
        Self {
            counts: IssueCounts::tally(&issues),
            issues,
            target,
            lint_config: None,
            validated_at: Utc::now(),
        }
    }

    /// Record the lint configuration file that was used
    pub fn with_lint_config(mut self, lint_config: Option<PathBuf>) -> Self {
        self.lint_config = lint_config;
        self
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Error types that can occur while relaying to the linter
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The external tool could not be launched or talked to
    #[error("Failed to run linter: {message}")]
    ToolInvocation {
        message: String,
        /// PATH that was searched for the executable
        search_path: Option<String>,
    },

    /// The external tool wrote to its diagnostic stream
    #[error("Linter reported a problem: {diagnostic}")]
    ToolDiagnostic { diagnostic: String },

    /// Configuration file could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or written
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Report window marker bookkeeping failed
    #[error("Marker error: {message}")]
    Marker { message: String },

    /// Report rendering failed
    #[error("Render error: {message}")]
    Render { message: String },
}

impl RelayError {
    /// Create a tool invocation error
    pub fn tool_invocation(message: impl Into<String>, search_path: Option<String>) -> Self {
        Self::ToolInvocation { message: message.into(), search_path }
    }

    /// Create a tool diagnostic error
    pub fn tool_diagnostic(diagnostic: impl Into<String>) -> Self {
        Self::ToolDiagnostic { diagnostic: diagnostic.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a marker error
    pub fn marker(message: impl Into<String>) -> Self {
        Self::Marker { message: message.into() }
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render { message: message.into() }
    }

    /// PATH searched when the tool failed to launch
    pub fn search_path(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation { search_path, .. } => search_path.as_deref(),
            _ => None,
        }
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
