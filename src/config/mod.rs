//! Configuration loading and management for Lint Relay
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to explicit settings passed to the orchestrator
//! - Defaults mirror a stock ESLint install reachable from common binary directories
//! - Nothing here reads editor environment variables; callers supply those values

pub mod discovery;

use crate::domain::issues::{RelayError, RelayResult};
use crate::parser::{ParserKind, DEFAULT_LINK_BASE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub use discovery::{find_lint_config, find_up_the_tree, home_directory, LintConfigDiscovery};

/// File names tried in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["lint_relay.yaml", "lint_relay.yml", ".lint_relay.yaml"];

/// Main configuration structure for Lint Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Configuration format version
    pub version: String,
    /// How to find and run the external linter
    pub tool: ToolConfig,
    /// Where to look for the linter's own configuration file
    #[serde(default)]
    pub lint_config: LintConfigDiscovery,
    /// Presentation settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// External tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable name or path
    pub executable: String,
    /// Fixed working directory; otherwise the project or file directory is used
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
    /// Directories searched before the inherited PATH, in order
    #[serde(default)]
    pub extra_search_paths: Vec<PathBuf>,
    /// Directories appended to PATH when missing
    #[serde(default = "default_fallback_paths")]
    pub fallback_search_paths: Vec<PathBuf>,
    /// Output format requested from the tool
    #[serde(default)]
    pub output_format: ParserKind,
}

/// Presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Issues whose reason matches any of these patterns are left out of
    /// summaries and gutter marks
    #[serde(default = "default_ignore_reasons")]
    pub ignore_reasons: Vec<String>,
    /// Prefix for gutter mark messages
    #[serde(default = "default_mark_label")]
    pub mark_label: String,
    /// Maximum marks set per editor command
    #[serde(default = "default_marks_per_command")]
    pub marks_per_command: usize,
    /// Scheme and host used for navigation links
    #[serde(default = "default_link_base")]
    pub link_base: String,
    /// Line appended to non-empty summaries
    #[serde(default = "default_summary_hint")]
    pub summary_hint: String,
    /// Editor scopes starting with this prefix are plain scripts; anything
    /// else is treated as HTML with embedded scripts
    #[serde(default = "default_script_scope_prefix")]
    pub script_scope_prefix: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: "eslint".to_string(),
            working_directory: None,
            extra_search_paths: Vec::new(),
            fallback_search_paths: default_fallback_paths(),
            output_format: ParserKind::Compact,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            ignore_reasons: default_ignore_reasons(),
            mark_label: default_mark_label(),
            marks_per_command: default_marks_per_command(),
            link_base: default_link_base(),
            summary_hint: default_summary_hint(),
            script_scope_prefix: default_script_scope_prefix(),
        }
    }
}

impl ReportConfig {
    /// Whether an editor scope denotes HTML with embedded scripts
    pub fn scope_is_embedded(&self, scope: &str) -> bool {
        !scope.starts_with(&self.script_scope_prefix)
    }

    /// Compile the ignore patterns
    pub fn ignore_rules(&self) -> RelayResult<Vec<Regex>> {
        self.ignore_reasons
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    RelayError::config(format!("Invalid ignore pattern '{pattern}': {e}"))
                })
            })
            .collect()
    }
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RelayResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            RelayError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            RelayError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> RelayResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| RelayError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the first default config file found in `dir`, or built-in defaults
    pub fn discover_in<P: AsRef<Path>>(dir: P) -> RelayResult<Self> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.as_ref().join(name);
            if candidate.is_file() {
                tracing::debug!("Using configuration from {}", candidate.display());
                return Self::load_from_file(candidate);
            }
        }
        Ok(Self::default())
    }

    /// Get default configuration
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            tool: ToolConfig::default(),
            lint_config: LintConfigDiscovery::default(),
            report: ReportConfig::default(),
        }
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> RelayResult<()> {
        if self.version != "1.0" {
            return Err(RelayError::config(format!(
                "Unsupported configuration version '{}'",
                self.version
            )));
        }

        if self.tool.executable.trim().is_empty() {
            return Err(RelayError::config("Tool executable cannot be empty"));
        }

        if self.report.marks_per_command == 0 {
            return Err(RelayError::config("marks_per_command must be at least 1"));
        }

        if self.report.link_base.trim().is_empty() {
            return Err(RelayError::config("link_base cannot be empty"));
        }

        if self.lint_config.file_name.trim().is_empty() {
            return Err(RelayError::config("Lint config file name cannot be empty"));
        }

        self.ignore_rules()?;
        Ok(())
    }

    /// Compile the ignore patterns
    pub fn ignore_rules(&self) -> RelayResult<Vec<Regex>> {
        self.report.ignore_rules()
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> RelayResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| RelayError::config(format!("Failed to serialize config: {e}")))
    }

    /// Stable fingerprint of the effective configuration
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_yaml().unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_fallback_paths() -> Vec<PathBuf> {
    ["/bin", "/usr/bin", "/usr/local/bin"].iter().map(PathBuf::from).collect()
}

fn default_ignore_reasons() -> Vec<String> {
    vec!["^File ignored because of a matching ignore pattern".to_string()]
}

fn default_mark_label() -> String {
    "[ESLint]".to_string()
}

fn default_marks_per_command() -> usize {
    10
}

fn default_link_base() -> String {
    DEFAULT_LINK_BASE.to_string()
}

fn default_summary_hint() -> String {
    "Press Shift-Ctrl-V to view the full report.".to_string()
}

fn default_script_scope_prefix() -> String {
    "source.js".to_string()
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: RelayConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self { config: RelayConfig::default() }
    }

    /// Set the linter executable
    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.config.tool.executable = executable.into();
        self
    }

    /// Pin the working directory
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tool.working_directory = Some(dir.into());
        self
    }

    /// Select the tool output format
    pub fn output_format(mut self, kind: ParserKind) -> Self {
        self.config.tool.output_format = kind;
        self
    }

    /// Add an ignore pattern for issue reasons
    pub fn ignore_reason(mut self, pattern: impl Into<String>) -> Self {
        self.config.report.ignore_reasons.push(pattern.into());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> RelayResult<RelayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
