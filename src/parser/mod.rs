//! Parsers for the external linter's output
//!
//! Architectural Principle: Anti-Corruption Layer - tool output is translated at one boundary
//! - Each output format implements the OutputParser trait so formats can be swapped freely
//! - Position corrections (line offset, 1-based columns) and link building are shared
//! - Parsers never fail: lines or documents that do not match are dropped

pub mod compact;
pub mod json;

use crate::domain::issues::{absolute_path, Issue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use compact::CompactParser;
pub use json::JsonParser;

/// Default scheme used for editor navigation links
pub const DEFAULT_LINK_BASE: &str = "txmt://open";

/// Converts captured tool output into issues
pub trait OutputParser: Send + Sync {
    /// Value passed to the tool's `-f` flag to request this format
    fn format_name(&self) -> &'static str;

    /// Parse the complete captured output of one run
    fn parse(&self, output: &str, context: &ParseContext) -> Vec<Issue>;
}

/// Output formats the relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// One issue per line, `file: line N, col N, CODE - reason (rule)`
    #[default]
    Compact,
    /// Structured JSON results
    Json,
}

impl ParserKind {
    /// Build the parser for this format
    pub fn parser(self) -> Box<dyn OutputParser> {
        match self {
            Self::Compact => Box::new(CompactParser::new()),
            Self::Json => Box::new(JsonParser::new()),
        }
    }
}

/// Information about the fragment that was validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    /// Added to every reported line (fragment start line minus one)
    pub line_offset: i64,
    /// Saved file the fragment belongs to
    pub filename: Option<PathBuf>,
    /// Scheme and host for navigation links
    pub link_base: String,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ParseContext {
    pub fn new(line_offset: i64) -> Self {
        Self { line_offset, filename: None, link_base: DEFAULT_LINK_BASE.to_string() }
    }

    pub fn with_filename(mut self, filename: Option<PathBuf>) -> Self {
        self.filename = filename;
        self
    }

    pub fn with_link_base(mut self, link_base: impl Into<String>) -> Self {
        self.link_base = link_base.into();
        self
    }

    /// Shift a tool line number into document coordinates, never below line 1
    pub fn document_line(&self, line: u32) -> u32 {
        let shifted = i64::from(line) + self.line_offset;
        shifted.clamp(1, i64::from(u32::MAX)) as u32
    }

    /// Navigation link for a document position
    pub fn url_for(&self, line: u32, character: u32) -> String {
        match &self.filename {
            Some(filename) => format!(
                "{}?url=file://{}&line={}&column={}",
                self.link_base,
                absolute_path(filename).display(),
                line,
                character
            ),
            None => format!("{}?line={}&column={}", self.link_base, line, character),
        }
    }
}

/// Issue fields as read from the tool, before document corrections
#[derive(Debug, Clone)]
pub(crate) struct RawIssue {
    pub line: u32,
    /// Already 1-based
    pub character: u32,
    pub code: String,
    pub reason: String,
    pub shortname: Option<String>,
}

impl RawIssue {
    /// Apply the line offset and attach the navigation link
    pub fn into_issue(self, context: &ParseContext) -> Issue {
        let line = context.document_line(self.line);
        let character = self.character.max(1);
        let mut issue = Issue::new(line, character, self.code, self.reason)
            .with_url(context.url_for(line, character));
        if let Some(shortname) = self.shortname {
            issue = issue.with_shortname(shortname);
        }
        issue
    }
}
