//! Parser for the linter's one-issue-per-line "compact" output
//!
//! Grammar: `<path>: line <N>, col <N>, <CODE> - <reason>[ (<rule>)]`.
//! Columns in this format are 0-based and are shifted to 1-based here.

use super::{OutputParser, ParseContext, RawIssue};
use crate::domain::issues::Issue;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMPACT_LINE: Regex = Regex::new(
        r"^[^:]+: line (?P<line>\d+), col (?P<character>\d+), (?P<code>\w+) - (?P<reason>.+?)(?:\s\((?P<shortname>[\w\-]+)\))?$"
    )
    .expect("compact line pattern is valid");
}

/// Line-oriented parser for the compact format
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactParser;

impl CompactParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one output line; `None` for anything that is not an issue line
    pub fn parse_line(&self, line: &str, context: &ParseContext) -> Option<Issue> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let caps = COMPACT_LINE.captures(line)?;
        let line_number: u32 = caps.name("line")?.as_str().parse().ok()?;
        let column: u32 = caps.name("character")?.as_str().parse().ok()?;

        let raw = RawIssue {
            line: line_number,
            character: column.saturating_add(1),
            code: caps.name("code")?.as_str().to_string(),
            reason: caps.name("reason")?.as_str().to_string(),
            shortname: caps.name("shortname").map(|m| m.as_str().to_string()),
        };

        Some(raw.into_issue(context))
    }
}

impl OutputParser for CompactParser {
    fn format_name(&self) -> &'static str {
        "compact"
    }

    fn parse(&self, output: &str, context: &ParseContext) -> Vec<Issue> {
        let issues: Vec<Issue> = output
            .lines()
            .filter_map(|line| self.parse_line(line, context))
            .collect();

        tracing::debug!("Parsed {} issues from compact output", issues.len());
        issues
    }
}
