//! Parser for the linter's structured JSON output
//!
//! Expected shape: `[{ "filePath": ..., "messages": [{ "ruleId", "severity",
//! "message", "line", "column" }] }]`. Columns are already 1-based.

use super::{OutputParser, ParseContext, RawIssue};
use crate::domain::issues::Issue;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResult {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    severity: u8,
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
}

impl Message {
    /// Decode one message; malformed entries are skipped on their own
    fn decode(value: Value) -> Option<Self> {
        serde_json::from_value(value)
            .map_err(|e| tracing::warn!("Skipping malformed JSON linter message: {}", e))
            .ok()
    }

    fn code(&self) -> &'static str {
        match self.severity {
            2 => "Error",
            1 => "Warning",
            _ => "Info",
        }
    }
}

/// Parser for ESLint's `-f json` formatter
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl OutputParser for JsonParser {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, output: &str, context: &ParseContext) -> Vec<Issue> {
        if output.trim().is_empty() {
            return Vec::new();
        }

        let results: Vec<FileResult> = match serde_json::from_str(output) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Ignoring unparseable JSON linter output: {}", e);
                return Vec::new();
            }
        };

        results
            .into_iter()
            .inspect(|result| {
                tracing::debug!(
                    "JSON result for {} with {} messages",
                    result.file_path.as_deref().unwrap_or("<stdin>"),
                    result.messages.len()
                )
            })
            .flat_map(|result| result.messages)
            .filter_map(Message::decode)
            .map(|message| {
                RawIssue {
                    line: message.line.unwrap_or(1),
                    character: message.column.unwrap_or(1),
                    code: message.code().to_string(),
                    reason: message.message,
                    shortname: message.rule_id,
                }
                .into_issue(context)
            })
            .collect()
    }
}
