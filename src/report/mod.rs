//! Report generation for the editor
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - LintReport (domain) is rendered as an HTML window, a tooltip summary, or JSON
//! - Gutter marks and report-window markers are editor side effects kept in submodules
//! - All dynamic text placed into HTML is escaped here

pub mod gutter;
pub mod marker;

use crate::config::ReportConfig;
use crate::domain::issues::{Issue, IssueCounts, LintReport, RelayError, RelayResult};
use chrono::Local;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::path::Path;

pub use gutter::GutterMarks;
pub use marker::MarkerStore;

const REPORT_TEMPLATE: &str = include_str!("../../templates/report.html");
const ERROR_TEMPLATE: &str = include_str!("../../templates/error.html");

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{ (\w+) \}\}").expect("placeholder pattern is valid");
}

/// How results are presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Full HTML report window
    Report,
    /// Short text for a tooltip
    Summary,
    /// Editor gutter marks only; produces no text
    Gutter,
    /// JSON for programmatic consumption
    Json,
}

/// Drops issues whose reason matches a configured pattern
#[derive(Debug, Clone, Default)]
pub struct ReasonFilter {
    patterns: Vec<Regex>,
}

impl ReasonFilter {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn is_ignored(&self, issue: &Issue) -> bool {
        self.patterns.iter().any(|rx| rx.is_match(&issue.reason))
    }

    /// Issues that are not ignored, in their original order
    pub fn visible<'a>(&'a self, issues: &'a [Issue]) -> impl Iterator<Item = &'a Issue> + 'a {
        issues.iter().filter(move |issue| !self.is_ignored(issue))
    }
}

/// Renders reports according to the presentation settings
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    options: ReportConfig,
    filter: ReasonFilter,
    tool_name: String,
}

impl ReportFormatter {
    /// Create a formatter; fails if an ignore pattern does not compile
    pub fn new(options: ReportConfig) -> RelayResult<Self> {
        let patterns = options.ignore_rules()?;
        Ok(Self { options, filter: ReasonFilter::new(patterns), tool_name: "eslint".to_string() })
    }

    /// Name of the linter shown in error pages
    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn filter(&self) -> &ReasonFilter {
        &self.filter
    }

    /// Format a report in the given mode
    pub fn format_report(&self, report: &LintReport, mode: DisplayMode) -> RelayResult<String> {
        match mode {
            DisplayMode::Report => Ok(self.format_html(report, None)),
            DisplayMode::Summary => Ok(self.format_summary(report)),
            DisplayMode::Gutter => Ok(String::new()),
            DisplayMode::Json => self.format_json(report),
        }
    }

    /// Counts over issues that are not ignored
    pub fn visible_counts(&self, report: &LintReport) -> IssueCounts {
        IssueCounts::tally(self.filter.visible(&report.issues))
    }

    /// Tooltip text: `"1 error, 2 warnings"` plus the hint, or empty when clean
    pub fn format_summary(&self, report: &LintReport) -> String {
        let counts = self.visible_counts(report);
        if !counts.has_errors_or_warnings() {
            return String::new();
        }

        let mut parts = Vec::new();
        if counts.error > 0 {
            parts.push(plural(counts.error, "error"));
        }
        if counts.warning > 0 {
            parts.push(plural(counts.warning, "warning"));
        }

        let mut summary = parts.join(", ");
        if !self.options.summary_hint.is_empty() {
            summary.push_str("\n\n");
            summary.push_str(&self.options.summary_hint);
        }
        summary
    }

    /// Full HTML report.
    ///
    /// When `marker` is given, the page deletes that file once its window is
    /// hidden, so the marker exists only while the report is on screen.
    pub fn format_html(&self, report: &LintReport, marker: Option<&Path>) -> String {
        let counts = &report.counts;
        let mut count_parts = Vec::new();
        if counts.error > 0 {
            count_parts.push(format!("<span class=\"error\">{}</span>", plural(counts.error, "error")));
        }
        if counts.warning > 0 {
            count_parts.push(format!(
                "<span class=\"warning\">{}</span>",
                plural(counts.warning, "warning")
            ));
        }
        if counts.info > 0 {
            count_parts.push(format!("<span class=\"info\">{}</span>", plural(counts.info, "notice")));
        }

        let issues = if !report.has_issues() {
            "<p class=\"clean\">No problems found.</p>".to_string()
        } else {
            let rows: String = report.issues.iter().map(issue_row).collect();
            format!("<table>\n{rows}</table>")
        };

        let lint_config = match &report.lint_config {
            Some(path) => escape_html(&path.display().to_string()),
            None => "none".to_string(),
        };

        render_template(
            REPORT_TEMPLATE,
            &[
                ("TITLE", escape_html(&format!("Lint results: {}", report.target.display_name))),
                ("TARGET_URL", escape_html(&report.target.url)),
                ("TARGET_NAME", escape_html(&report.target.display_name)),
                ("COUNTS", count_parts.join(" ")),
                ("ISSUES", issues),
                ("LINT_CONFIG", lint_config),
                (
                    "TIMESTAMP",
                    escape_html(&report.validated_at.with_timezone(&Local).format("%c").to_string()),
                ),
                ("CLOSE_HOOK", marker.map(close_hook).unwrap_or_default()),
            ],
        )
    }

    /// JSON report
    pub fn format_json(&self, report: &LintReport) -> RelayResult<String> {
        let issues: Vec<JsonValue> = report
            .issues
            .iter()
            .map(|issue| {
                serde_json::json!({
                    "line": issue.line,
                    "character": issue.character,
                    "code": issue.code,
                    "severity": issue.severity.as_str(),
                    "isError": issue.is_error(),
                    "isWarning": issue.is_warning(),
                    "reason": issue.reason,
                    "shortname": issue.shortname,
                    "url": issue.url,
                    "ignored": self.filter.is_ignored(issue),
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "target": {
                "filename": report.target.filename.as_ref().map(|p| p.display().to_string()),
                "displayName": report.target.display_name,
                "url": report.target.url,
            },
            "lintConfig": report.lint_config.as_ref().map(|p| p.display().to_string()),
            "counts": {
                "error": report.counts.error,
                "warning": report.counts.warning,
                "info": report.counts.info,
            },
            "issues": issues,
            "validatedAt": report.validated_at.to_rfc3339(),
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| RelayError::render(format!("JSON serialization failed: {}", e)))
    }

    /// HTML page describing a fatal error
    pub fn format_error_html(&self, error: &RelayError) -> String {
        let (title, message, remediation) = match error {
            RelayError::ToolInvocation { message, search_path } => (
                "Could not run the linter",
                message.clone(),
                path_remediation(&self.tool_name, search_path.as_deref()),
            ),
            RelayError::ToolDiagnostic { diagnostic } => (
                "The linter reported a problem",
                diagnostic.clone(),
                String::new(),
            ),
            other => ("Validation failed", other.to_string(), String::new()),
        };

        render_template(
            ERROR_TEMPLATE,
            &[
                ("TITLE", title.to_string()),
                ("TOOL", escape_html(&self.tool_name)),
                ("MESSAGE", escape_html(&message)),
                ("REMEDIATION", remediation),
                ("TIMESTAMP", escape_html(&Local::now().format("%c").to_string())),
            ],
        )
    }
}

/// Script removing `marker` when the report window is hidden
fn close_hook(marker: &Path) -> String {
    let quoted = marker.display().to_string().replace('\'', "'\\''");
    let command = format!("/bin/rm -f '{quoted}'");
    let literal = serde_json::to_string(&command)
        .unwrap_or_default()
        .replace("</", "<\\/");

    format!(
        "<script>\n  document.addEventListener(\"visibilitychange\", function () {{\n    window.setTimeout(function () {{\n      if (document.hidden && window.TextMate) {{\n        TextMate.system({literal}, null);\n      }}\n    }}, 1);\n  }});\n</script>"
    )
}

fn path_remediation(tool: &str, search_path: Option<&str>) -> String {
    let mut html = format!(
        "<h4>How to fix it</h4>\n<p>Make sure the <code>{}</code> and <code>node</code> commands are on the <code>PATH</code>.</p>\n",
        escape_html(tool)
    );
    if let Some(path) = search_path {
        html.push_str(&format!(
            "<p>The path currently used is:</p>\n<pre>{}</pre>\n",
            escape_html(path)
        ));
    }
    html
}

fn issue_row(issue: &Issue) -> String {
    let rule = issue.shortname.as_deref().map(escape_html).unwrap_or_default();
    format!(
        "<tr class=\"{severity}\"><td class=\"position\"><a href=\"{url}\">line {line}, col {col}</a></td><td class=\"{severity}\">{severity}</td><td>{reason}</td><td class=\"rule\">{rule}</td></tr>\n",
        severity = issue.severity.as_str(),
        url = escape_html(&issue.url),
        line = issue.line,
        col = issue.character,
        reason = escape_html(&issue.reason),
        rule = rule,
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Replace every `{{ KEY }}` placeholder of `template` with its value.
///
/// Substituted values are not scanned again; unknown keys are left as they are.
pub fn render_template(template: &str, context: &[(&str, String)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            context
                .iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Escape HTML special characters
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
