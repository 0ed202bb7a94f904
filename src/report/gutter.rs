//! Editor gutter marks
//!
//! Marks are set by running the editor's command line helper: one call clears
//! the previous marks for the file, then marks are sent in fixed-size batches
//! so a single command line never grows unbounded.

use super::ReasonFilter;
use crate::config::ReportConfig;
use crate::domain::issues::{Issue, RelayError, RelayResult};
use std::path::PathBuf;
use tokio::process::Command;

/// Mark type used for every linter issue
const MARK_KIND: &str = "warning";

/// Builds and runs the helper commands that mark issues in the gutter
#[derive(Debug, Clone)]
pub struct GutterMarks {
    helper: PathBuf,
    file: PathBuf,
    label: String,
    batch_size: usize,
}

impl GutterMarks {
    pub fn new(helper: impl Into<PathBuf>, file: impl Into<PathBuf>, options: &ReportConfig) -> Self {
        Self {
            helper: helper.into(),
            file: file.into(),
            label: options.mark_label.clone(),
            batch_size: options.marks_per_command.max(1),
        }
    }

    /// Arguments that remove all marks previously set on the file
    pub fn clear_command(&self) -> Vec<String> {
        vec![format!("--clear-mark={MARK_KIND}"), self.file.display().to_string()]
    }

    /// Arguments for each batch of marks, file last
    pub fn mark_commands(&self, issues: &[Issue], filter: &ReasonFilter) -> Vec<Vec<String>> {
        let visible: Vec<&Issue> = filter.visible(issues).collect();

        visible
            .chunks(self.batch_size)
            .map(|batch| {
                let mut args: Vec<String> = batch
                    .iter()
                    .flat_map(|issue| {
                        [
                            format!("--set-mark={MARK_KIND}:{} {}", self.label, issue.labelled_reason()),
                            format!("--line={}:{}", issue.line, issue.character),
                        ]
                    })
                    .collect();
                args.push(self.file.display().to_string());
                args
            })
            .collect()
    }

    /// Clear command followed by all mark batches
    pub fn commands(&self, issues: &[Issue], filter: &ReasonFilter) -> Vec<Vec<String>> {
        std::iter::once(self.clear_command())
            .chain(self.mark_commands(issues, filter))
            .collect()
    }

    /// Remove every mark from the file
    pub async fn clear(&self) -> RelayResult<()> {
        self.run(&self.clear_command()).await
    }

    /// Replace the file's marks with the given issues
    pub async fn apply(&self, issues: &[Issue], filter: &ReasonFilter) -> RelayResult<()> {
        let commands = self.commands(issues, filter);
        tracing::debug!("Setting gutter marks with {} helper calls", commands.len());

        for args in &commands {
            self.run(args).await?;
        }
        Ok(())
    }

    async fn run(&self, args: &[String]) -> RelayResult<()> {
        let status = Command::new(&self.helper).args(args).status().await?;
        if !status.success() {
            return Err(RelayError::render(format!(
                "{} exited with {:?} while updating marks",
                self.helper.display(),
                status.code()
            )));
        }
        Ok(())
    }
}
