//! Running the external linter as a child process
//!
//! Infrastructure Layer: the only module that spawns the linter
//! - SearchPath rebuilds PATH so editor-launched processes can find node tooling
//! - Invocation is the fully resolved command line, built before anything runs
//! - ToolRunner is the seam between the orchestrator and the operating system

use crate::config::ToolConfig;
use crate::domain::issues::{RelayError, RelayResult};
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Ordered list of directories searched for executables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    /// Parse a PATH-style value, dropping empty entries
    pub fn parse(value: &OsStr) -> Self {
        let mut path = Self::default();
        for entry in std::env::split_paths(value) {
            path.push_missing(entry);
        }
        path
    }

    /// Build the PATH used to launch the linter.
    ///
    /// Order: project `node_modules/.bin`, configured extra paths, inherited
    /// PATH, NODE_PATH, then the configured fallbacks. Duplicates are skipped.
    pub fn assemble(environment: &ToolEnvironment, project_dir: Option<&Path>, tool: &ToolConfig) -> Self {
        let mut path = Self::default();

        if let Some(project) = project_dir {
            path.push_missing(project.join("node_modules").join(".bin"));
        }
        for extra in &tool.extra_search_paths {
            path.push_missing(extra.clone());
        }
        for source in [&environment.path, &environment.node_path].into_iter().flatten() {
            for entry in Self::parse(source).entries {
                path.push_missing(entry);
            }
        }
        for fallback in &tool.fallback_search_paths {
            path.push_missing(fallback.clone());
        }

        path
    }

    /// Append a directory unless it is already present
    pub fn push_missing(&mut self, dir: PathBuf) {
        if dir.as_os_str().is_empty() || self.contains(&dir) {
            return;
        }
        self.entries.push(dir);
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.entries.iter().any(|entry| entry == dir)
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Value suitable for the PATH environment variable
    pub fn to_os_string(&self) -> RelayResult<OsString> {
        std::env::join_paths(&self.entries)
            .map_err(|e| RelayError::config(format!("Invalid search path entry: {e}")))
    }

    /// Human-readable PATH for error messages
    pub fn display(&self) -> String {
        match self.to_os_string() {
            Ok(value) => value.to_string_lossy().into_owned(),
            Err(_) => self
                .entries
                .iter()
                .map(|entry| entry.display().to_string())
                .collect::<Vec<_>>()
                .join(":"),
        }
    }
}

/// Process environment values the relay depends on
#[derive(Debug, Clone, Default)]
pub struct ToolEnvironment {
    /// Inherited PATH
    pub path: Option<OsString>,
    /// NODE_PATH, whose entries are also searched
    pub node_path: Option<OsString>,
    /// Home directory for lint config fallback
    pub home: Option<PathBuf>,
}

impl ToolEnvironment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self {
            path: std::env::var_os("PATH"),
            node_path: std::env::var_os("NODE_PATH"),
            home: crate::config::discovery::home_directory(),
        }
    }
}

/// A fully resolved linter command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub search_path: SearchPath,
}

impl Invocation {
    pub fn new(program: impl Into<String>, search_path: SearchPath) -> Self {
        Self { program: program.into(), args: Vec::new(), working_directory: None, search_path }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn in_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }

    /// Command line for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Error describing a failed launch, carrying the PATH that was searched
    pub fn launch_error(&self, message: impl std::fmt::Display) -> RelayError {
        RelayError::tool_invocation(
            format!("could not run `{}`: {}", self.program, message),
            Some(self.search_path.display()),
        )
    }
}

/// Captured result of a finished linter process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, absent when the process was killed by a signal
    pub status: Option<i32>,
}

impl ToolOutput {
    /// Output with only stdout set and a zero exit status
    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: String::new(), status: Some(0) }
    }

    /// Diagnostic stream content, if the tool wrote anything meaningful there
    pub fn diagnostic(&self) -> Option<&str> {
        let trimmed = self.stderr.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Runs a linter invocation to completion
pub trait ToolRunner: Send + Sync {
    /// Run `invocation`, writing `input` to its stdin when given
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        input: Option<&'a str>,
    ) -> impl Future<Output = RelayResult<ToolOutput>> + Send + 'a;
}

/// Runner backed by real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a Invocation,
        input: Option<&'a str>,
    ) -> impl Future<Output = RelayResult<ToolOutput>> + Send + 'a {
        async move {
            tracing::debug!("Running {}", invocation.command_line());

            let mut command = Command::new(&invocation.program);
            command
                .args(&invocation.args)
                .env("PATH", invocation.search_path.to_os_string()?)
                .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(dir) = &invocation.working_directory {
                command.current_dir(dir);
            }

            let mut child = command.spawn().map_err(|e| invocation.launch_error(e))?;
            let stdin = child.stdin.take();

            let write_input = async move {
                if let (Some(mut stdin), Some(input)) = (stdin, input) {
                    stdin.write_all(input.as_bytes()).await?;
                    stdin.shutdown().await?;
                }
                Ok::<(), std::io::Error>(())
            };

            let (written, output) = tokio::join!(write_input, child.wait_with_output());
            let output = output.map_err(|e| invocation.launch_error(e))?;

            match written {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("Linter closed stdin early: {}", e);
                }
                Err(e) => return Err(invocation.launch_error(e)),
                Ok(()) => {}
            }

            tracing::debug!("Linter exited with {:?}", output.status.code());

            Ok(ToolOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                status: output.status.code(),
            })
        }
    }
}
