//! Lint Relay - Editor bridge to an external JavaScript linter
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure transformations (script extraction, output parsing) sit at the core
//! - Process execution and editor side effects stay behind explicit seams
//! - LintRelay coordinates one linter run per editor request

pub mod config;
pub mod domain;
pub mod extractor;
pub mod parser;
pub mod process;
pub mod report;

// Re-export main types for convenient access
pub use domain::issues::{
    Issue, IssueCounts, LintReport, LintTarget, RelayError, RelayResult, Severity,
};

pub use config::{ConfigBuilder, RelayConfig, ReportConfig, ToolConfig};

pub use extractor::{ExtractorState, ScriptExtractor};

pub use parser::{CompactParser, JsonParser, OutputParser, ParseContext, ParserKind};

pub use process::{Invocation, ProcessRunner, SearchPath, ToolEnvironment, ToolOutput, ToolRunner};

pub use report::{DisplayMode, GutterMarks, MarkerStore, ReasonFilter, ReportFormatter};

use std::path::{Path, PathBuf};

/// What the editor asked to validate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintRequest {
    /// Saved file the text belongs to; absent for unsaved buffers
    pub filename: Option<PathBuf>,
    /// Whether the text is HTML with embedded scripts
    pub input_is_html: bool,
    /// Added to every reported line
    pub line_offset: i64,
    /// Open project, if any
    pub project_directory: Option<PathBuf>,
    /// Directory containing the file
    pub file_directory: Option<PathBuf>,
}

impl LintRequest {
    /// Request for a buffer that was never saved
    pub fn unsaved() -> Self {
        Self::default()
    }

    /// Request for a saved file; its directory is taken from the path
    pub fn for_file(filename: impl Into<PathBuf>) -> Self {
        let filename = filename.into();
        let file_directory = filename.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf);
        Self { filename: Some(filename), file_directory, ..Default::default() }
    }

    /// Fragment starts at `start_line` (1-based) of the document
    pub fn starting_at_line(mut self, start_line: u32) -> Self {
        self.line_offset = i64::from(start_line) - 1;
        self
    }

    pub fn with_html(mut self, input_is_html: bool) -> Self {
        self.input_is_html = input_is_html;
        self
    }

    pub fn in_project(mut self, project_directory: Option<PathBuf>) -> Self {
        self.project_directory = project_directory;
        self
    }

    pub fn in_directory(mut self, file_directory: Option<PathBuf>) -> Self {
        self.file_directory = file_directory;
        self
    }
}

/// Result of a fix request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// The linter ran in fix mode over the file
    Fixed(ToolOutput),
    /// Nothing to fix on disk
    SkippedUnsaved,
    /// Fix mode would rewrite the surrounding HTML
    SkippedEmbedded,
}

/// Main relay coordinating extraction, the linter process and parsing
pub struct LintRelay<R: ToolRunner = ProcessRunner> {
    config: RelayConfig,
    runner: R,
    parser: Box<dyn OutputParser>,
    environment: ToolEnvironment,
}

impl LintRelay<ProcessRunner> {
    /// Create a relay that runs real processes
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R: ToolRunner> LintRelay<R> {
    /// Create a relay with a custom runner
    pub fn with_runner(config: RelayConfig, runner: R) -> RelayResult<Self> {
        config.validate()?;
        let parser = config.tool.output_format.parser();
        Ok(Self { config, runner, parser, environment: ToolEnvironment::from_process() })
    }

    /// Replace the captured process environment
    pub fn with_environment(mut self, environment: ToolEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Directory the linter runs in
    pub fn working_directory(&self, request: &LintRequest) -> Option<PathBuf> {
        self.config
            .tool
            .working_directory
            .clone()
            .or_else(|| request.project_directory.clone())
            .or_else(|| request.file_directory.clone())
    }

    /// Lint configuration file for the request, if any
    pub fn find_lint_config(&self, request: &LintRequest) -> Option<PathBuf> {
        config::find_lint_config(
            request.file_directory.as_deref(),
            self.environment.home.as_deref(),
            &self.config.lint_config,
        )
    }

    fn search_path(&self, request: &LintRequest) -> SearchPath {
        SearchPath::assemble(&self.environment, request.project_directory.as_deref(), &self.config.tool)
    }

    /// Build the linter command for a validation run
    pub fn build_invocation(&self, request: &LintRequest, lint_config: Option<&Path>) -> Invocation {
        let cwd = self.working_directory(request);
        let mut invocation = Invocation::new(&self.config.tool.executable, self.search_path(request))
            .arg("-f")
            .arg(self.parser.format_name())
            .arg("--no-color")
            .arg("--stdin");

        if let Some(filename) = &request.filename {
            invocation = invocation
                .arg("--stdin-filename")
                .arg(relative_to(filename, cwd.as_deref()).display().to_string());
        }
        if let Some(lint_config) = lint_config {
            invocation = invocation.arg("-c").arg(lint_config.display().to_string());
        }

        invocation.in_directory(cwd)
    }

    /// Text actually sent to the linter
    pub fn prepare_fragment(&self, source: &str, input_is_html: bool) -> String {
        if input_is_html {
            ScriptExtractor::process_text(source)
        } else {
            source.to_string()
        }
    }

    /// Document target shown in reports
    pub fn target_for(&self, request: &LintRequest) -> LintTarget {
        let link_base = &self.config.report.link_base;
        match &request.filename {
            Some(filename) => {
                let cwd = self.working_directory(request);
                let display = relative_to(filename, cwd.as_deref()).display().to_string();
                LintTarget::saved(filename.clone(), display, link_base)
            }
            None => LintTarget::unsaved(link_base),
        }
    }

    /// Validate `source` and collect the linter's issues
    pub async fn lint(&self, source: &str, request: &LintRequest) -> RelayResult<LintReport> {
        let lint_config = self.find_lint_config(request);
        let invocation = self.build_invocation(request, lint_config.as_deref());
        let fragment = self.prepare_fragment(source, request.input_is_html);

        let output = self.runner.run(&invocation, Some(&fragment)).await?;
        if let Some(diagnostic) = output.diagnostic() {
            return Err(RelayError::tool_diagnostic(diagnostic));
        }

        let context = ParseContext::new(request.line_offset)
            .with_filename(request.filename.clone())
            .with_link_base(self.config.report.link_base.clone());
        let issues = self.parser.parse(&output.stdout, &context);
        tracing::debug!("Linter reported {} issues", issues.len());

        Ok(LintReport::new(self.target_for(request), issues).with_lint_config(lint_config))
    }

    /// Run the linter in fix mode over a saved script file
    pub async fn fix(&self, request: &LintRequest) -> RelayResult<FixOutcome> {
        let Some(filename) = &request.filename else {
            return Ok(FixOutcome::SkippedUnsaved);
        };
        if request.input_is_html {
            return Ok(FixOutcome::SkippedEmbedded);
        }

        let invocation = Invocation::new(&self.config.tool.executable, self.search_path(request))
            .arg("--fix")
            .arg(filename.display().to_string())
            .in_directory(self.working_directory(request));

        let output = self.runner.run(&invocation, None).await?;
        if let Some(diagnostic) = output.diagnostic() {
            tracing::warn!("Linter wrote diagnostics while fixing: {}", diagnostic);
        }
        Ok(FixOutcome::Fixed(output))
    }
}

/// `path` relative to `base`, or unchanged when no relative form exists
fn relative_to(path: &Path, base: Option<&Path>) -> PathBuf {
    base.and_then(|base| pathdiff::diff_paths(path, base))
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::future::Future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Runner returning a canned output and recording what it was given
    struct FakeRunner {
        output: ToolOutput,
        calls: Mutex<Vec<(Invocation, Option<String>)>>,
    }

    impl FakeRunner {
        fn returning(stdout: &str) -> Self {
            Self { output: ToolOutput::with_stdout(stdout), calls: Mutex::new(Vec::new()) }
        }

        fn failing_with(stderr: &str) -> Self {
            let output = ToolOutput { stderr: stderr.to_string(), status: Some(2), ..Default::default() };
            Self { output, calls: Mutex::new(Vec::new()) }
        }

        fn last_call(&self) -> (Invocation, Option<String>) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl ToolRunner for FakeRunner {
        fn run<'a>(
            &'a self,
            invocation: &'a Invocation,
            input: Option<&'a str>,
        ) -> impl Future<Output = RelayResult<ToolOutput>> + Send + 'a {
            async move {
                self.calls.lock().unwrap().push((invocation.clone(), input.map(str::to_string)));
                Ok(self.output.clone())
            }
        }
    }

    fn isolated_environment() -> ToolEnvironment {
        ToolEnvironment { path: Some(OsString::from("/usr/bin")), node_path: None, home: None }
    }

    fn relay(runner: FakeRunner) -> LintRelay<FakeRunner> {
        LintRelay::with_runner(RelayConfig::default(), runner)
            .unwrap()
            .with_environment(isolated_environment())
    }

    #[test]
    fn test_request_from_start_line() {
        assert_eq!(LintRequest::unsaved().starting_at_line(1).line_offset, 0);
        assert_eq!(LintRequest::unsaved().starting_at_line(12).line_offset, 11);

        let request = LintRequest::for_file("/work/src/app.js");
        assert_eq!(request.file_directory, Some(PathBuf::from("/work/src")));
    }

    #[test]
    fn test_invocation_arguments() {
        let relay = relay(FakeRunner::returning(""));
        let request = LintRequest::for_file("/work/src/app.js").in_project(Some(PathBuf::from("/work")));
        let invocation = relay.build_invocation(&request, Some(Path::new("/work/.eslintrc")));

        assert_eq!(invocation.program, "eslint");
        assert_eq!(
            invocation.args,
            vec!["-f", "compact", "--no-color", "--stdin", "--stdin-filename", "src/app.js", "-c", "/work/.eslintrc"]
        );
        assert_eq!(invocation.working_directory, Some(PathBuf::from("/work")));
        assert_eq!(invocation.search_path.entries()[0], PathBuf::from("/work/node_modules/.bin"));
    }

    #[test]
    fn test_invocation_for_unsaved_buffer() {
        let relay = relay(FakeRunner::returning(""));
        let invocation = relay.build_invocation(&LintRequest::unsaved(), None);

        assert_eq!(invocation.args, vec!["-f", "compact", "--no-color", "--stdin"]);
        assert!(invocation.working_directory.is_none());
    }

    #[test]
    fn test_working_directory_precedence() {
        let request = LintRequest::for_file("/work/src/app.js");
        let relay_default = relay(FakeRunner::returning(""));
        assert_eq!(relay_default.working_directory(&request), Some(PathBuf::from("/work/src")));

        let request = request.in_project(Some(PathBuf::from("/work")));
        assert_eq!(relay_default.working_directory(&request), Some(PathBuf::from("/work")));

        let config = ConfigBuilder::new().working_directory("/pinned").build().unwrap();
        let pinned = LintRelay::with_runner(config, FakeRunner::returning("")).unwrap();
        assert_eq!(pinned.working_directory(&request), Some(PathBuf::from("/pinned")));
    }

    #[test]
    fn test_json_format_flag() {
        let config = ConfigBuilder::new().output_format(ParserKind::Json).build().unwrap();
        let relay = LintRelay::with_runner(config, FakeRunner::returning("")).unwrap();
        let invocation = relay.build_invocation(&LintRequest::unsaved(), None);
        assert_eq!(&invocation.args[..2], &["-f".to_string(), "json".to_string()]);
    }

    #[tokio::test]
    async fn test_lint_parses_output_with_offset() {
        let runner = FakeRunner::returning(
            "<text>: line 2, col 4, Error - Missing semicolon (semi)\n<text>: line 1, col 0, Warning - Unused variable (no-unused-vars)\n\n2 problems\n",
        );
        let relay = relay(runner);
        let request = LintRequest::unsaved().starting_at_line(10);

        let report = relay.lint("var a = 1\nfoo()\n", &request).await.unwrap();

        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].line, 11);
        assert_eq!(report.issues[0].character, 5);
        assert!(report.issues[0].is_error());
        assert_eq!(report.issues[1].line, 10);
        assert_eq!(report.issues[1].character, 1);
        assert_eq!(report.counts, IssueCounts { error: 1, warning: 1, info: 0 });
        assert_eq!(report.target.display_name, LintTarget::UNSAVED_NAME);

        let (_, input) = relay.runner.last_call();
        assert_eq!(input.as_deref(), Some("var a = 1\nfoo()\n"));
    }

    #[tokio::test]
    async fn test_lint_extracts_scripts_from_html() {
        let relay = relay(FakeRunner::returning(""));
        let request = LintRequest::unsaved().with_html(true);
        let html = "<p>hi</p>\n<script>\nalert(1);\n</script>\n";

        let report = relay.lint(html, &request).await.unwrap();
        assert!(!report.has_issues());

        let (_, input) = relay.runner.last_call();
        assert_eq!(input.as_deref(), Some("\n\nalert(1);\n\n"));
    }

    #[tokio::test]
    async fn test_lint_finds_lint_config() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path();
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(project.join(".eslintrc"), "{}").unwrap();
        let file = project.join("src/app.js");

        let relay = relay(FakeRunner::returning(""));
        let request = LintRequest::for_file(&file).in_project(Some(project.to_path_buf()));
        let report = relay.lint("x = 1;\n", &request).await.unwrap();

        assert_eq!(report.lint_config, Some(project.join(".eslintrc")));
        assert_eq!(report.target.display_name, "src/app.js");
        let (invocation, _) = relay.runner.last_call();
        assert!(invocation.args.contains(&"-c".to_string()));
        assert!(invocation.args.contains(&"src/app.js".to_string()));
    }

    #[tokio::test]
    async fn test_relative_file_links_match_target() {
        let relay = relay(FakeRunner::returning("<text>: line 3, col 1, Warning - Unused variable\n"));
        let request = LintRequest::for_file("src/app.js");

        let report = relay.lint("x = 1;\n", &request).await.unwrap();

        let expected = std::env::current_dir().unwrap().join("src/app.js");
        assert_eq!(report.target.filename, Some(expected));
        assert!(report.issues[0].url.starts_with(&report.target.url));
        assert!(report.issues[0].url.ends_with("&line=3&column=2"));
    }

    #[tokio::test]
    async fn test_lint_diagnostic_aborts() {
        let relay = relay(FakeRunner::failing_with("Cannot read config file: .eslintrc\n"));
        let err = relay.lint("x\n", &LintRequest::unsaved()).await.unwrap_err();

        match err {
            RelayError::ToolDiagnostic { diagnostic } => {
                assert_eq!(diagnostic, "Cannot read config file: .eslintrc")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fix_skips_unsaved_and_embedded() {
        let relay = relay(FakeRunner::returning(""));

        assert_eq!(relay.fix(&LintRequest::unsaved()).await.unwrap(), FixOutcome::SkippedUnsaved);
        let embedded = LintRequest::for_file("/work/index.html").with_html(true);
        assert_eq!(relay.fix(&embedded).await.unwrap(), FixOutcome::SkippedEmbedded);
        assert!(relay.runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fix_runs_linter_on_file() {
        let relay = relay(FakeRunner::returning(""));
        let request = LintRequest::for_file("/work/app.js");

        assert!(matches!(relay.fix(&request).await.unwrap(), FixOutcome::Fixed(_)));
        let (invocation, input) = relay.runner.last_call();
        assert_eq!(invocation.args, vec!["--fix", "/work/app.js"]);
        assert_eq!(invocation.working_directory, Some(PathBuf::from("/work")));
        assert!(input.is_none());
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to(Path::new("/a/b/c.js"), Some(Path::new("/a"))), PathBuf::from("b/c.js"));
        assert_eq!(relative_to(Path::new("/a/b/c.js"), None), PathBuf::from("/a/b/c.js"));
        assert_eq!(relative_to(Path::new("/x/c.js"), Some(Path::new("/a/b"))), PathBuf::from("../../x/c.js"));
    }
}
