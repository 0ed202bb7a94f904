//! Lint Relay CLI - Command-line bridge between the editor and the linter
//!
//! CDD Principle: Application Layer - CLI coordinates editor requests with domain services
//! - Translates flags and editor environment variables into explicit requests
//! - Handles external concerns like stdin, gutter marks, marker files and exit codes
//! - Keeps stdout for the editor; logging goes to stderr

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lint_relay::config::{find_lint_config, home_directory, DEFAULT_CONFIG_FILES};
use lint_relay::{
    DisplayMode, FixOutcome, GutterMarks, LintRelay, LintReport, LintRequest, LintTarget,
    MarkerStore, RelayConfig, RelayError, ReportFormatter,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "colors")]
use colored::Colorize;

/// Lint Relay - pipe editor buffers through ESLint
#[derive(Parser)]
#[command(name = "lint-relay")]
#[command(version)]
#[command(about = "Pipe editor buffers through ESLint and present the results")]
#[command(long_about = "Lint Relay runs an external linter over the current editor buffer, extracting scripts from HTML when needed, and renders the results as gutter marks, a tooltip summary, or an HTML report.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Document being edited, as described by the editor
#[derive(Args, Debug, Clone, Default)]
struct DocumentArgs {
    /// Saved file path; omitted for unsaved buffers
    #[arg(long, env = "TM_FILEPATH")]
    file: Option<PathBuf>,

    /// Editor scope of the buffer; non-script scopes are treated as HTML
    #[arg(long, env = "TM_SCOPE", default_value = "source.js")]
    scope: String,

    /// Directory of the file
    #[arg(long, env = "TM_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Open project directory
    #[arg(long, env = "TM_PROJECT_DIRECTORY")]
    project: Option<PathBuf>,

    /// Linter executable, overriding the configuration
    #[arg(long, env = "TM_JAVASCRIPT_ESLINT_ESLINT")]
    executable: Option<String>,

    /// Editor helper used to set gutter marks
    #[arg(long, env = "TM_MATE")]
    mate: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint the buffer read from stdin
    Check {
        #[command(flatten)]
        document: DocumentArgs,

        /// Document line the input starts at
        #[arg(long, env = "TM_INPUT_START_LINE", default_value_t = 1)]
        start_line: u32,

        /// How results are presented
        #[arg(short, long, value_enum, default_value = "report")]
        mode: ModeArg,

        /// Read the buffer from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Let the linter fix the saved file in place
    Fix {
        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Forget that a report window is open for a document
    ClearMarker {
        /// Saved file path; omitted for unsaved buffers
        #[arg(long, env = "TM_FILEPATH")]
        file: Option<PathBuf>,
    },

    /// Show which lint configuration file would be used
    FindConfig {
        /// Directory to start searching from
        #[arg(long, env = "TM_DIRECTORY")]
        directory: Option<PathBuf>,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq)]
enum ModeArg {
    Report,
    Summary,
    Gutter,
    Json,
}

impl From<ModeArg> for DisplayMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Report => DisplayMode::Report,
            ModeArg::Summary => DisplayMode::Summary,
            ModeArg::Gutter => DisplayMode::Gutter,
            ModeArg::Json => DisplayMode::Json,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    configure_colors(cli.no_color);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let markers = MarkerStore::in_temp_dir();

    match cli.command {
        Commands::Check { document, start_line, mode, input } => {
            let config = load_config(cli.config.as_deref(), document.executable.as_deref())?;
            let source = read_source(input.as_deref())?;
            let request = build_request(&document, &config, start_line);
            run_check(config, &request, mode.into(), &source, document.mate.as_deref(), &markers).await
        }
        Commands::Fix { document } => {
            let config = load_config(cli.config.as_deref(), document.executable.as_deref())?;
            let request = build_request(&document, &config, 1);
            run_fix(config, &request, document.mate.as_deref()).await
        }
        Commands::ClearMarker { file } => {
            let config = load_config(cli.config.as_deref(), None)?;
            run_clear_marker(&config, file, &markers)
        }
        Commands::FindConfig { directory } => {
            let config = load_config(cli.config.as_deref(), None)?;
            Ok(run_find_config(&config, directory.as_deref(), home_directory().as_deref()))
        }
        Commands::ValidateConfig { config_file } => Ok(run_validate_config(config_file.or(cli.config))),
    }
}

/// Explicit `--config`, else a default file in the current directory, else defaults
fn load_config(path: Option<&Path>, executable: Option<&str>) -> anyhow::Result<RelayConfig> {
    let mut config = match path {
        Some(path) => RelayConfig::load_from_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            RelayConfig::discover_in(cwd)?
        }
    };

    if let Some(executable) = executable.filter(|e| !e.trim().is_empty()) {
        config.tool.executable = executable.to_string();
        config.validate()?;
    }

    tracing::debug!("Configuration fingerprint {}", config.fingerprint());
    Ok(config)
}

fn read_source(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source).context("cannot read stdin")?;
            Ok(source)
        }
    }
}

fn build_request(document: &DocumentArgs, config: &RelayConfig, start_line: u32) -> LintRequest {
    let request = match &document.file {
        Some(file) => LintRequest::for_file(file),
        None => LintRequest::unsaved(),
    };
    let directory = document.directory.clone().or_else(|| request.file_directory.clone());

    request
        .starting_at_line(start_line)
        .with_html(config.report.scope_is_embedded(&document.scope))
        .in_project(document.project.clone())
        .in_directory(directory)
}

async fn run_check(
    config: RelayConfig,
    request: &LintRequest,
    mode: DisplayMode,
    source: &str,
    mate: Option<&Path>,
    markers: &MarkerStore,
) -> anyhow::Result<i32> {
    let formatter = ReportFormatter::new(config.report.clone())?.with_tool_name(&config.tool.executable);
    let relay = LintRelay::new(config)?;

    let report = match relay.lint(source, request).await {
        Ok(report) => report,
        Err(e) => return Ok(report_failure(&formatter, &e, mode)),
    };

    if matches!(mode, DisplayMode::Summary | DisplayMode::Gutter) {
        if let (Some(mate), Some(file)) = (mate, &request.filename) {
            let marks = GutterMarks::new(mate, file, &relay.config().report);
            if let Err(e) = marks.apply(&report.issues, formatter.filter()).await {
                tracing::warn!("Could not update gutter marks: {}", e);
            }
        }
    }

    match mode {
        DisplayMode::Report => println!("{}", open_report(&formatter, markers, &report)),
        DisplayMode::Summary => {
            let summary = formatter.format_summary(&report);
            if !summary.is_empty() {
                println!("{}", summary);
            } else if markers.exists(&report.target.url) {
                // An open report window still shows the previous problems
                println!("{}", open_report(&formatter, markers, &report));
            }
        }
        DisplayMode::Gutter => {}
        DisplayMode::Json => println!("{}", formatter.format_report(&report, mode)?),
    }

    Ok(0)
}

/// HTML report whose window removes its marker again once closed
fn open_report(formatter: &ReportFormatter, markers: &MarkerStore, report: &LintReport) -> String {
    let marker = markers
        .create(&report.target.url)
        .map_err(|e| tracing::warn!("Could not record open report: {}", e))
        .ok();
    formatter.format_html(report, marker.as_deref())
}

fn report_failure(formatter: &ReportFormatter, error: &RelayError, mode: DisplayMode) -> i32 {
    match mode {
        DisplayMode::Report => println!("{}", formatter.format_error_html(error)),
        DisplayMode::Json => println!(
            "{}",
            serde_json::json!({ "error": error.to_string(), "searchPath": error.search_path() })
        ),
        DisplayMode::Summary => println!("{}", error),
        DisplayMode::Gutter => eprintln!("Error: {}", error),
    }
    1
}

async fn run_fix(config: RelayConfig, request: &LintRequest, mate: Option<&Path>) -> anyhow::Result<i32> {
    let formatter = ReportFormatter::new(config.report.clone())?.with_tool_name(&config.tool.executable);
    let relay = LintRelay::new(config)?;

    match relay.fix(request).await {
        Ok(FixOutcome::Fixed(_)) => {
            if let (Some(mate), Some(file)) = (mate, &request.filename) {
                GutterMarks::new(mate, file, &relay.config().report).clear().await?;
            }
            Ok(0)
        }
        Ok(FixOutcome::SkippedUnsaved) => {
            tracing::info!("Not fixing an unsaved buffer");
            Ok(0)
        }
        Ok(FixOutcome::SkippedEmbedded) => {
            tracing::info!("Not fixing scripts embedded in HTML");
            Ok(0)
        }
        Err(e) => Ok(report_failure(&formatter, &e, DisplayMode::Report)),
    }
}

fn run_clear_marker(config: &RelayConfig, file: Option<PathBuf>, markers: &MarkerStore) -> anyhow::Result<i32> {
    let link_base = &config.report.link_base;
    let target = match file {
        Some(file) => LintTarget::saved(file.clone(), file.display().to_string(), link_base),
        None => LintTarget::unsaved(link_base),
    };

    let removed = markers.remove(&target.url)?;
    tracing::debug!("Marker for {} removed: {}", target.url, removed);
    Ok(0)
}

fn run_find_config(config: &RelayConfig, directory: Option<&Path>, home: Option<&Path>) -> i32 {
    match find_lint_config(directory, home, &config.lint_config) {
        Some(path) => {
            println!("{}", path.display());
            0
        }
        None => {
            eprintln!(
                "{}",
                paint_failure(&format!("No {} found", config.lint_config.file_name))
            );
            1
        }
    }
}

fn run_validate_config(config_path: Option<PathBuf>) -> i32 {
    let config_path = config_path
        .or_else(|| DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|p| p.is_file()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));

    println!("Validating configuration: {}", config_path.display());

    match RelayConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("{}", paint_success("Configuration is valid"));
            println!("  Executable: {}", config.tool.executable);
            println!("  Output format: {}", config.tool.output_format.parser().format_name());
            println!("  Lint config file: {}", config.lint_config.file_name);
            println!("  Ignore patterns: {}", config.report.ignore_reasons.len());
            println!("  Fingerprint: {}", config.fingerprint());
            0
        }
        Err(e) => {
            eprintln!("{}", paint_failure(&format!("Configuration validation failed: {}", e)));
            1
        }
    }
}

#[cfg(feature = "colors")]
fn configure_colors(no_color: bool) {
    if no_color {
        colored::control::set_override(false);
    }
}

#[cfg(not(feature = "colors"))]
fn configure_colors(_no_color: bool) {}

#[cfg(feature = "colors")]
fn paint_success(message: &str) -> String {
    message.green().to_string()
}

#[cfg(not(feature = "colors"))]
fn paint_success(message: &str) -> String {
    message.to_string()
}

#[cfg(feature = "colors")]
fn paint_failure(message: &str) -> String {
    message.red().to_string()
}

#[cfg(not(feature = "colors"))]
fn paint_failure(message: &str) -> String {
    message.to_string()
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_flags() {
        let cli = Cli::try_parse_from([
            "lint-relay",
            "check",
            "--file",
            "/work/app.js",
            "--scope",
            "text.html.basic",
            "--start-line",
            "7",
            "--mode",
            "summary",
        ])
        .unwrap();

        match cli.command {
            Commands::Check { document, start_line, mode, .. } => {
                assert_eq!(document.file, Some(PathBuf::from("/work/app.js")));
                assert_eq!(document.scope, "text.html.basic");
                assert_eq!(start_line, 7);
                assert_eq!(mode, ModeArg::Summary);
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_build_request() {
        let config = RelayConfig::default();
        let document = DocumentArgs {
            file: Some(PathBuf::from("/work/src/index.html")),
            scope: "text.html.basic".to_string(),
            project: Some(PathBuf::from("/work")),
            ..Default::default()
        };

        let request = build_request(&document, &config, 12);
        assert!(request.input_is_html);
        assert_eq!(request.line_offset, 11);
        assert_eq!(request.file_directory, Some(PathBuf::from("/work/src")));
        assert_eq!(request.project_directory, Some(PathBuf::from("/work")));

        let script = DocumentArgs { scope: "source.js".to_string(), ..Default::default() };
        let request = build_request(&script, &config, 1);
        assert!(!request.input_is_html);
        assert!(request.filename.is_none());
    }

    #[test]
    fn test_load_config_executable_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("lint_relay.yaml");
        fs::write(&config_file, RelayConfig::default().to_yaml().unwrap()).unwrap();

        let config = load_config(Some(&config_file), Some("/opt/bin/eslint_d")).unwrap();
        assert_eq!(config.tool.executable, "/opt/bin/eslint_d");

        let config = load_config(Some(&config_file), Some("  ")).unwrap();
        assert_eq!(config.tool.executable, "eslint");
    }

    #[test]
    fn test_validate_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("test_config.yaml");
        fs::write(&config_file, RelayConfig::default().to_yaml().unwrap()).unwrap();
        assert_eq!(run_validate_config(Some(config_file)), 0);

        let broken = temp_dir.path().join("broken.yaml");
        fs::write(&broken, "version: \"9\"\ntool:\n  executable: eslint\n").unwrap();
        assert_eq!(run_validate_config(Some(broken)), 1);
    }

    #[test]
    fn test_find_config() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("src");
        fs::create_dir_all(&nested).unwrap();
        let config = RelayConfig::default();

        assert_eq!(run_find_config(&config, Some(&nested), None), 1);
        fs::write(temp_dir.path().join(".eslintrc"), "{}").unwrap();
        assert_eq!(run_find_config(&config, Some(&nested), None), 0);
    }

    #[test]
    fn test_clear_marker() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path());
        let config = RelayConfig::default();
        let file = PathBuf::from("/work/app.js");
        let url = LintTarget::saved(file.clone(), "app.js", &config.report.link_base).url;

        markers.create(&url).unwrap();
        assert_eq!(run_clear_marker(&config, Some(file), &markers).unwrap(), 0);
        assert!(!markers.exists(&url));
    }

    #[test]
    fn test_open_report_removes_its_marker_on_close() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path());
        let config = RelayConfig::default();
        let formatter = ReportFormatter::new(config.report.clone()).unwrap();
        let target = LintTarget::saved(PathBuf::from("/work/app.js"), "app.js", &config.report.link_base);
        let report = LintReport::new(target, Vec::new());

        let html = open_report(&formatter, &markers, &report);

        let marker = markers.marker_path(&report.target.url);
        assert!(marker.is_file());
        assert!(html.contains("visibilitychange"));
        assert!(html.contains(&format!("/bin/rm -f '{}'", marker.display())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_reports_missing_linter() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path());
        let config = lint_relay::ConfigBuilder::new()
            .executable("lint-relay-definitely-missing-tool")
            .build()
            .unwrap();

        let exit_code = run_check(
            config,
            &LintRequest::unsaved(),
            DisplayMode::Summary,
            "var x = 1;\n",
            None,
            &markers,
        )
        .await
        .unwrap();
        assert_eq!(exit_code, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_with_stub_linter() {
        let temp_dir = TempDir::new().unwrap();
        let markers = MarkerStore::new(temp_dir.path().join("markers"));
        let config = lint_relay::ConfigBuilder::new().executable("true").build().unwrap();

        let exit_code = run_check(
            config,
            &LintRequest::unsaved(),
            DisplayMode::Report,
            "var x = 1;\n",
            None,
            &markers,
        )
        .await
        .unwrap();

        assert_eq!(exit_code, 0);
        assert!(markers.exists(&LintTarget::unsaved("txmt://open").url));
    }
}
