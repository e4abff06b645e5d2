//! html-tool - generate single-file HTML tools with an AI agent
//!
//! Usage:
//!   html-tool "JSON to YAML converter"              Write json-to-yaml-converter.html
//!   html-tool "color picker" -o picker.html -p      Explicit name, open when done
//!   html-tool --write-config                        Create .html-tool/config.toml
//!
//! The saved file's absolute path is the only thing printed to stdout.
//! Progress, warnings and diagnostics go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use htool_core::config::BackendKind;
use htool_core::{ErrorKind, GenerationRequest, GenerationResult, HtoolConfig, RequestBuilder};
use htool_pipeline::Pipeline;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Exit code for bad usage, bad config and setup failures
const EXIT_USAGE: u8 = 5;

#[derive(Parser, Debug)]
#[command(name = "html-tool")]
#[command(author, version, about = "Generate single-file HTML tools using AI")]
#[command(after_help = "Example: html-tool \"JSON to YAML converter\" --output converter.html --preview")]
struct Cli {
    /// Description of the tool to build
    #[arg(required_unless_present = "write_config")]
    description: Vec<String>,

    /// Output filename (default: derived from the description)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Open the generated tool in the default browser
    #[arg(short, long)]
    preview: bool,

    /// Show full agent output and debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Overwrite the --output file if it already exists
    #[arg(long)]
    force: bool,

    /// Config file (default: .html-tool/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Agent backend to use
    #[arg(long, value_enum)]
    backend: Option<CliBackend>,

    /// Per-attempt agent timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write a default .html-tool/config.toml and exit
    #[arg(long)]
    write_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    /// External agent program (amplifier by default)
    Command,
    /// Anthropic Messages API
    Anthropic,
}

impl From<CliBackend> for BackendKind {
    fn from(b: CliBackend) -> Self {
        match b {
            CliBackend::Command => BackendKind::Command,
            CliBackend::Anthropic => BackendKind::Anthropic,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_USAGE);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let stderr = io::stderr();
    log_subscriber(verbose, stderr.is_terminal(), io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

/// `RUST_LOG` wins; otherwise debug for our crates with --verbose, warn without
///
/// Colour is only used when `ansi` is set, so redirected stderr stays plain.
fn log_subscriber<W>(
    verbose: bool,
    ansi: bool,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,htool_core={level},htool_agent={level},htool_pipeline={level},html_tool={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

async fn run(cli: Cli) -> Result<u8> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    if cli.write_config {
        let path = HtoolConfig::write_default(&cwd)?;
        eprintln!("Wrote default config to {}", path.display());
        println!("{}", path.display());
        return Ok(0);
    }

    let (request, pipeline) = match prepare(&cli, &cwd) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("{}", error_line(Some(e.kind()), &e.to_string()));
            return Ok(exit_code(e.kind().exit_code()));
        }
    };

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling...");
            watcher.cancel();
        }
    });

    eprintln!("Building HTML tool: {}", request.description());
    eprintln!();
    eprintln!("Calling {} agent...", pipeline.agent().backend_name());

    let result = pipeline.run(&request, &cancel).await;
    if let Err(e) = report(&request, &result, &mut io::stdout(), &mut io::stderr()) {
        warn!("Failed to write report: {}", e);
    }

    Ok(exit_code(result.exit_code()))
}

/// Load config, apply flag overrides, and build the request and pipeline
fn prepare(cli: &Cli, cwd: &Path) -> htool_core::Result<(GenerationRequest, Pipeline)> {
    let config = load_config(cli, cwd)?;

    let request = RequestBuilder::from_words(&cli.description)
        .output(cli.output.clone())
        .preview(cli.preview)
        .verbose(cli.verbose)
        .force(cli.force)
        .build()?;

    let pipeline = Pipeline::from_config(&config)?;
    info!(
        "Using {} backend '{}'",
        config.agent.backend,
        pipeline.agent().backend_name()
    );
    Ok((request, pipeline))
}

fn load_config(cli: &Cli, cwd: &Path) -> htool_core::Result<HtoolConfig> {
    let mut config = match &cli.config {
        Some(path) => HtoolConfig::load(path)?,
        None => HtoolConfig::load_or_default(cwd)?,
    };

    if let Some(backend) = cli.backend {
        config.agent.backend = backend.into();
    }
    if let Some(secs) = cli.timeout {
        config.agent.timeout_secs = secs;
    }
    config.validate()?;

    debug!("Effective config: {:?}", config);
    Ok(config)
}

/// Progress and diagnostics go to `err`; only a saved path goes to `out`
fn report(
    request: &GenerationRequest,
    result: &GenerationResult,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    if let Some(raw) = &result.raw_reply {
        writeln!(err, "\n--- Full Agent Output ---")?;
        writeln!(err, "{}", raw)?;
        writeln!(err, "--- End Output ---\n")?;
    }
    if !result.trace.is_empty() {
        writeln!(err, "--- Extraction Trace ---")?;
        for step in &result.trace {
            writeln!(err, "  {}", step)?;
        }
        writeln!(err, "--- End Trace ---\n")?;
    }

    for warning in &result.warnings {
        writeln!(err, "Warning: {}", warning)?;
    }

    if let (true, Some(path)) = (result.success, &result.file_path) {
        writeln!(err, "Generated: {}", path.display())?;
        writeln!(err, "   Size: {} bytes", result.bytes_written)?;
        writeln!(err, "\nNext steps:")?;
        writeln!(err, "   - Open: {}", path.display())?;
        if !request.preview() {
            writeln!(
                err,
                "   - Preview: html-tool \"{}\" --preview",
                request.description()
            )?;
        }
        writeln!(err, "   - Deploy: commit to a GitHub repo with Pages enabled")?;
        writeln!(out, "{}", path.display())?;
        return Ok(());
    }

    let message = result.message.as_deref().unwrap_or("unknown failure");
    writeln!(err, "{}", error_line(result.error_kind, message))?;

    // OutputExists already names --force in its message
    let extraction_failed = matches!(
        result.error_kind,
        Some(ErrorKind::NoArtifactFound | ErrorKind::MultipleArtifacts | ErrorKind::EmptyArtifact)
    );
    if extraction_failed && !request.verbose() {
        writeln!(err, "Run with --verbose to see full output.")?;
    }
    Ok(())
}

fn error_line(kind: Option<ErrorKind>, message: &str) -> String {
    match kind {
        Some(kind) => format!("Error ({} stage, {}): {}", kind.stage(), kind, message),
        None => format!("Error: {}", message),
    }
}

fn exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use htool_core::HtoolError;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(request: &GenerationRequest, result: &GenerationResult) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        report(request, result, &mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_description_words_are_collected() {
        let cli = Cli::try_parse_from(["html-tool", "JSON", "to", "YAML", "-p", "-o", "x.html"])
            .unwrap();
        assert_eq!(cli.description, vec!["JSON", "to", "YAML"]);
        assert!(cli.preview);
        assert_eq!(cli.output, Some(PathBuf::from("x.html")));
    }

    #[test]
    fn test_description_required_unless_writing_config() {
        let err = Cli::try_parse_from(["html-tool"]).unwrap_err();
        assert!(err.use_stderr());
        assert!(Cli::try_parse_from(["html-tool", "--write-config"]).is_ok());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = std::env::temp_dir();
        let cli = Cli::try_parse_from([
            "html-tool",
            "timer",
            "--backend",
            "anthropic",
            "--timeout",
            "5",
        ])
        .unwrap();
        let config = load_config(&cli, &dir.join("html-tool-no-such-dir")).unwrap();
        assert_eq!(config.agent.backend, BackendKind::Anthropic);
        assert_eq!(config.agent.timeout_secs, 5);
    }

    #[test]
    fn test_zero_timeout_is_config_error() {
        let cli = Cli::try_parse_from(["html-tool", "timer", "--timeout", "0"]).unwrap();
        let err = load_config(&cli, &std::env::temp_dir().join("html-tool-no-such-dir"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(exit_code(err.kind().exit_code()), EXIT_USAGE);
    }

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(4), 4);
        assert_eq!(exit_code(-1), 1);
    }

    #[test]
    fn test_failure_report_has_one_error_line_naming_kind() {
        let request = RequestBuilder::new("timer").build().unwrap();
        let result =
            GenerationResult::pending(Uuid::new_v4()).fail(&HtoolError::NoArtifactFound);

        let (out, err) = render(&request, &result);

        assert!(out.is_empty());
        let errors: Vec<&str> = err.lines().filter(|l| l.starts_with("Error")).collect();
        assert_eq!(errors.len(), 1, "{}", err);
        assert!(errors[0].starts_with("Error (extraction stage, NoArtifactFoundError): "));
        assert!(err.contains("Run with --verbose"));
    }

    #[test]
    fn test_output_exists_names_force_once() {
        let request = RequestBuilder::new("timer")
            .output(Some(PathBuf::from("mine.html")))
            .build()
            .unwrap();
        let result = GenerationResult::pending(Uuid::new_v4())
            .fail(&HtoolError::OutputExists(PathBuf::from("mine.html")));

        let (out, err) = render(&request, &result);

        assert!(out.is_empty());
        assert_eq!(err.matches("--force").count(), 1, "{}", err);
        assert_eq!(err.lines().filter(|l| l.starts_with("Error")).count(), 1);
    }

    #[test]
    fn test_success_report_prints_only_path_to_stdout() {
        let request = RequestBuilder::new("timer").build().unwrap();
        let path = std::env::temp_dir().join("timer.html");
        let result = GenerationResult::pending(Uuid::new_v4()).succeed(path.clone(), 42);

        let (out, err) = render(&request, &result);

        assert_eq!(out, format!("{}\n", path.display()));
        assert!(err.contains("Size: 42 bytes"));
        assert!(!err.contains("Error"));
    }

    #[test]
    fn test_logs_are_plain_when_not_a_terminal() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = log_subscriber(false, false, move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            warn!("Config file ignored: {}", "missing.toml");
        });

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Config file ignored: missing.toml"), "{}", logged);
        assert!(!logged.contains('\u{1b}'), "{:?}", logged);
    }
}
