use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use loglens::report::HtmlReport;
use loglens::view::Severity;
use loglens::{HttpApi, LensError, ReplayApi, RunReport, UploadForm, UploadWorkflow};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload log files for analysis and render the results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a log file to the analysis server and write an HTML report
    Analyze(AnalyzeArgs),
    /// Render a report from saved upload/stats response bodies
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Log file to upload
    #[arg(value_hint = ValueHint::FilePath)]
    log_file: PathBuf,

    /// Analysis server base URL
    #[arg(long, env = "LOGLENS_SERVER", default_value = "http://127.0.0.1:5000/")]
    server: String,

    /// Output HTML report path
    #[arg(short, long, default_value = "report.html", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Extra form field sent with the file (`name=value`, repeatable)
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Per-request timeout in seconds (waits indefinitely when unset)
    #[arg(long)]
    timeout: Option<f64>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Saved `/upload` response body
    #[arg(value_hint = ValueHint::FilePath)]
    upload_json: PathBuf,

    /// Saved `/get_stats/{filename}` response body
    #[arg(value_hint = ValueHint::FilePath)]
    stats_json: PathBuf,

    /// Output HTML report path
    #[arg(short, long, default_value = "report.html", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn parse_field(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("invalid field '{input}': expected name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid field '{input}': empty name"));
    }
    if name == "file" {
        return Err("the 'file' field is reserved for the log file".to_string());
    }
    Ok((name.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Analyze(args) => args.verbose,
        Command::Render(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Render(args) => handle_render(args),
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

fn request_timeout(secs: Option<f64>) -> Result<Option<Duration>> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    if secs.is_nan() || secs <= 0.0 {
        return Err(anyhow!("--timeout must be a positive number, got {secs}"));
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|err| anyhow!("--timeout {secs} is out of range: {err}"))
}

fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let bytes = fs::read(&args.log_file)
        .with_context(|| format!("failed to read {}", args.log_file.display()))?;
    let file_name = args
        .log_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", args.log_file.display()))?
        .to_string();

    let mut form = UploadForm::new(file_name.clone(), bytes);
    for (name, value) in args.fields {
        form = form.with_field(name, value);
    }

    let timeout = request_timeout(args.timeout)?;
    let api = HttpApi::with_timeout(&args.server, timeout)?;
    info!("Uploading {} ({} bytes) to {}", file_name, form.bytes.len(), api.base());

    let workflow = UploadWorkflow::new(api);
    let mut report = HtmlReport::new();
    let outcome = block_on(workflow.run(form, &mut report))?;
    finish(&report, &outcome, &file_name, &args.output)
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let upload = fs::read_to_string(&args.upload_json)
        .with_context(|| format!("failed to read {}", args.upload_json.display()))?;
    let stats = fs::read_to_string(&args.stats_json).map_err(|err| {
        LensError::Transport(format!("failed to read {}: {err}", args.stats_json.display()))
    });

    let workflow = UploadWorkflow::new(ReplayApi::new(Ok(upload), stats));
    let mut report = HtmlReport::new();
    let outcome = block_on(workflow.run((), &mut report))?;
    let label = args
        .upload_json
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "replay".to_string());
    finish(&report, &outcome, &label, &args.output)
}

/// Write the report whatever the outcome, then turn a failed run into an error.
fn finish(report: &HtmlReport, outcome: &RunReport, label: &str, output: &Path) -> Result<()> {
    for note in report.notifications() {
        match note.severity {
            Severity::Success => info!("{}", note.message),
            Severity::Danger => warn!("{}", note.message),
        }
    }

    let title = format!(
        "Log analysis: {} ({})",
        label,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    fs::write(output, report.to_page(&title))
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("Wrote report: {}", output.display());

    match &outcome.error {
        None => Ok(()),
        Some(err) => Err(anyhow!("analysis of {} failed: {}", label, err.user_message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD: &str = r#"{"success":true,"filename":"a.log","stats":{"total_logs":3,
        "log_levels":{"ERROR":2,"INFO":1},"time_range":{"start":"t0","end":"t1"}}}"#;

    #[test]
    fn analyze_arguments() {
        let cli = Cli::try_parse_from([
            "loglens",
            "analyze",
            "app.log",
            "--server",
            "http://logs.internal:8080",
            "--field",
            "source=prod",
            "--field",
            "note=a=b",
            "--timeout",
            "2.5",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.log_file, PathBuf::from("app.log"));
        assert_eq!(args.server, "http://logs.internal:8080");
        assert_eq!(args.output, PathBuf::from("report.html"));
        assert_eq!(
            args.fields,
            [
                ("source".to_string(), "prod".to_string()),
                ("note".to_string(), "a=b".to_string())
            ]
        );
        assert_eq!(args.timeout, Some(2.5));
    }

    #[test]
    fn field_parsing() {
        assert_eq!(parse_field("k=v"), Ok(("k".to_string(), "v".to_string())));
        assert_eq!(parse_field(" k =").map(|(k, v)| (k, v.is_empty())), Ok(("k".to_string(), true)));
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=v").is_err());
        assert!(parse_field("file=x").is_err());
    }

    #[test]
    fn timeout_bounds() {
        assert_eq!(request_timeout(None).unwrap(), None);
        assert_eq!(request_timeout(Some(2.5)).unwrap(), Some(Duration::from_millis(2500)));
        assert!(request_timeout(Some(0.0)).is_err());
        assert!(request_timeout(Some(-1.0)).is_err());
        assert!(request_timeout(Some(f64::NAN)).is_err());
        assert!(request_timeout(Some(1e300)).is_err());
        assert!(request_timeout(Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn render_requires_both_bodies() {
        assert!(Cli::try_parse_from(["loglens", "render", "upload.json"]).is_err());
    }

    #[test]
    fn render_writes_report_from_saved_bodies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = dir.path().join("upload.json");
        let stats = dir.path().join("stats.json");
        let output = dir.path().join("out.html");
        fs::write(&upload, UPLOAD).unwrap();
        fs::write(&stats, r#"{"top_errors":[["timeout",5],["auth fail",2]]}"#).unwrap();

        handle_render(RenderArgs {
            upload_json: upload,
            stats_json: stats,
            output: output.clone(),
            verbose: false,
        })
        .expect("render succeeds");

        let page = fs::read_to_string(&output).unwrap();
        assert!(page.contains("ERROR: 2"));
        assert!(page.contains("<td>timeout</td><td>5</td>"));
        assert!(page.contains("alert-success"));
    }

    #[test]
    fn missing_stats_body_still_writes_a_failure_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = dir.path().join("upload.json");
        let output = dir.path().join("out.html");
        fs::write(&upload, UPLOAD).unwrap();

        let err = handle_render(RenderArgs {
            upload_json: upload,
            stats_json: dir.path().join("missing.json"),
            output: output.clone(),
            verbose: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to read"));

        let page = fs::read_to_string(&output).unwrap();
        assert!(page.contains("alert-danger"));
        assert!(page.contains("ERROR: 2"));
    }

    #[test]
    fn rejected_upload_reports_server_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = dir.path().join("upload.json");
        let stats = dir.path().join("stats.json");
        let output = dir.path().join("out.html");
        fs::write(&upload, r#"{"error":"Invalid file type"}"#).unwrap();
        fs::write(&stats, "{}").unwrap();

        let err = handle_render(RenderArgs {
            upload_json: upload,
            stats_json: stats,
            output: output.clone(),
            verbose: false,
        })
        .unwrap_err();
        assert!(err.to_string().ends_with("Invalid file type"));
        assert!(fs::read_to_string(&output).unwrap().contains("Invalid file type"));
    }
}
