//! Impact - downstream consumer impact checker
//!
//! The `impact` command checks whether a candidate patch to a library breaks
//! the test suites of the packages that depend on it.
//!
//! For every package in the package list it:
//!
//! - fetches the package and its dependencies into a private workspace
//! - runs the package's tests against the unpatched library
//! - applies the patch to the library's source
//! - runs the tests again
//!
//! Results go to a text or JSON report plus a console summary. Ctrl-C stops
//! the run early and still writes a report for the packages that finished.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use impact_ci::{GoToolchain, ImpactRun, TemplateToolchain, Toolchain};
use impact_core::{
    load_package_list, render_summary, write_report, ImpactConfig, ReportFormat, RunHeader,
    DEFAULT_CONCURRENCY, DEFAULT_QUEUE_CAPACITY,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "impact")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test downstream packages against a candidate library patch", long_about = None)]
struct Cli {
    /// Library the patch applies to (e.g. github.com/stretchr/testify)
    #[arg(short, long, env = "IMPACT_PACKAGE")]
    package: String,

    /// File listing one downstream package per line
    #[arg(short = 'f', long, env = "IMPACT_PACKAGE_FILE", default_value = "packages.txt")]
    package_file: PathBuf,

    /// Patch to apply, relative to the library's source directory
    #[arg(short, long, env = "IMPACT_DELTA", default_value = "delta.patch")]
    delta: PathBuf,

    /// Deadline for fetching each package (e.g. 90s, 60m)
    #[arg(
        short,
        long,
        env = "IMPACT_TIMEOUT",
        default_value = "60m",
        value_parser = humantime::parse_duration
    )]
    timeout: Duration,

    /// Report output file
    #[arg(short, long, env = "IMPACT_REPORT", default_value = "report.txt")]
    report: PathBuf,

    /// Number of packages tested concurrently
    #[arg(short = 'n', long, env = "IMPACT_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Directory under which per-package workspaces are created
    #[arg(short, long = "work-dir", env = "IMPACT_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Report layout: text or json
    #[arg(long, default_value = "text")]
    report_format: ReportFormat,

    /// JSON command templates replacing the built-in Go toolchain
    #[arg(long)]
    toolchain_file: Option<PathBuf>,

    /// Capacity of the package hand-off queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> ImpactConfig {
        ImpactConfig {
            package_list: self.package_file.clone(),
            patch_file: self.delta.clone(),
            fetch_timeout: self.timeout,
            report_file: self.report.clone(),
            report_format: self.report_format,
            concurrency: self.concurrency,
            work_root: self.work_dir.clone(),
            queue_capacity: self.queue_capacity,
            ..ImpactConfig::new(self.package.clone())
        }
    }

    fn toolchain(&self) -> Result<Arc<dyn Toolchain>> {
        match &self.toolchain_file {
            Some(path) => {
                let toolchain = TemplateToolchain::load(path)
                    .with_context(|| format!("Failed to load toolchain: {:?}", path))?;
                Ok(Arc::new(toolchain))
            }
            None => Ok(Arc::new(GoToolchain)),
        }
    }
}

/// Exit status for a command-line parse error.
///
/// Help and version requests succeed; every usage error is a configuration
/// failure and exits with 1.
fn usage_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = usage_exit_code(e.kind());
            // Nothing useful to do if stderr/stdout is gone.
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    impact_core::init_tracing(cli.json, level);

    let config = cli.config();
    config.validate().context("Invalid configuration")?;
    let config = config
        .absolutize_from_cwd()
        .context("Failed to resolve paths")?;
    let toolchain = cli.toolchain()?;

    std::fs::create_dir_all(&config.work_root)
        .with_context(|| format!("Failed to create work directory: {:?}", config.work_root))?;
    let packages = load_package_list(&config.package_list)
        .context("Failed to load package list")?;

    let interrupt = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(interrupt.clone()));

    let outcome = ImpactRun::new(toolchain, &config)
        .execute(packages, interrupt)
        .await
        .context("Run failed")?;

    print!("{}", render_summary(&outcome.state, outcome.completion));

    let digest = match config.patch_digest() {
        Ok(digest) => Some(digest),
        Err(e) => {
            warn!(error = %e, "Could not digest patch");
            None
        }
    };
    write_report(
        &config.report_file,
        config.report_format,
        RunHeader::new(&config.package_under_test, digest),
        &outcome.state,
        outcome.completion,
    )
    .context("Failed to write report")?;

    Ok(())
}

/// Cancel `interrupt` on the first Ctrl-C.
async fn watch_ctrl_c(interrupt: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupt received, finishing with partial results");
            interrupt.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
