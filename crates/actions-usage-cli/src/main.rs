//! actions-usage - live GitHub Actions usage for an organization
//!
//! Scans every repository of an organization for queued and in-progress
//! workflow runs and prints, per run, how many jobs are queued, running
//! and completed.

mod render;
mod token;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actions_usage_core::{
    init_tracing, AggregationDriver, CancellationToken, GitHubClient, GitHubConfig, ProgressSink,
    RetryPolicy, DEFAULT_API_URL,
};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::{debug, info, Level};

use render::MarkerProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "actions-usage")]
#[command(author = "actions-usage contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Show queued and running GitHub Actions jobs across an organization",
    long_about = None
)]
struct Cli {
    /// Organization to scan
    org: Option<String>,

    /// File holding a read-only personal access token
    /// (default: ~/actions-usage.tok)
    #[arg(long, env = "ACTIONS_USAGE_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Re-attempts per run listing after a 5xx response
    #[arg(long, default_value_t = RetryPolicy::DEFAULT_MAX_RETRIES)]
    retries: u32,

    /// Pause before each re-attempt, in milliseconds
    #[arg(long, default_value_t = 0)]
    retry_backoff_ms: u64,

    /// Per-request timeout, in seconds (default: wait indefinitely)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json_logs, level, io::stderr);

    let Some(org) = cli.org.as_deref() else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let token_path = cli.token_file.clone().or_else(token::default_token_path);
    let token = match token_path.as_deref().map(token::read_token) {
        Some(Ok(token)) => token,
        Some(Err(e)) => {
            debug!(error = %e, "No usable token");
            print!("{}", token::instructions(token_path.as_deref()));
            return Ok(());
        }
        None => {
            print!("{}", token::instructions(None));
            return Ok(());
        }
    };

    let mut config = GitHubConfig::new(&token).with_api_url(&cli.api_url);
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let client = GitHubClient::new(config).context("Failed to create GitHub client")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let policy = RetryPolicy::immediate(cli.retries)
        .with_backoff(Duration::from_millis(cli.retry_backoff_ms));
    let mut driver = AggregationDriver::new(Arc::new(client), policy).with_cancellation(cancel);

    // Keep stdout clean for machine-readable output.
    let mut progress: Box<dyn ProgressSink> = match cli.format {
        OutputFormat::Table => Box::new(MarkerProgress::new(io::stdout())),
        OutputFormat::Json => Box::new(MarkerProgress::new(io::stderr())),
    };

    let outcome = driver.run(org, progress.as_mut()).await;
    drop(progress);
    match cli.format {
        OutputFormat::Table => println!("\n"),
        OutputFormat::Json => eprintln!(),
    }
    let report = outcome.with_context(|| format!("Failed to gather workflow usage for {org}"))?;

    match cli.format {
        OutputFormat::Table => print!("{}", render::render_table(&report)),
        OutputFormat::Json => {
            let json = render::render_json(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
    }

    Ok(())
}
