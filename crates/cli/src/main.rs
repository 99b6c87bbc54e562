//! Review-sheet CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `review-sheet.toml` (see [`config`]) and
//!    read the API tokens from the environment.
//! 2. **Wire observability**: configure `tracing-subscriber` with a text or
//!    JSON layer and, when a collector endpoint is known, an OpenTelemetry
//!    OTLP exporter. All `tracing` spans and events from every crate in the
//!    workspace flow through these layers.
//! 3. **Construct infrastructure**: create the GitHub and Sheets clients and
//!    hand them to a [`review::Tracker`].
//! 4. **Run the command**:
//!    - `init`: create a spreadsheet, lay out the title row, fill it once.
//!    - `sync`: run one cycle and exit.
//!    - `run`: run a cycle every `interval_secs` until Ctrl-C.

mod config;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use github::{GitHubIssues, GitHubSettings};
use review::{
    CycleReport, IssueSource, RetryPolicy, SheetStore, SpreadsheetId, SyncError, Tracker,
};
use sheets::{SheetRef, SheetsClient, SheetsSettings, Spreadsheet};

use crate::config::Config;

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "review-sheet")]
#[command(about = "Keeps a Google Sheet of open GitHub issues up to date")]
#[command(version)]
struct Args {
    /// Path to config file
    #[arg(long, short, env = "REVIEW_SHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new spreadsheet with the column layout and fill it
    Init {
        /// Title of the new spreadsheet
        #[arg(long)]
        title: String,
    },
    /// Run one sync cycle against the configured spreadsheet
    Sync,
    /// Sync on a fixed interval until interrupted
    Run,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    // Cycles are strictly sequential; one thread is all they need.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async {
        let telemetry = init_tracing(args.log_format, config.otlp_endpoint())?;
        let result = execute(args.command, &config).await;
        if let Some(provider) = telemetry {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush telemetry: {e}");
            }
        }
        result
    })
}

async fn execute(command: Command, config: &Config) -> Result<()> {
    let tracker = Tracker::new(config.tracker_settings()).context("Invalid repository catalog")?;
    let issues = github_client(config)?;
    let sheets = sheets_client(config)?;

    match command {
        Command::Init { title } => {
            let id = sheets
                .create_spreadsheet(&title)
                .await
                .context("Failed to create the spreadsheet")?;
            info!(spreadsheet = %id, %title, "created spreadsheet");
            println!("{id}");

            let store = bind_sheet(&sheets, id, config);
            let report = tracker.initialise(&issues, &store, &config.columns).await;
            log_outcome(&report);
            report?;
        }
        Command::Sync => {
            let store = bind_sheet(&sheets, spreadsheet_id(config)?, config);
            let report = tracker.run_cycle(&issues, &store).await;
            log_outcome(&report);
            report?;
        }
        Command::Run => {
            let store = bind_sheet(&sheets, spreadsheet_id(config)?, config);
            info!(
                spreadsheet = %store.id(),
                interval_secs = config.interval_secs,
                "starting sync loop"
            );
            run_until(&tracker, &issues, &store, config.interval(), tokio::signal::ctrl_c()).await;
        }
    }
    Ok(())
}

/// Scheduler loop. A failed cycle is logged and the next one runs on the
/// usual interval. `shutdown` only ends the loop between cycles; a cycle in
/// flight always runs to completion. Returns the number of cycles run.
async fn run_until<F>(
    tracker: &Tracker,
    issues: &dyn IssueSource,
    store: &dyn SheetStore,
    interval: std::time::Duration,
    shutdown: F,
) -> usize
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let mut shutdown = tokio::spawn(shutdown);
    let mut cycles = 0;

    loop {
        let report = tracker.run_cycle(issues, store).await;
        log_outcome(&report);
        cycles += 1;

        if shutdown.is_finished() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }

    info!(cycles, "interrupted, stopping sync loop");
    cycles
}

fn log_outcome(result: &Result<CycleReport, SyncError>) {
    match result {
        Ok(report) => info!(
            cycle = %report.cycle,
            range = %report.range,
            fetched = report.fetched,
            rows = report.rows,
            inserted = report.inserted,
            refreshed = report.refreshed,
            closed = report.closed,
            "sheet synced"
        ),
        Err(err) => match err.retry_policy() {
            RetryPolicy::NonRetryable => {
                error!(error = %err, "sync failed; fix the configuration or the sheet")
            }
            RetryPolicy::Retryable { after } => warn!(
                error = %err,
                retry_after_secs = after.map(|d| d.as_secs()),
                "sync failed; the sheet keeps its previous contents"
            ),
        },
    }
}

fn github_client(config: &Config) -> Result<GitHubIssues> {
    let token = config::secret(&config.github.token_env);
    if token.is_none() {
        warn!(
            env = %config.github.token_env,
            "no GitHub token set, using anonymous rate limits"
        );
    }
    GitHubIssues::new(GitHubSettings {
        api_url: config.github.api_url.clone(),
        token,
        per_page: config.github.per_page,
        timeout: HTTP_TIMEOUT,
    })
    .context("Failed to build the GitHub client")
}

fn sheets_client(config: &Config) -> Result<SheetsClient> {
    let token = config::secret(&config.google.token_env).with_context(|| {
        format!(
            "Google OAuth token not found; set {} to an access token with the spreadsheets scope",
            config.google.token_env
        )
    })?;
    SheetsClient::new(SheetsSettings {
        api_url: config.google.api_url.clone(),
        token,
        timeout: HTTP_TIMEOUT,
    })
    .context("Failed to build the Sheets client")
}

fn spreadsheet_id(config: &Config) -> Result<SpreadsheetId> {
    config
        .sheet
        .spreadsheet_id
        .clone()
        .and_then(SpreadsheetId::new)
        .context("No spreadsheet configured; set [sheet] spreadsheet_id or run `review-sheet init`")
}

fn bind_sheet(client: &SheetsClient, id: SpreadsheetId, config: &Config) -> Spreadsheet {
    client.sheet(
        id,
        SheetRef {
            name: config.sheet.name.clone(),
            gid: config.sheet.gid,
        },
    )
}

fn init_tracing(format: LogFormat, otlp_endpoint: Option<String>) -> Result<Option<TracerProvider>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let provider = otlp_endpoint.as_deref().map(otlp_provider).transpose()?;
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("review-sheet")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    if let Some(endpoint) = otlp_endpoint {
        info!(%endpoint, "exporting traces over OTLP");
    }
    Ok(provider)
}

fn otlp_provider(endpoint: &str) -> Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to build the OTLP span exporter")?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::TokioCurrentThread)
        .build())
}
