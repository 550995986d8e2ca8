//! harbor-sync - Harbor registry catalog synchronization
//!
//! Runs one exporter against a Harbor instance and prints every batch as a
//! JSON line, or replays a stored webhook delivery through the interpreter.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use harbor_sync_core::config::HarborConfig;
use harbor_sync_core::exporter::ResourceKind;
use harbor_sync_core::webhook::{WebhookOutcome, WebhookRequest, SIGNATURE_HEADER};

/// Modules that can be traced individually
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Client,
    Filter,
    Pagination,
    Exporter,
    Webhook,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Resource kinds accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Project,
    User,
    Repository,
    Artifact,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Project => ResourceKind::Project,
            KindArg::User => ResourceKind::User,
            KindArg::Repository => ResourceKind::Repository,
            KindArg::Artifact => ResourceKind::Artifact,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "harbor-sync",
    about = "Export a Harbor registry catalog and interpret Harbor webhooks",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// YAML configuration file; without it only HARBOR_* variables are used
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Enable trace-level logging (comma-separated: client,filter,pagination,exporter,webhook,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Export one resource kind, one JSON array per line
    Sync {
        #[clap(value_enum)]
        kind: KindArg,
    },

    /// Interpret a stored webhook body and print the resolved entities
    Webhook {
        /// File holding the raw request body
        #[clap(long)]
        body: PathBuf,

        /// Value of the x-harbor-signature header
        #[clap(long)]
        signature: Option<String>,
    },
}

/// Initialize tracing with CLI flags
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs always go to stderr so
/// stdout stays machine-readable.
fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule], json: bool) {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    for module in trace_modules {
        let directive = match module {
            TraceModule::Client => "harbor_sync_core::client=trace",
            TraceModule::Filter => "harbor_sync_core::filter=trace",
            TraceModule::Pagination => "harbor_sync_core::pagination=trace",
            TraceModule::Exporter => "harbor_sync_core::exporter=trace",
            TraceModule::Webhook => "harbor_sync_core::webhook=trace",
            TraceModule::All => "harbor_sync_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<HarborConfig> {
    match path {
        Some(path) => HarborConfig::load_from_path(path),
        None => {
            debug!("No --config given; using environment only");
            Ok(HarborConfig::from_env())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace, cli.log_json);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Sync { kind } => sync_command(&config, kind.into()).await,
        Command::Webhook { body, signature } => {
            webhook_command(&config, &body, signature.as_deref()).await
        }
    }
}

async fn sync_command(config: &HarborConfig, kind: ResourceKind) -> Result<()> {
    let selector = config.selector(kind)?;
    let sync = config.catalog_sync()?;

    let mut batches = sync.export(&selector);
    let mut batch_count = 0usize;
    let mut entity_count = 0usize;
    while let Some(batch) = batches.next().await {
        let line = serde_json::to_string(&batch).context("Failed to serialize batch")?;
        println!("{line}");
        batch_count += 1;
        entity_count += batch.len();
    }

    info!(
        "Exported {} {} entities in {} batches",
        entity_count, kind, batch_count
    );
    Ok(())
}

async fn webhook_command(
    config: &HarborConfig,
    body_path: &Path,
    signature: Option<&str>,
) -> Result<()> {
    let body = tokio::fs::read(body_path)
        .await
        .with_context(|| format!("Failed to read webhook body: {}", body_path.display()))?;

    let mut request = WebhookRequest::new(body);
    if let Some(signature) = signature {
        request = request.with_header(SIGNATURE_HEADER, signature);
    }

    let processor = config.webhook_processor()?;
    let outcome = processor.process(&request).await;
    match &outcome {
        WebhookOutcome::Resolved { kind, artifacts } => {
            info!("{} event resolved to {} artifacts", kind, artifacts.len())
        }
        WebhookOutcome::Deleted(kind) => info!("{} event carries no entities", kind),
        WebhookOutcome::Ignored { event_type } => info!("Event type '{}' ignored", event_type),
        WebhookOutcome::Rejected => warn!("Webhook rejected: signature did not verify"),
        WebhookOutcome::Malformed => warn!("Webhook payload could not be interpreted"),
        WebhookOutcome::Failed(kind) => warn!("{} event could not be resolved", kind),
    }

    let entities = outcome.into_entities();
    let output =
        serde_json::to_string_pretty(&entities).context("Failed to serialize entities")?;
    println!("{output}");
    Ok(())
}
