//! ledgerflow - ledger ingestion pipelines
//!
//! # Usage
//!
//! ```bash
//! # Write a stream batch to the audit table
//! ledgerflow -c ledgerflow.yaml bulk --event batch.json
//!
//! # Load the transactions file named by an object notification
//! cat notification.json | ledgerflow relational --event -
//!
//! # Validate configuration
//! ledgerflow -c ledgerflow.yaml validate
//! ```
//!
//! The invocation result is printed to stdout as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledgerflow::config::PipelineConfig;
use ledgerflow::event::{ObjectNotification, StreamBatch};
use ledgerflow::pipeline::{BulkPipeline, DatabaseTarget, RelationalPipeline};
use ledgerflow_aws::{DynamoDbStore, S3ObjectStore, SecretsManagerResolver};
use ledgerflow_core::bulk::BulkWriter;
use ledgerflow_core::row_writer::RowWriter;
use ledgerflow_rdbc::postgres::PgConnectionFactory;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ledgerflow")]
#[command(version, about = "Ledger ingestion pipelines")]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "LEDGERFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a stream batch to the key-value table
    Bulk {
        /// Event file, or `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,
    },
    /// Load a transactions file into the relational table
    Relational {
        /// Event file, or `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,
    },
    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Bulk { event } => run_bulk(config, &event).await,
        Commands::Relational { event } => run_relational(config, &event).await,
        Commands::Validate => validate_config(config),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the invocation result
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read event from stdin")?;
        Ok(content)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {:?}", path))
    }
}

async fn run_bulk(config: PipelineConfig, event: &Path) -> Result<ExitCode> {
    let batch: StreamBatch =
        serde_json::from_str(&read_event(event).await?).context("Invalid stream batch")?;

    let sdk = config.aws.load().await;
    let writer = BulkWriter::new(Arc::new(DynamoDbStore::new(&sdk)))
        .with_policy(config.bulk.retry.to_policy())
        .with_chunker(config.bulk.chunker()?)
        .with_dead_letter(config.bulk.dead_letter.build());

    let pipeline = BulkPipeline::new(writer, config.bulk.table.clone());
    let response = pipeline.handle(&batch).await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(ExitCode::SUCCESS)
}

async fn run_relational(config: PipelineConfig, event: &Path) -> Result<ExitCode> {
    let notification: ObjectNotification =
        serde_json::from_str(&read_event(event).await?).context("Invalid object notification")?;

    let relational = &config.relational;
    if relational.secret_id.is_empty() {
        anyhow::bail!("relational.secret_id is not configured");
    }

    let sdk = config.aws.load().await;
    let writer = RowWriter::new(Arc::new(PgConnectionFactory), relational.table.clone())?;
    let target = DatabaseTarget::new(relational.secret_id.clone(), relational.database.clone())
        .with_port(relational.port)
        .with_connect_timeout(relational.connect_timeout_ms);

    let pipeline = RelationalPipeline::new(
        Arc::new(S3ObjectStore::new(&sdk)),
        Arc::new(SecretsManagerResolver::new(&sdk)),
        writer,
        target,
    );
    let response = pipeline.handle(&notification).await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(if response.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn validate_config(config: PipelineConfig) -> Result<ExitCode> {
    match config.validate_all() {
        Ok(()) => {
            info!(
                region = %config.aws.region,
                bulk_table = %config.bulk.table,
                batch_size = config.bulk.batch_size,
                relational_table = %config.relational.table,
                database = %config.relational.database,
                "Configuration is valid"
            );
            if config.relational.secret_id.is_empty() {
                info!("relational.secret_id is empty; the relational command will refuse to run");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Configuration is invalid");
            Ok(ExitCode::FAILURE)
        }
    }
}
