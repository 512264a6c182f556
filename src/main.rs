//! flurry: stream a CSV file into PostgreSQL or an NDJSON file.
//!
//! Rows are persisted one at a time in input order. The process stops on the
//! first row the sink rejects and reports it through the exit status.

use clap::Parser;
use snafu::prelude::*;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use flurry::config::Config;
use flurry::error::{AddressParseSnafu, ConfigSnafu, MetricsSnafu, PipelineError};
use flurry::logging::init_tracing;
use flurry::metrics;
use flurry::run_pipeline;

/// Streaming CSV ingestion tool.
#[derive(Parser, Debug)]
#[command(name = "flurry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", snafu::Report::from_error(&e));
            match &e {
                PipelineError::Persistence { row, .. } => println!("Rows persisted: {}", row - 1),
                PipelineError::Interrupted { rows } => println!("Rows persisted: {rows}"),
                _ => {}
            }
            ExitCode::from(&e)
        }
    }
}

async fn run(args: &Args) -> Result<(), PipelineError> {
    info!("flurry starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    let metrics_addr: Option<SocketAddr> = if config.metrics.enabled {
        Some(config.metrics.address.parse().context(AddressParseSnafu)?)
    } else {
        None
    };

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.path);
        info!(
            "Sink: {} ({})",
            config.sink.kind.name(),
            config.sink.kind.target()
        );
        info!("Columns: {}", config.schema.columns.join(", "));
        info!("Configuration is valid");
        return Ok(());
    }

    let metrics_server = match metrics_addr {
        Some(addr) => Some(metrics::init(addr).context(MetricsSnafu)?),
        None => None,
    };

    let result = run_pipeline(&config).await;
    if let Some(server) = metrics_server {
        server.abort();
    }
    let stats = result?;

    info!("Pipeline completed successfully");
    info!("  Chunks read: {}", stats.chunks_read);
    info!("  Bytes read: {}", stats.bytes_read);
    info!("  Rows merged: {}", stats.rows_merged);
    info!("  Blank lines skipped: {}", stats.blank_lines);
    if let Some(trailing) = &stats.trailing {
        info!(
            "  Trailing data: {} bytes at line {} (not persisted)",
            trailing.bytes, trailing.line
        );
    }
    println!("Rows persisted: {}", stats.rows_persisted);

    Ok(())
}
