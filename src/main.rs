//! keepscan - scan a block-storage fleet and report replication levels.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keepscan::{FleetClient, FleetConfig, FleetScanner, HttpDirectory, TracingSink};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Scan every storage node and report block replication levels
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the directory API service
    #[arg(long, env = "API_URL")]
    api_url: String,

    /// Bearer token for directory and node requests
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// Maximum number of storage nodes to request from the directory
    #[arg(long, env = "NODE_LIMIT")]
    node_limit: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value = "30")]
    request_timeout_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting fleet scan");
    info!("  Directory API: {}", args.api_url);
    if let Some(limit) = args.node_limit {
        info!("  Node limit: {}", limit);
    }

    let client = FleetClient::new(FleetConfig {
        api_token: args.api_token.clone(),
        request_timeout: Duration::from_secs(args.request_timeout_seconds),
    })
    .context("building fleet client")?;

    let directory = HttpDirectory::new(&args.api_url, client.clone());
    let scanner = FleetScanner::with_sink(client, Arc::new(TracingSink));

    let (snapshot, histogram) = scanner
        .scan_and_summarize(&directory, args.node_limit)
        .await
        .context("fleet scan failed")?;

    info!("Scanned {} storage nodes", snapshot.nodes.len());
    info!("Distinct blocks stored: {}", snapshot.distinct_blocks());
    info!("Replication level distribution: {}", histogram);

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
