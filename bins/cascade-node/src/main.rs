//! Cascade settlement node binary.
//!
//! Opens the RocksDB state store, starts the JSON-RPC server, and executes
//! submitted triggers until interrupted.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use cascade_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::{error, info};

/// Cascade settlement node.
#[derive(Parser, Debug)]
#[command(
    name = "cascade-node",
    version,
    about = "Cascade settlement node with RocksDB storage and JSON-RPC server"
)]
struct Args {
    /// TOML config file; `CASCADE__*` environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for contract state
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Apply CLI overrides on top of the loaded config.
    fn apply(self, mut config: NodeConfig) -> (NodeConfig, String) {
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(rpc_bind) = self.rpc_bind {
            config.rpc_bind = rpc_bind;
        }
        if let Some(rpc_port) = self.rpc_port {
            config.rpc_port = rpc_port;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        (config, self.log_format)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let loaded = match NodeConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            process::exit(1);
        }
    };
    let (config, log_format) = args.apply(loaded);

    init_logging(&config.log_level, &log_format);

    info!("Cascade Node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());
    info!(
        processing_fee = config.fees.processing_fee,
        donation_storage_fee = config.fees.donation_storage_fee,
        rules_storage_fee = config.fees.rules_storage_fee,
        "fee schedule"
    );

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    let node = match Node::new(config.clone()) {
        Ok(n) => n,
        Err(e) => {
            error!("failed to start node: {}", e);
            process::exit(1);
        }
    };

    match (node.trigger_count(), node.state_len()) {
        (Ok(count), Ok(rows)) => info!(triggers = count, state_vars = rows, "state loaded"),
        (Err(e), _) | (_, Err(e)) => error!("failed to read state metadata: {}", e),
    }

    let rpc_handle = match start_rpc_server(&config.rpc_addr(), node.clone()).await {
        Ok(handle) => {
            info!("RPC server listening on {}", config.rpc_addr());
            handle
        }
        Err(e) => {
            error!("failed to start RPC server: {}", e);
            process::exit(1);
        }
    };

    info!("Cascade node running (Ctrl+C to stop)");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("received Ctrl+C, shutting down..."),
                Err(e) => error!("failed to listen for Ctrl+C: {}", e),
            }
        }
        _ = rpc_handle.clone().stopped() => {
            info!("RPC server exited");
        }
    }

    rpc_handle.stop().ok();
    info!("RPC server stopped");

    if let Err(e) = node.flush() {
        error!("failed to flush state: {}", e);
    }
    info!("Cascade node shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
