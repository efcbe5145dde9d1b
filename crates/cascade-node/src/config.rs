//! Node configuration for the Cascade settlement node.
//!
//! Provides [`NodeConfig`] with defaults for data directory, RPC binding,
//! logging, and contract fees. [`NodeConfig::load`] layers an optional TOML
//! file and `CASCADE__*` environment variables over the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cascade_core::constants::DEFAULT_RPC_PORT;
use cascade_core::contract::FeeSchedule;

/// Prefix for environment overrides, e.g. `CASCADE__RPC_PORT=9000` or
/// `CASCADE__FEES__PROCESSING_FEE=5000`.
const ENV_PREFIX: &str = "CASCADE";
const ENV_SEPARATOR: &str = "__";

/// Configuration for a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "cascade_core=trace").
    pub log_level: String,
    /// Contract fee schedule.
    pub fees: FeeSchedule,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cascade");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            fees: FeeSchedule::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration: defaults, then `path` (if given), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&NodeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Path to the RocksDB state directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("statedata")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}
