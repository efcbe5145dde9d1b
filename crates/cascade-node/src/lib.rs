//! # cascade-node: settlement node with RocksDB storage and JSON-RPC.
//!
//! - [`storage::RocksStateStore`]: persistent contract state and attestations
//! - [`node::Node`]: serializes triggers against the store
//! - [`rpc`]: JSON-RPC server for external access
//! - [`config::NodeConfig`]: node configuration

pub mod config;
pub mod node;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use storage::RocksStateStore;
