//! JSON-RPC server for the Cascade node.
//!
//! Uses jsonrpsee 0.24 to expose trigger submission, read-only state queries,
//! and the attestation feed that stands in for the external attestation
//! service.

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cascade_core::contract::FeeSchedule;
use cascade_core::error::CascadeError;
use cascade_core::state::StateValue;
use cascade_core::types::{Address, Asset, Bounce, Payment, RepoId, Response, Trigger};
use cascade_core::validation::{validate_address, validate_asset, validate_repo_id};

use crate::node::Node;

/// JSON representation of a trigger outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResultJson {
    /// True if the trigger was aborted and nothing was written.
    pub bounced: bool,
    /// Bounce reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response variables of a committed trigger.
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    /// Payouts of a committed trigger, or refunds of a bounced one.
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl From<Response> for TriggerResultJson {
    fn from(response: Response) -> Self {
        Self {
            bounced: false,
            error: None,
            vars: response.vars,
            payments: response.payments,
        }
    }
}

impl From<Bounce> for TriggerResultJson {
    fn from(bounce: Bounce) -> Self {
        Self {
            bounced: true,
            error: Some(bounce.error),
            vars: BTreeMap::new(),
            payments: bounce.refunds,
        }
    }
}

/// JSON representation of one (repo, asset) pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolJson {
    pub repo: String,
    pub asset: String,
    /// Received but not yet distributed.
    pub pool: u64,
    /// Lifetime inflow.
    pub total_received: u64,
    /// Held remainder, absent until the repo first lacked an attested owner.
    #[serde(default)]
    pub unclaimed: Option<u64>,
}

/// JSON representation of node info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfoJson {
    /// Node software version.
    pub version: String,
    /// Committed triggers since the store was created.
    pub triggers: u64,
    /// Persisted state variables.
    pub state_vars: u64,
    /// Fee schedule in force.
    pub fees: FeeSchedule,
}

fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn storage_error(e: CascadeError) -> ErrorObjectOwned {
    rpc_error(-1, &e.to_string())
}

/// Parse a repo id parameter.
pub fn parse_repo(s: &str) -> Result<RepoId, ErrorObjectOwned> {
    validate_repo_id(s).map_err(|e| rpc_error(-8, &e.to_string()))
}

/// Parse an optional asset parameter; absent means the base asset.
pub fn parse_asset(s: Option<&str>) -> Result<Asset, ErrorObjectOwned> {
    match s {
        None => Ok(Asset::Base),
        Some(s) => validate_asset(s).map_err(|e| rpc_error(-8, &e.to_string())),
    }
}

fn parse_address(s: &str) -> Result<Address, ErrorObjectOwned> {
    validate_address(s).map_err(|e| rpc_error(-8, &e.to_string()))
}

/// The Cascade JSON-RPC interface.
#[rpc(server)]
pub trait CascadeRpc {
    /// Executes a trigger and returns its outcome. Bounces are not RPC errors.
    #[method(name = "submittrigger")]
    async fn submit_trigger(&self, trigger: Trigger) -> Result<TriggerResultJson, ErrorObjectOwned>;

    /// Returns one state variable by its full key, or null.
    #[method(name = "getstatevar")]
    async fn get_state_var(&self, key: String) -> Result<Option<Value>, ErrorObjectOwned>;

    /// Returns all state variables whose key starts with `prefix`.
    #[method(name = "getstatevars")]
    async fn get_state_vars(&self, prefix: String) -> Result<BTreeMap<String, Value>, ErrorObjectOwned>;

    /// Returns the pool of a repo in one asset (base if omitted).
    #[method(name = "getpool")]
    async fn get_pool(&self, repo: String, asset: Option<String>) -> Result<PoolJson, ErrorObjectOwned>;

    /// Returns the rule set of a repo in percent, or null if never set.
    #[method(name = "getrules")]
    async fn get_rules(&self, repo: String) -> Result<Option<Value>, ErrorObjectOwned>;

    /// Records `address` as the attested controller of `handle`.
    #[method(name = "attest")]
    async fn attest(&self, handle: String, address: String) -> Result<bool, ErrorObjectOwned>;

    /// Withdraws the attestation for `handle`; returns the previous address.
    #[method(name = "revoke")]
    async fn revoke(&self, handle: String) -> Result<Option<String>, ErrorObjectOwned>;

    /// Returns general node information.
    #[method(name = "getinfo")]
    async fn get_info(&self) -> Result<NodeInfoJson, ErrorObjectOwned>;
}

/// Server-side implementation of the RPC interface.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    /// Create a new RPC server implementation wrapping the given node.
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl CascadeRpcServer for RpcServerImpl {
    async fn submit_trigger(&self, trigger: Trigger) -> Result<TriggerResultJson, ErrorObjectOwned> {
        Ok(match self.node.submit_trigger(&trigger) {
            Ok(response) => response.into(),
            Err(bounce) => bounce.into(),
        })
    }

    async fn get_state_var(&self, key: String) -> Result<Option<Value>, ErrorObjectOwned> {
        self.node.get_state_var(&key).map_err(storage_error)
    }

    async fn get_state_vars(&self, prefix: String) -> Result<BTreeMap<String, Value>, ErrorObjectOwned> {
        if prefix.is_empty() {
            return Err(rpc_error(-8, "prefix must not be empty"));
        }
        self.node.get_state_vars(&prefix).map_err(storage_error)
    }

    async fn get_pool(&self, repo: String, asset: Option<String>) -> Result<PoolJson, ErrorObjectOwned> {
        let repo_id = parse_repo(&repo)?;
        let asset = parse_asset(asset.as_deref())?;
        let snap = self.node.pool(&repo_id, &asset).map_err(storage_error)?;
        Ok(PoolJson {
            repo,
            asset: asset.label().to_string(),
            pool: snap.pool,
            total_received: snap.total_received,
            unclaimed: snap.unclaimed,
        })
    }

    async fn get_rules(&self, repo: String) -> Result<Option<Value>, ErrorObjectOwned> {
        let repo_id = parse_repo(&repo)?;
        let rules = self.node.rules(&repo_id).map_err(storage_error)?;
        Ok(rules.map(|r| StateValue::Rules(r).to_json()))
    }

    async fn attest(&self, handle: String, address: String) -> Result<bool, ErrorObjectOwned> {
        if handle.is_empty() {
            return Err(rpc_error(-8, "handle must not be empty"));
        }
        let address = parse_address(&address)?;
        self.node.attest(&handle, &address).map_err(storage_error)?;
        Ok(true)
    }

    async fn revoke(&self, handle: String) -> Result<Option<String>, ErrorObjectOwned> {
        let previous = self.node.revoke(&handle).map_err(storage_error)?;
        Ok(previous.map(String::from))
    }

    async fn get_info(&self) -> Result<NodeInfoJson, ErrorObjectOwned> {
        Ok(NodeInfoJson {
            version: env!("CARGO_PKG_VERSION").to_string(),
            triggers: self.node.trigger_count().map_err(storage_error)?,
            state_vars: self.node.state_len().map_err(storage_error)?,
            fees: self.node.fees().clone(),
        })
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> Result<ServerHandle, CascadeError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| CascadeError::Storage(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(node);
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}
