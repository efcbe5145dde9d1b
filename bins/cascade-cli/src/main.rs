//! cascade-cli: command-line client for a Cascade node.
//!
//! Submits triggers on behalf of an address and queries contract state over
//! JSON-RPC.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde_json::{json, Value};

use cascade_core::constants::{
    DEFAULT_DONATION_STORAGE_FEE, DEFAULT_PROCESSING_FEE, DEFAULT_RPC_PORT, DEFAULT_RULES_STORAGE_FEE,
};
use cascade_core::types::{Address, Amount, AssetPayment, Trigger};
use cascade_core::validation::{validate_address, validate_asset, validate_repo_id};

/// Cascade command-line client.
#[derive(Parser)]
#[command(name = "cascade-cli")]
#[command(version, about = "Donate to repos and settle their cascades.")]
struct Cli {
    /// RPC endpoint URL.
    #[arg(short, long, global = true, default_value_t = default_endpoint())]
    rpc_endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

fn default_endpoint() -> String {
    format!("http://127.0.0.1:{DEFAULT_RPC_PORT}")
}

#[derive(Subcommand)]
enum Commands {
    /// Donate to a repo.
    Donate(DonateArgs),
    /// Replace the forwarding rules of a repo you own.
    SetRules(SetRulesArgs),
    /// Flush a repo's pool to its rule targets and owner.
    Distribute(DistributeArgs),
    /// Set your nickname.
    Nickname(NicknameArgs),
    /// Show a repo's pool.
    Pool(PoolArgs),
    /// Show a repo's rules.
    Rules(RepoArgs),
    /// Read raw state variables.
    State(StateArgs),
    /// Record or revoke an attestation (stands in for the attestation service).
    Attest(AttestArgs),
    /// Show node information.
    Info,
}

#[derive(Args)]
struct DonateArgs {
    /// Sending address.
    #[arg(short, long)]
    from: String,

    /// Repo to donate to (owner/name).
    #[arg(long)]
    repo: String,

    /// Amount to donate. For the base asset this is the whole native
    /// attachment, storage fee included.
    #[arg(short, long)]
    amount: Amount,

    /// Non-native asset to donate.
    #[arg(long)]
    asset: Option<String>,

    /// Native attachment covering fees for a non-native donation.
    #[arg(long, default_value_t = DEFAULT_PROCESSING_FEE + DEFAULT_DONATION_STORAGE_FEE)]
    fee: Amount,
}

#[derive(Args)]
struct SetRulesArgs {
    /// Sending address; must be the repo owner's attested address.
    #[arg(short, long)]
    from: String,

    /// Repo whose rules to set.
    #[arg(long)]
    repo: String,

    /// Rules as a JSON object, e.g. '{"bob/lib": 10}'. Omit for no rules.
    #[arg(long)]
    rules: Option<String>,

    /// Native attachment.
    #[arg(long, default_value_t = DEFAULT_PROCESSING_FEE + DEFAULT_RULES_STORAGE_FEE)]
    fee: Amount,
}

#[derive(Args)]
struct DistributeArgs {
    /// Sending address.
    #[arg(short, long)]
    from: String,

    /// Repo to distribute.
    #[arg(long)]
    repo: String,

    /// Asset to distribute (default: base).
    #[arg(long)]
    asset: Option<String>,

    /// Pay the remainder to this address instead of the attested owner.
    #[arg(long)]
    to: Option<String>,

    /// Native attachment.
    #[arg(long, default_value_t = DEFAULT_PROCESSING_FEE)]
    fee: Amount,
}

#[derive(Args)]
struct NicknameArgs {
    /// Sending address.
    #[arg(short, long)]
    from: String,

    /// Nickname to take.
    name: String,

    /// Native attachment.
    #[arg(long, default_value_t = DEFAULT_PROCESSING_FEE)]
    fee: Amount,
}

#[derive(Args)]
struct PoolArgs {
    /// Repo to inspect.
    #[arg(long)]
    repo: String,

    /// Asset (default: base).
    #[arg(long)]
    asset: Option<String>,
}

#[derive(Args)]
struct RepoArgs {
    /// Repo to inspect.
    #[arg(long)]
    repo: String,
}

#[derive(Args)]
struct StateArgs {
    /// Full state key, e.g. 'alice/app*pool*base'.
    #[arg(long, conflicts_with = "prefix", required_unless_present = "prefix")]
    key: Option<String>,

    /// Key prefix, e.g. 'alice/app*'.
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Args)]
struct AttestArgs {
    /// Account handle (the owner segment of repo ids).
    handle: String,

    /// Address controlling the handle.
    #[arg(long, required_unless_present = "revoke")]
    address: Option<String>,

    /// Withdraw the attestation instead.
    #[arg(long, conflicts_with = "address")]
    revoke: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default()
        .build(&cli.rpc_endpoint)
        .context("Failed to connect to RPC")?;

    match cli.command {
        Commands::Donate(args) => submit(&client, donate_trigger(&args)?).await,
        Commands::SetRules(args) => submit(&client, set_rules_trigger(&args)?).await,
        Commands::Distribute(args) => submit(&client, distribute_trigger(&args)?).await,
        Commands::Nickname(args) => submit(&client, nickname_trigger(&args)?).await,
        Commands::Pool(args) => {
            let mut params = ArrayParams::new();
            params.insert(args.repo).context("encode repo")?;
            if let Some(asset) = args.asset {
                params.insert(asset).context("encode asset")?;
            }
            query(&client, "getpool", params).await
        }
        Commands::Rules(args) => {
            let mut params = ArrayParams::new();
            params.insert(args.repo).context("encode repo")?;
            query(&client, "getrules", params).await
        }
        Commands::State(args) => {
            let mut params = ArrayParams::new();
            match (args.key, args.prefix) {
                (Some(key), _) => {
                    params.insert(key).context("encode key")?;
                    query(&client, "getstatevar", params).await
                }
                (None, Some(prefix)) => {
                    params.insert(prefix).context("encode prefix")?;
                    query(&client, "getstatevars", params).await
                }
                (None, None) => bail!("either --key or --prefix is required"),
            }
        }
        Commands::Attest(args) => {
            let mut params = ArrayParams::new();
            params.insert(args.handle).context("encode handle")?;
            if args.revoke {
                query(&client, "revoke", params).await
            } else {
                let address = args.address.context("--address is required")?;
                params.insert(address).context("encode address")?;
                query(&client, "attest", params).await
            }
        }
        Commands::Info => query(&client, "getinfo", ArrayParams::new()).await,
    }
}

// ---------------------------------------------------------------------------
// Trigger construction
// ---------------------------------------------------------------------------

fn address(s: &str) -> Result<Address> {
    validate_address(s).with_context(|| format!("bad --from address {s:?}"))
}

fn check_repo(s: &str) -> Result<()> {
    validate_repo_id(s).with_context(|| format!("bad repo {s:?}"))?;
    Ok(())
}

fn donate_trigger(args: &DonateArgs) -> Result<Trigger> {
    check_repo(&args.repo)?;
    let (base_amount, payment) = match &args.asset {
        Some(label) => {
            let asset = validate_asset(label).with_context(|| format!("bad asset {label:?}"))?;
            if asset.is_base() {
                (args.amount, None)
            } else {
                (args.fee, Some(AssetPayment { asset, amount: args.amount }))
            }
        }
        None => (args.amount, None),
    };
    Ok(Trigger {
        address: address(&args.from)?,
        base_amount,
        payment,
        data: json!({"donate": 1, "repo": args.repo}),
    })
}

fn set_rules_trigger(args: &SetRulesArgs) -> Result<Trigger> {
    check_repo(&args.repo)?;
    let mut data = json!({"set_rules": 1, "repo": args.repo});
    if let Some(raw) = &args.rules {
        let rules: Value = serde_json::from_str(raw).context("--rules is not valid JSON")?;
        data["rules"] = rules;
    }
    Ok(Trigger {
        address: address(&args.from)?,
        base_amount: args.fee,
        payment: None,
        data,
    })
}

fn distribute_trigger(args: &DistributeArgs) -> Result<Trigger> {
    check_repo(&args.repo)?;
    let mut data = json!({"distribute": 1, "repo": args.repo});
    if let Some(asset) = &args.asset {
        data["asset"] = json!(asset);
    }
    if let Some(to) = &args.to {
        data["to"] = json!(to);
    }
    Ok(Trigger {
        address: address(&args.from)?,
        base_amount: args.fee,
        payment: None,
        data,
    })
}

fn nickname_trigger(args: &NicknameArgs) -> Result<Trigger> {
    Ok(Trigger {
        address: address(&args.from)?,
        base_amount: args.fee,
        payment: None,
        data: json!({"nickname": args.name}),
    })
}

// ---------------------------------------------------------------------------
// RPC helpers
// ---------------------------------------------------------------------------

async fn submit(client: &HttpClient, trigger: Trigger) -> Result<()> {
    let mut params = ArrayParams::new();
    params.insert(&trigger).context("encode trigger")?;

    let result: Value = client
        .request("submittrigger", params)
        .await
        .context("RPC submittrigger failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result["bounced"].as_bool().unwrap_or(false) {
        bail!(
            "trigger bounced: {}",
            result["error"].as_str().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn query(client: &HttpClient, method: &str, params: ArrayParams) -> Result<()> {
    let result: Value = client
        .request(method, params)
        .await
        .with_context(|| format!("RPC {method} failed"))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::types::Asset;

    #[test]
    fn base_donation_attaches_amount() {
        let args = DonateArgs {
            from: "DONOR".into(),
            repo: "alice/app".into(),
            amount: 50_000,
            asset: None,
            fee: 11_000,
        };
        let t = donate_trigger(&args).unwrap();
        assert_eq!(t.base_amount, 50_000);
        assert!(t.payment.is_none());
        assert_eq!(t.data, json!({"donate": 1, "repo": "alice/app"}));
    }

    #[test]
    fn custom_donation_attaches_fee_separately() {
        let args = DonateArgs {
            from: "DONOR".into(),
            repo: "alice/app".into(),
            amount: 7,
            asset: Some("TOKEN".into()),
            fee: 11_000,
        };
        let t = donate_trigger(&args).unwrap();
        assert_eq!(t.base_amount, 11_000);
        assert_eq!(t.payment, Some(AssetPayment { asset: Asset::Custom("TOKEN".into()), amount: 7 }));
    }

    #[test]
    fn bad_repo_rejected_locally() {
        let args = DistributeArgs {
            from: "X".into(),
            repo: "wrongname".into(),
            asset: None,
            to: None,
            fee: 10_000,
        };
        assert!(distribute_trigger(&args).is_err());
    }

    #[test]
    fn set_rules_embeds_parsed_rules() {
        let args = SetRulesArgs {
            from: "ALICE".into(),
            repo: "alice/app".into(),
            rules: Some(r#"{"bob/lib": 10}"#.into()),
            fee: 11_000,
        };
        let t = set_rules_trigger(&args).unwrap();
        assert_eq!(t.data["rules"], json!({"bob/lib": 10}));

        let args = SetRulesArgs { rules: Some("{not json".into()), ..args };
        assert!(set_rules_trigger(&args).is_err());
    }

    #[test]
    fn distribute_includes_optional_fields() {
        let args = DistributeArgs {
            from: "X".into(),
            repo: "alice/app".into(),
            asset: Some("TOKEN".into()),
            to: Some("ELSE".into()),
            fee: 10_000,
        };
        let t = distribute_trigger(&args).unwrap();
        assert_eq!(
            t.data,
            json!({"distribute": 1, "repo": "alice/app", "asset": "TOKEN", "to": "ELSE"})
        );
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "cascade-cli", "donate", "--from", "D", "--repo", "a/b", "--amount", "100",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Donate(_)));
        assert_eq!(cli.rpc_endpoint, default_endpoint());

        let cli = Cli::try_parse_from(["cascade-cli", "attest", "alice", "--revoke"]).unwrap();
        assert!(matches!(cli.command, Commands::Attest(AttestArgs { revoke: true, .. })));
    }
}
