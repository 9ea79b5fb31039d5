//! Relay chain governance tool.
//!
//! Usage:
//!   govtool --tool register_side_chain --conf config.json --pwallets w1.json,w2.json --ppwds p1,p2
//!   govtool --tool add_relayer --newwallet relayer.json --newpwd pwd --pwallets ... --ppwds ...
//!   govtool --list

use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use quorum_gov::action::ConsensusConfig;
use quorum_gov::adapters::{ChainAdapter, InMemoryChain, JsonRpcChain};
use quorum_gov::committee::Signer;
use quorum_gov::config::ToolConfig;
use quorum_gov::runtime::{
    execute, CommandContext, CommandKind, CommandRegistry, GovernanceOrchestrator, PlanSigners,
    Requirements, TerminalOutcome,
};
use quorum_gov::telemetry::init_tracing;
use quorum_gov::wallet::{load_committee, parse_wallet_list, WalletRef};

#[derive(Parser, Debug)]
#[command(
    name = "govtool",
    version,
    about = "Quorum-gated governance transactions for the relay chain"
)]
struct Opts {
    /// Command to run (see --list)
    #[arg(long)]
    tool: Option<String>,

    /// List available commands and exit
    #[arg(long)]
    list: bool,

    #[arg(long, default_value = "config.json")]
    conf: PathBuf,

    /// Committee wallet files, comma separated, in signing order
    #[arg(long, default_value = "")]
    pwallets: String,

    /// Committee wallet passwords, comma separated, same order as --pwallets
    #[arg(long, default_value = "")]
    ppwds: String,

    /// Wallet of the node or relayer being added, removed or acted on
    #[arg(long)]
    newwallet: Option<PathBuf>,

    #[arg(long, default_value = "")]
    newpwd: String,

    /// Side chain id
    #[arg(long)]
    id: Option<u64>,

    /// Hex-encoded genesis header for sync_genesis_header
    #[arg(long)]
    header: Option<String>,

    #[arg(long, default_value_t = 5000)]
    block_msg_delay: u32,

    #[arg(long, default_value_t = 5000)]
    hash_msg_delay: u32,

    #[arg(long, default_value_t = 10)]
    peer_handshake_timeout: u32,

    #[arg(long, default_value_t = 10000)]
    max_block_change_view: u32,

    /// Run against an in-process chain instead of the configured node
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let opts = Opts::parse();
    init_tracing(opts.verbose)?;

    let registry = CommandRegistry::standard();
    let tool = match (&opts.tool, opts.list) {
        (Some(tool), false) => tool.clone(),
        _ => {
            for spec in registry.iter() {
                println!("{:<22} {}", spec.name, spec.about);
            }
            return Ok(ExitCode::SUCCESS);
        }
    };
    let spec = *registry.get(&tool)?;

    let config = if opts.conf.exists() {
        ToolConfig::load(&opts.conf)?
    } else if opts.dry_run {
        warn!(path = %opts.conf.display(), "no configuration file, using defaults");
        ToolConfig::from_json("{}")?
    } else {
        return Err(anyhow!("configuration file {} not found", opts.conf.display()));
    };

    let signers = load_signers(&opts, &config, spec.requires)?;
    let ctx = CommandContext {
        side_chains: config.side_chains.clone(),
        operator_address: signers.operator.as_ref().map(|s| s.address().to_string()),
        target_address: signers.target.as_ref().map(|s| s.address().to_string()),
        target_public_key: signers.target.as_ref().map(|s| hex::encode(s.public_key())),
        chain_id: opts.id,
        header: opts.header.clone(),
        consensus: ConsensusConfig {
            block_msg_delay: opts.block_msg_delay,
            hash_msg_delay: opts.hash_msg_delay,
            peer_handshake_timeout: opts.peer_handshake_timeout,
            max_block_change_view: opts.max_block_change_view,
        },
    };

    let adapter: Arc<dyn ChainAdapter> = if opts.dry_run {
        info!(chain = %config.chain_name, "dry run against in-memory chain");
        Arc::new(InMemoryChain::new(config.chain_name.clone()))
    } else {
        Arc::new(JsonRpcChain::new(
            config.rpc_address.clone(),
            config.chain_name.clone(),
            config.rpc_timeout(),
        )?)
    };

    match spec.kind {
        CommandKind::Query(build) => {
            let query = build(&ctx)?;
            match adapter.query_storage(query.contract, &query.key).await? {
                Some(raw) => println!("{}: {}", query.description, hex::encode(raw)),
                None => println!("no {} found", query.description),
            }
            Ok(ExitCode::SUCCESS)
        }
        CommandKind::Governance(build) => {
            let plan = build(&ctx)?;

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, abandoning confirmation wait");
                    let _ = cancel_tx.send(true);
                }
            });

            let orchestrator = GovernanceOrchestrator::new(adapter)
                .with_classifier(config.classifier())
                .with_waiter(config.waiter())
                .confirm_each_submission(config.wait.confirm_each_submission)
                .with_cancellation(cancel_rx);

            let report = execute(&orchestrator, &plan, &signers).await?;
            for step in &report.steps {
                let kind = step.action.kind();
                let target = step.action.target();
                match &step.outcome {
                    TerminalOutcome::Finalized(c) => println!(
                        "{} {}: finalized at height {} ({})",
                        kind, target, c.finalized_at, c.tx_hash
                    ),
                    TerminalOutcome::AlreadyApplied(reason) => {
                        println!("{} {}: already applied ({})", kind, target, reason)
                    }
                    TerminalOutcome::AlreadyPending(reason) => {
                        println!("{} {}: already pending ({})", kind, target, reason)
                    }
                    TerminalOutcome::Fatal(failure) => {
                        eprintln!("{} {}: {}", kind, target, failure);
                        if failure.is_outstanding() {
                            eprintln!(
                                "  the transaction may still finalize; check it before resubmitting"
                            );
                        }
                    }
                }
            }
            if report.skipped > 0 {
                eprintln!("{} step(s) not attempted", report.skipped);
            }
            Ok(if report.has_fatal() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
    }
}

fn load_signers(
    opts: &Opts,
    config: &ToolConfig,
    requires: Requirements,
) -> anyhow::Result<PlanSigners> {
    let mut signers = PlanSigners::default();

    if requires.operator {
        let wallet = config
            .operator_wallet()
            .ok_or_else(|| {
                anyhow!("operator_wallet is not configured in {}", opts.conf.display())
            })?;
        let signer = wallet.unlock().with_context(|| {
            format!("failed to unlock operator wallet {}", wallet.path.display())
        })?;
        signers.operator = Some(Arc::new(signer) as Arc<dyn Signer>);
    }

    if requires.target {
        let path = opts
            .newwallet
            .clone()
            .ok_or_else(|| anyhow!("--newwallet is required"))?;
        let wallet = WalletRef::new(path, opts.newpwd.clone());
        let signer = wallet
            .unlock()
            .with_context(|| format!("failed to get new account from {}", wallet.path.display()))?;
        signers.target = Some(Arc::new(signer) as Arc<dyn Signer>);
    }

    if requires.committee {
        let wallets = parse_wallet_list(&opts.pwallets, &opts.ppwds)?;
        let committee = load_committee(&wallets)?;
        info!(members = committee.len(), threshold = committee.threshold()?, "committee loaded");
        signers.committee = Some(committee);
    }

    Ok(signers)
}
