//! Command registry.
//!
//! Maps a command name to the plan (or storage read) it performs and the
//! identities it needs. Dispatch is a table lookup; adding a command is adding
//! an entry.

use std::collections::BTreeMap;

use crate::action::{
    ConsensusConfig, GovernanceAction, SideChainSpec, NODE_MANAGER, RELAYER_MANAGER,
    SIDE_CHAIN_MANAGER,
};
use crate::error::{GovernanceError, Result};
use crate::runtime::plan::{Initiator, Plan, Step};
use crate::utils::decode_hex;

/// Storage key prefixes of the native contracts.
pub const KEY_SIDE_CHAIN: &[u8] = b"sideChain";
pub const KEY_RELAYER: &[u8] = b"relayer";
pub const KEY_VBFT_CONFIG: &[u8] = b"vbftConfig";
pub const KEY_GOVERNANCE_VIEW: &[u8] = b"governanceView";

/// Inputs a command draws its parameters from.
#[derive(Clone, Debug, Default)]
pub struct CommandContext {
    /// Side chains listed in the configuration
    pub side_chains: Vec<SideChainSpec>,
    pub operator_address: Option<String>,
    /// Address and hex public key of the `--newwallet` identity
    pub target_address: Option<String>,
    pub target_public_key: Option<String>,
    /// `--id`
    pub chain_id: Option<u64>,
    /// `--header`, hex-encoded
    pub header: Option<String>,
    pub consensus: ConsensusConfig,
}

impl CommandContext {
    fn chain_id(&self) -> Result<u64> {
        self.chain_id.ok_or_else(|| GovernanceError::Config { reason: "--id is required".into() })
    }

    fn target_public_key(&self) -> Result<String> {
        self.target_public_key
            .clone()
            .ok_or_else(|| GovernanceError::Config { reason: "--newwallet is required".into() })
    }

    fn target_address(&self) -> Result<String> {
        self.target_address
            .clone()
            .ok_or_else(|| GovernanceError::Config { reason: "--newwallet is required".into() })
    }

    /// Configured side chain selected by `--id`, stamped with the operator address.
    fn side_chain(&self) -> Result<SideChainSpec> {
        let id = self.chain_id()?;
        let spec = self
            .side_chains
            .iter()
            .find(|s| s.chain_id == id)
            .ok_or_else(|| GovernanceError::Config {
                reason: format!("side chain {} is not configured", id),
            })?;
        Ok(self.stamped(spec))
    }

    fn stamped(&self, spec: &SideChainSpec) -> SideChainSpec {
        let mut spec = spec.clone();
        if spec.address.is_empty() {
            spec.address = self.operator_address.clone().unwrap_or_default();
        }
        spec
    }
}

/// A raw storage read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageQuery {
    pub contract: &'static str,
    pub key: Vec<u8>,
    pub description: String,
}

/// Identities a command needs before it can run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Requirements {
    pub operator: bool,
    pub target: bool,
    pub committee: bool,
}

impl Requirements {
    const NONE: Self = Self { operator: false, target: false, committee: false };
    const OPERATOR_COMMITTEE: Self = Self { operator: true, target: false, committee: true };
    const TARGET: Self = Self { operator: false, target: true, committee: false };
    const TARGET_COMMITTEE: Self = Self { operator: false, target: true, committee: true };
    const OPERATOR_TARGET_COMMITTEE: Self = Self { operator: true, target: true, committee: true };
    const COMMITTEE: Self = Self { operator: false, target: false, committee: true };
}

pub type PlanFn = fn(&CommandContext) -> Result<Plan>;
pub type QueryFn = fn(&CommandContext) -> Result<StorageQuery>;

#[derive(Copy, Clone)]
pub enum CommandKind {
    Governance(PlanFn),
    Query(QueryFn),
}

#[derive(Copy, Clone)]
pub struct CommandSpec {
    pub name: &'static str,
    pub about: &'static str,
    pub requires: Requirements,
    pub kind: CommandKind,
}

impl core::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish()
    }
}

pub struct CommandRegistry {
    commands: BTreeMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self { commands: BTreeMap::new() }
    }

    /// Registry with every built-in command.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for spec in STANDARD_COMMANDS {
            registry.register(*spec);
        }
        registry
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Result<&CommandSpec> {
        self.commands
            .get(name)
            .ok_or_else(|| GovernanceError::UnknownCommand(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }
}

const STANDARD_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "register_side_chain",
        about: "register every configured side chain and approve each with the committee",
        requires: Requirements::OPERATOR_COMMITTEE,
        kind: CommandKind::Governance(register_side_chains),
    },
    CommandSpec {
        name: "update_side_chain",
        about: "update the configured side chain selected by --id",
        requires: Requirements::OPERATOR_COMMITTEE,
        kind: CommandKind::Governance(update_side_chain),
    },
    CommandSpec {
        name: "quit_side_chain",
        about: "remove side chain --id",
        requires: Requirements::OPERATOR_COMMITTEE,
        kind: CommandKind::Governance(quit_side_chain),
    },
    CommandSpec {
        name: "sync_genesis_header",
        about: "store the genesis header (--header) of side chain --id",
        requires: Requirements::COMMITTEE,
        kind: CommandKind::Governance(sync_genesis_header),
    },
    CommandSpec {
        name: "add_node",
        about: "register --newwallet as candidate, approve it and commit the new view",
        requires: Requirements::TARGET_COMMITTEE,
        kind: CommandKind::Governance(add_node),
    },
    CommandSpec {
        name: "reg_node",
        about: "register --newwallet as candidate without approvals",
        requires: Requirements::TARGET,
        kind: CommandKind::Governance(reg_node),
    },
    CommandSpec {
        name: "unreg_node",
        about: "withdraw the candidate registration of --newwallet",
        requires: Requirements::TARGET,
        kind: CommandKind::Governance(unreg_node),
    },
    CommandSpec {
        name: "black_node",
        about: "blacklist the node of --newwallet",
        requires: Requirements::TARGET_COMMITTEE,
        kind: CommandKind::Governance(black_node),
    },
    CommandSpec {
        name: "white_node",
        about: "whitelist the node of --newwallet",
        requires: Requirements::TARGET_COMMITTEE,
        kind: CommandKind::Governance(white_node),
    },
    CommandSpec {
        name: "quit_node",
        about: "make the node of --newwallet quit and commit the new view",
        requires: Requirements::TARGET_COMMITTEE,
        kind: CommandKind::Governance(quit_node),
    },
    CommandSpec {
        name: "add_relayer",
        about: "register --newwallet as relayer and approve it with the committee",
        requires: Requirements::OPERATOR_TARGET_COMMITTEE,
        kind: CommandKind::Governance(add_relayer),
    },
    CommandSpec {
        name: "remove_relayer",
        about: "remove relayer --newwallet and approve the removal with the committee",
        requires: Requirements::TARGET_COMMITTEE,
        kind: CommandKind::Governance(remove_relayer),
    },
    CommandSpec {
        name: "update_config",
        about: "update the consensus configuration",
        requires: Requirements::COMMITTEE,
        kind: CommandKind::Governance(update_config),
    },
    CommandSpec {
        name: "commit_dpos",
        about: "commit the pending consensus view",
        requires: Requirements::COMMITTEE,
        kind: CommandKind::Governance(commit_dpos),
    },
    CommandSpec {
        name: "get_side_chain",
        about: "read the side chain record of --id",
        requires: Requirements::NONE,
        kind: CommandKind::Query(get_side_chain),
    },
    CommandSpec {
        name: "get_relayer",
        about: "read the relayer record of --newwallet",
        requires: Requirements::TARGET,
        kind: CommandKind::Query(get_relayer),
    },
    CommandSpec {
        name: "get_config",
        about: "read the consensus configuration",
        requires: Requirements::NONE,
        kind: CommandKind::Query(get_config),
    },
    CommandSpec {
        name: "get_consensus",
        about: "read the current governance view",
        requires: Requirements::NONE,
        kind: CommandKind::Query(get_consensus),
    },
];

fn register_side_chains(ctx: &CommandContext) -> Result<Plan> {
    if ctx.side_chains.is_empty() {
        return Err(GovernanceError::Config { reason: "no side chains configured".into() });
    }
    let steps = ctx
        .side_chains
        .iter()
        .map(|spec| {
            Step::full(GovernanceAction::RegisterSideChain(ctx.stamped(spec)), Initiator::Operator)
        })
        .collect();
    Ok(Plan::independent(steps))
}

fn update_side_chain(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::UpdateSideChain(ctx.side_chain()?),
        Initiator::Operator,
    )))
}

fn quit_side_chain(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::QuitSideChain { chain_id: ctx.chain_id()? },
        Initiator::Operator,
    )))
}

fn sync_genesis_header(ctx: &CommandContext) -> Result<Plan> {
    let header = ctx
        .header
        .clone()
        .ok_or_else(|| GovernanceError::Config { reason: "--header is required".into() })?;
    // reject garbage before the committee signs it
    decode_hex(&header)?;
    Ok(Plan::single(Step::full(
        GovernanceAction::SyncGenesisHeader { chain_id: ctx.chain_id()?, header },
        Initiator::Committee,
    )))
}

fn add_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::halting(vec![
        Step::full(
            GovernanceAction::RegisterCandidate { peer_pubkey: ctx.target_public_key()? },
            Initiator::Target,
        ),
        Step::full(GovernanceAction::CommitDpos, Initiator::Committee),
    ]))
}

fn reg_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::propose_only(
        GovernanceAction::RegisterCandidate { peer_pubkey: ctx.target_public_key()? },
        Initiator::Target,
    )))
}

fn unreg_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::UnregisterCandidate { peer_pubkey: ctx.target_public_key()? },
        Initiator::Target,
    )))
}

fn black_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::BlackNode { peer_pubkeys: vec![ctx.target_public_key()?] },
        Initiator::Committee,
    )))
}

fn white_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::WhiteNode { peer_pubkey: ctx.target_public_key()? },
        Initiator::Committee,
    )))
}

fn quit_node(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::halting(vec![
        Step::full(
            GovernanceAction::QuitNode { peer_pubkey: ctx.target_public_key()? },
            Initiator::Target,
        ),
        Step::full(GovernanceAction::CommitDpos, Initiator::Committee),
    ]))
}

fn add_relayer(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::RegisterRelayer { addresses: vec![ctx.target_address()?] },
        Initiator::Operator,
    )))
}

fn remove_relayer(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::RemoveRelayer { addresses: vec![ctx.target_address()?] },
        Initiator::Target,
    )))
}

fn update_config(ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(
        GovernanceAction::UpdateConfig(ctx.consensus),
        Initiator::Committee,
    )))
}

fn commit_dpos(_ctx: &CommandContext) -> Result<Plan> {
    Ok(Plan::single(Step::full(GovernanceAction::CommitDpos, Initiator::Committee)))
}

fn get_side_chain(ctx: &CommandContext) -> Result<StorageQuery> {
    let id = ctx.chain_id()?;
    let mut key = KEY_SIDE_CHAIN.to_vec();
    key.extend_from_slice(&id.to_le_bytes());
    Ok(StorageQuery {
        contract: SIDE_CHAIN_MANAGER,
        key,
        description: format!("side chain {}", id),
    })
}

fn get_relayer(ctx: &CommandContext) -> Result<StorageQuery> {
    let address = ctx.target_address()?;
    let mut key = KEY_RELAYER.to_vec();
    key.extend_from_slice(&decode_hex(&address)?);
    Ok(StorageQuery { contract: RELAYER_MANAGER, key, description: format!("relayer {}", address) })
}

fn get_config(_ctx: &CommandContext) -> Result<StorageQuery> {
    Ok(StorageQuery {
        contract: NODE_MANAGER,
        key: KEY_VBFT_CONFIG.to_vec(),
        description: "consensus config".into(),
    })
}

fn get_consensus(_ctx: &CommandContext) -> Result<StorageQuery> {
    Ok(StorageQuery {
        contract: NODE_MANAGER,
        key: KEY_GOVERNANCE_VIEW.to_vec(),
        description: "governance view".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::plan::{OnFatal, StepMode};

    fn ctx() -> CommandContext {
        CommandContext {
            side_chains: vec![
                SideChainSpec {
                    address: String::new(),
                    chain_id: 1,
                    router: 1,
                    name: "btc".into(),
                    blocks_to_wait: 1,
                    ccm_contract: String::new(),
                },
                SideChainSpec {
                    address: String::new(),
                    chain_id: 2,
                    router: 2,
                    name: "eth".into(),
                    blocks_to_wait: 12,
                    ccm_contract: "ab".into(),
                },
            ],
            operator_address: Some("0a0b".into()),
            target_address: Some("0c0d".into()),
            target_public_key: Some("02ff".into()),
            ..Default::default()
        }
    }

    fn plan(name: &str, ctx: &CommandContext) -> Result<Plan> {
        match CommandRegistry::standard().get(name)?.kind {
            CommandKind::Governance(build) => build(ctx),
            CommandKind::Query(_) => panic!("{} is a query", name),
        }
    }

    #[test]
    fn test_unknown_command() {
        let registry = CommandRegistry::standard();
        assert!(matches!(registry.get("poly_fly"), Err(GovernanceError::UnknownCommand(_))));
    }

    #[test]
    fn test_register_side_chain_continues_across_chains() {
        let plan = plan("register_side_chain", &ctx()).unwrap();
        assert_eq!(plan.on_fatal, OnFatal::Continue);
        assert_eq!(plan.steps.len(), 2);
        match &plan.steps[1].action {
            GovernanceAction::RegisterSideChain(spec) => {
                assert_eq!(spec.chain_id, 2);
                assert_eq!(spec.address, "0a0b");
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_add_node_halts_before_commit() {
        let plan = plan("add_node", &ctx()).unwrap();
        assert_eq!(plan.on_fatal, OnFatal::Halt);
        let register = GovernanceAction::RegisterCandidate { peer_pubkey: "02ff".into() };
        assert_eq!(plan.steps[0].action, register);
        assert_eq!(plan.steps[1].action, GovernanceAction::CommitDpos);
    }

    #[test]
    fn test_reg_node_is_propose_only() {
        let plan = plan("reg_node", &ctx()).unwrap();
        assert_eq!(plan.steps[0].mode, StepMode::ProposeOnly);
    }

    #[test]
    fn test_missing_id() {
        let err = plan("quit_side_chain", &ctx()).unwrap_err();
        assert!(err.to_string().contains("--id"));
        let mut with_id = ctx();
        with_id.chain_id = Some(9);
        assert!(matches!(
            plan("update_side_chain", &with_id),
            Err(GovernanceError::Config { .. })
        ));
    }

    #[test]
    fn test_side_chain_storage_key() {
        let mut c = ctx();
        c.chain_id = Some(2);
        let query = match CommandRegistry::standard().get("get_side_chain").unwrap().kind {
            CommandKind::Query(q) => q(&c).unwrap(),
            CommandKind::Governance(_) => panic!("get_side_chain is a query"),
        };
        assert_eq!(query.contract, SIDE_CHAIN_MANAGER);
        assert_eq!(&query.key[..9], b"sideChain");
        assert_eq!(&query.key[9..], &2u64.to_le_bytes());
    }

    #[test]
    fn test_every_command_listed() {
        let names: Vec<&str> = CommandRegistry::standard().iter().map(|c| c.name).collect();
        assert_eq!(names.len(), STANDARD_COMMANDS.len());
        assert!(names.contains(&"commit_dpos"));
        assert!(names.contains(&"get_consensus"));
    }
}
