//! Governance actions and their protocol shape.
//!
//! Every command of the tool reduces to one or more `GovernanceAction`s. The action
//! knows which native contract method it targets, which approval (if any) the committee
//! submits for it, and whether its handle id has to be recovered from the event log.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, Result};
use crate::types::TxPayload;

/// Native contract owning side-chain records.
pub const SIDE_CHAIN_MANAGER: &str = "side_chain_manager";
/// Native contract owning the relayer set.
pub const RELAYER_MANAGER: &str = "relayer_manager";
/// Native contract owning consensus nodes and the consensus config.
pub const NODE_MANAGER: &str = "node_manager";
/// Native contract storing side-chain genesis headers.
pub const HEADER_SYNC: &str = "header_sync";

/// Event carrying the application id of a relayer registration.
pub const EVENT_RELAYER_APPLY: &str = "putRelayerApply";
/// Event carrying the application id of a relayer removal.
pub const EVENT_RELAYER_REMOVE: &str = "putRelayerRemove";

/// Side-chain record submitted for registration or update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideChainSpec {
    /// Address of the proposing operator
    #[serde(default)]
    pub address: String,
    pub chain_id: u64,
    /// Router type id on the relay chain
    pub router: u64,
    pub name: String,
    pub blocks_to_wait: u64,
    /// Hex-encoded cross-chain manager contract or chain-specific extra data
    #[serde(default)]
    pub ccm_contract: String,
}

/// Consensus engine configuration fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub block_msg_delay: u32,
    pub hash_msg_delay: u32,
    pub peer_handshake_timeout: u32,
    pub max_block_change_view: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_msg_delay: 5000,
            hash_msg_delay: 5000,
            peer_handshake_timeout: 10,
            max_block_change_view: 10000,
        }
    }
}

/// A governance action on the relay chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum GovernanceAction {
    RegisterSideChain(SideChainSpec),
    UpdateSideChain(SideChainSpec),
    ApproveRegisterSideChain { chain_id: u64 },
    ApproveUpdateSideChain { chain_id: u64 },
    QuitSideChain { chain_id: u64 },
    ApproveQuitSideChain { chain_id: u64 },
    RegisterRelayer { addresses: Vec<String> },
    ApproveRegisterRelayer { id: u64 },
    RemoveRelayer { addresses: Vec<String> },
    ApproveRemoveRelayer { id: u64 },
    RegisterCandidate { peer_pubkey: String },
    UnregisterCandidate { peer_pubkey: String },
    ApproveCandidate { peer_pubkey: String },
    BlackNode { peer_pubkeys: Vec<String> },
    WhiteNode { peer_pubkey: String },
    QuitNode { peer_pubkey: String },
    CommitDpos,
    UpdateConfig(ConsensusConfig),
    SyncGenesisHeader { chain_id: u64, header: String },
}

/// Fieldless discriminant of [`GovernanceAction`], used for reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    RegisterSideChain,
    UpdateSideChain,
    ApproveRegisterSideChain,
    ApproveUpdateSideChain,
    QuitSideChain,
    ApproveQuitSideChain,
    RegisterRelayer,
    ApproveRegisterRelayer,
    RemoveRelayer,
    ApproveRemoveRelayer,
    RegisterCandidate,
    UnregisterCandidate,
    ApproveCandidate,
    BlackNode,
    WhiteNode,
    QuitNode,
    CommitDpos,
    UpdateConfig,
    SyncGenesisHeader,
}

impl ActionKind {
    /// Native contract method name.
    pub fn method(&self) -> &'static str {
        match self {
            ActionKind::RegisterSideChain => "registerSideChain",
            ActionKind::UpdateSideChain => "updateSideChain",
            ActionKind::ApproveRegisterSideChain => "approveRegisterSideChain",
            ActionKind::ApproveUpdateSideChain => "approveUpdateSideChain",
            ActionKind::QuitSideChain => "quitSideChain",
            ActionKind::ApproveQuitSideChain => "approveQuitSideChain",
            ActionKind::RegisterRelayer => "registerRelayer",
            ActionKind::ApproveRegisterRelayer => "approveRegisterRelayer",
            ActionKind::RemoveRelayer => "removeRelayer",
            ActionKind::ApproveRemoveRelayer => "approveRemoveRelayer",
            ActionKind::RegisterCandidate => "registerCandidate",
            ActionKind::UnregisterCandidate => "unRegisterCandidate",
            ActionKind::ApproveCandidate => "approveCandidate",
            ActionKind::BlackNode => "blackNode",
            ActionKind::WhiteNode => "whiteNode",
            ActionKind::QuitNode => "quitNode",
            ActionKind::CommitDpos => "commitDpos",
            ActionKind::UpdateConfig => "updateConfig",
            ActionKind::SyncGenesisHeader => "syncGenesisHeader",
        }
    }

    /// Native contract the method belongs to.
    pub fn contract(&self) -> &'static str {
        match self {
            ActionKind::RegisterSideChain
            | ActionKind::UpdateSideChain
            | ActionKind::ApproveRegisterSideChain
            | ActionKind::ApproveUpdateSideChain
            | ActionKind::QuitSideChain
            | ActionKind::ApproveQuitSideChain => SIDE_CHAIN_MANAGER,
            ActionKind::RegisterRelayer
            | ActionKind::ApproveRegisterRelayer
            | ActionKind::RemoveRelayer
            | ActionKind::ApproveRemoveRelayer => RELAYER_MANAGER,
            ActionKind::SyncGenesisHeader => HEADER_SYNC,
            _ => NODE_MANAGER,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// How an action travels through propose and ratify.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolShape {
    /// Initiator proposes; each committee member then submits its own approval transaction.
    ProposeThenApprove,
    /// No proposal; each committee member submits the action itself as a vote.
    CommitteeVote,
    /// One transaction carrying the committee's multi-signature.
    MultiSigned,
    /// Initiator alone; no ratification.
    Single,
}

impl GovernanceAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            GovernanceAction::RegisterSideChain(_) => ActionKind::RegisterSideChain,
            GovernanceAction::UpdateSideChain(_) => ActionKind::UpdateSideChain,
            GovernanceAction::ApproveRegisterSideChain { .. } => {
                ActionKind::ApproveRegisterSideChain
            }
            GovernanceAction::ApproveUpdateSideChain { .. } => ActionKind::ApproveUpdateSideChain,
            GovernanceAction::QuitSideChain { .. } => ActionKind::QuitSideChain,
            GovernanceAction::ApproveQuitSideChain { .. } => ActionKind::ApproveQuitSideChain,
            GovernanceAction::RegisterRelayer { .. } => ActionKind::RegisterRelayer,
            GovernanceAction::ApproveRegisterRelayer { .. } => ActionKind::ApproveRegisterRelayer,
            GovernanceAction::RemoveRelayer { .. } => ActionKind::RemoveRelayer,
            GovernanceAction::ApproveRemoveRelayer { .. } => ActionKind::ApproveRemoveRelayer,
            GovernanceAction::RegisterCandidate { .. } => ActionKind::RegisterCandidate,
            GovernanceAction::UnregisterCandidate { .. } => ActionKind::UnregisterCandidate,
            GovernanceAction::ApproveCandidate { .. } => ActionKind::ApproveCandidate,
            GovernanceAction::BlackNode { .. } => ActionKind::BlackNode,
            GovernanceAction::WhiteNode { .. } => ActionKind::WhiteNode,
            GovernanceAction::QuitNode { .. } => ActionKind::QuitNode,
            GovernanceAction::CommitDpos => ActionKind::CommitDpos,
            GovernanceAction::UpdateConfig(_) => ActionKind::UpdateConfig,
            GovernanceAction::SyncGenesisHeader { .. } => ActionKind::SyncGenesisHeader,
        }
    }

    pub fn shape(&self) -> ProtocolShape {
        match self {
            GovernanceAction::RegisterSideChain(_)
            | GovernanceAction::UpdateSideChain(_)
            | GovernanceAction::QuitSideChain { .. }
            | GovernanceAction::RegisterRelayer { .. }
            | GovernanceAction::RemoveRelayer { .. }
            | GovernanceAction::RegisterCandidate { .. } => ProtocolShape::ProposeThenApprove,
            GovernanceAction::BlackNode { .. } | GovernanceAction::WhiteNode { .. } => {
                ProtocolShape::CommitteeVote
            }
            GovernanceAction::CommitDpos
            | GovernanceAction::UpdateConfig(_)
            | GovernanceAction::SyncGenesisHeader { .. } => ProtocolShape::MultiSigned,
            GovernanceAction::ApproveRegisterSideChain { .. }
            | GovernanceAction::ApproveUpdateSideChain { .. }
            | GovernanceAction::ApproveQuitSideChain { .. }
            | GovernanceAction::ApproveRegisterRelayer { .. }
            | GovernanceAction::ApproveRemoveRelayer { .. }
            | GovernanceAction::ApproveCandidate { .. }
            | GovernanceAction::UnregisterCandidate { .. }
            | GovernanceAction::QuitNode { .. } => ProtocolShape::Single,
        }
    }

    /// Event whose first argument is the id the approvals must reference.
    pub fn handle_event(&self) -> Option<&'static str> {
        match self {
            GovernanceAction::RegisterRelayer { .. } => Some(EVENT_RELAYER_APPLY),
            GovernanceAction::RemoveRelayer { .. } => Some(EVENT_RELAYER_REMOVE),
            _ => None,
        }
    }

    /// Approval each committee member submits after this action was proposed.
    ///
    /// `id` is the handle id decoded from the proposal's events; actions that
    /// declare a [`handle_event`](Self::handle_event) fail without it.
    pub fn approval(&self, id: Option<u64>) -> Result<Option<GovernanceAction>> {
        let approval = match self {
            GovernanceAction::RegisterSideChain(spec) => {
                GovernanceAction::ApproveRegisterSideChain { chain_id: spec.chain_id }
            }
            GovernanceAction::UpdateSideChain(spec) => {
                GovernanceAction::ApproveUpdateSideChain { chain_id: spec.chain_id }
            }
            GovernanceAction::QuitSideChain { chain_id } => {
                GovernanceAction::ApproveQuitSideChain { chain_id: *chain_id }
            }
            GovernanceAction::RegisterCandidate { peer_pubkey } => {
                GovernanceAction::ApproveCandidate { peer_pubkey: peer_pubkey.clone() }
            }
            GovernanceAction::RegisterRelayer { .. } => GovernanceAction::ApproveRegisterRelayer {
                id: id.ok_or_else(|| missing_id(self))?,
            },
            GovernanceAction::RemoveRelayer { .. } => GovernanceAction::ApproveRemoveRelayer {
                id: id.ok_or_else(|| missing_id(self))?,
            },
            _ => return Ok(None),
        };
        Ok(Some(approval))
    }

    /// Generic JSON encoding of the action's native payload.
    pub fn to_payload(&self) -> Result<TxPayload> {
        let kind = self.kind();
        let tagged = serde_json::to_value(self)?;
        let params = tagged.get("params").cloned().unwrap_or(serde_json::Value::Null);
        Ok(TxPayload {
            contract: kind.contract().to_string(),
            method: kind.method().to_string(),
            params,
        })
    }

    /// Short human description of the action's target, for logs.
    pub fn target(&self) -> String {
        match self {
            GovernanceAction::RegisterSideChain(spec) | GovernanceAction::UpdateSideChain(spec) => {
                format!("side chain {} ({})", spec.chain_id, spec.name)
            }
            GovernanceAction::ApproveRegisterSideChain { chain_id }
            | GovernanceAction::ApproveUpdateSideChain { chain_id }
            | GovernanceAction::QuitSideChain { chain_id }
            | GovernanceAction::ApproveQuitSideChain { chain_id }
            | GovernanceAction::SyncGenesisHeader { chain_id, .. } => {
                format!("side chain {}", chain_id)
            }
            GovernanceAction::RegisterRelayer { addresses }
            | GovernanceAction::RemoveRelayer { addresses } => {
                format!("relayers [{}]", addresses.join(", "))
            }
            GovernanceAction::ApproveRegisterRelayer { id }
            | GovernanceAction::ApproveRemoveRelayer { id } => {
                format!("relayer application {}", id)
            }
            GovernanceAction::RegisterCandidate { peer_pubkey }
            | GovernanceAction::UnregisterCandidate { peer_pubkey }
            | GovernanceAction::ApproveCandidate { peer_pubkey }
            | GovernanceAction::WhiteNode { peer_pubkey }
            | GovernanceAction::QuitNode { peer_pubkey } => format!("peer {}", peer_pubkey),
            GovernanceAction::BlackNode { peer_pubkeys } => {
                format!("peers [{}]", peer_pubkeys.join(", "))
            }
            GovernanceAction::CommitDpos => "consensus view".to_string(),
            GovernanceAction::UpdateConfig(cfg) => format!(
                "consensus config (block_msg_delay: {}, hash_msg_delay: {}, \
                 peer_handshake_timeout: {}, max_block_change_view: {})",
                cfg.block_msg_delay,
                cfg.hash_msg_delay,
                cfg.peer_handshake_timeout,
                cfg.max_block_change_view
            ),
        }
    }
}

fn missing_id(action: &GovernanceAction) -> GovernanceError {
    GovernanceError::InvalidAction {
        reason: format!("{} approval needs an id decoded from its proposal events", action.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn btc() -> SideChainSpec {
        SideChainSpec {
            address: "op".into(),
            chain_id: 1,
            router: 1,
            name: "btc".into(),
            blocks_to_wait: 6,
            ccm_contract: String::new(),
        }
    }

    #[test]
    fn test_register_side_chain_approval() {
        let action = GovernanceAction::RegisterSideChain(btc());
        assert_eq!(action.shape(), ProtocolShape::ProposeThenApprove);
        assert_eq!(
            action.approval(None).unwrap(),
            Some(GovernanceAction::ApproveRegisterSideChain { chain_id: 1 })
        );
    }

    #[test]
    fn test_relayer_approval_requires_event_id() {
        let action = GovernanceAction::RegisterRelayer { addresses: vec!["r1".into()] };
        assert_eq!(action.handle_event(), Some(EVENT_RELAYER_APPLY));
        assert!(action.approval(None).is_err());
        assert_eq!(
            action.approval(Some(9)).unwrap(),
            Some(GovernanceAction::ApproveRegisterRelayer { id: 9 })
        );
    }

    #[test]
    fn test_payload_targets_native_method() {
        let payload = GovernanceAction::ApproveQuitSideChain { chain_id: 3 }.to_payload().unwrap();
        assert_eq!(payload.contract, SIDE_CHAIN_MANAGER);
        assert_eq!(payload.method, "approveQuitSideChain");
        assert_eq!(payload.params, json!({"chain_id": 3}));
    }

    #[test]
    fn test_commit_dpos_has_no_params() {
        let payload = GovernanceAction::CommitDpos.to_payload().unwrap();
        assert_eq!(payload.contract, NODE_MANAGER);
        assert_eq!(payload.params, serde_json::Value::Null);
        assert_eq!(GovernanceAction::CommitDpos.shape(), ProtocolShape::MultiSigned);
    }

    #[test]
    fn test_votes_and_singles() {
        let black = GovernanceAction::BlackNode { peer_pubkeys: vec!["02ab".into()] };
        assert_eq!(black.shape(), ProtocolShape::CommitteeVote);
        assert_eq!(black.approval(None).unwrap(), None);
        let quit = GovernanceAction::QuitNode { peer_pubkey: "02ab".into() };
        assert_eq!(quit.shape(), ProtocolShape::Single);
    }
}
