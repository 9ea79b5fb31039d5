//! Chain adapter trait for governance transaction submission.
//!
//! Provides the narrow interface the orchestrator drives: submit a signed
//! transaction, query its finality, read its events and read raw storage.
//! Wire encoding and transport belong to the implementor.

use async_trait::async_trait;

use crate::action::GovernanceAction;
use crate::error::Result;
use crate::types::{NotificationRecord, SignedTx, TxHash, TxPayload, TxStatus};

pub mod events;
pub mod memory;
#[cfg(feature = "rpc")]
pub mod jsonrpc;

pub use events::decode_handle_id;
pub use memory::InMemoryChain;
#[cfg(feature = "rpc")]
pub use jsonrpc::JsonRpcChain;

/// What a chain can do beyond the basic submit/status contract.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterCapabilities {
    /// Accepts a single transaction carrying every committee signature, so
    /// multi-signed actions are submitted once instead of once per signer.
    pub supports_aggregation: bool,
    /// Multi-signed transactions need a payer signature from the initiator.
    pub requires_payer: bool,
}

/// Interface to one target chain.
///
/// Implementors provide chain-specific encoding and transport.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain identifier used in confirmations and logs.
    fn chain_name(&self) -> &str;

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    /// Encode the action's native payload. Defaults to the generic JSON encoding.
    fn encode(&self, action: &GovernanceAction) -> Result<TxPayload> {
        action.to_payload()
    }

    /// Submit a transaction. Business-rule refusals are `ChainRejected`,
    /// network failures are `Transport`.
    async fn submit(&self, tx: &SignedTx) -> Result<TxHash>;

    async fn status(&self, tx_hash: &TxHash) -> Result<TxStatus>;

    /// Notifications emitted while executing `tx_hash`.
    async fn events(&self, tx_hash: &TxHash) -> Result<Vec<NotificationRecord>>;

    /// Raw contract storage at `key`; `None` when the slot is empty.
    async fn query_storage(&self, contract: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
}
