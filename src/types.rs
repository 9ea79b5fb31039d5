//! Core types exchanged between the orchestrator and chain adapters.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::utils::sha3_256;

/// Hex-encoded transaction hash as reported by the target chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finality status of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Known to the node, not yet in a finalized block
    Pending,
    /// Included in a finalized block at `height`
    Confirmed { height: u64 },
    /// Not known to the node (yet)
    Unknown,
}

/// Proof that an action reached finality on the target chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub chain: String,
    /// Block height at which the chain reported the transaction final.
    pub finalized_at: u64,
}

/// One notification emitted by a contract while executing a transaction.
///
/// Schema: `{ "event_name": string, "args": [...] }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(default)]
    pub contract: String,
    pub event_name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl NotificationRecord {
    pub fn new(
        contract: impl Into<String>,
        event_name: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self { contract: contract.into(), event_name: event_name.into(), args }
    }

    /// Build a record from raw notify states, where the first state is the event name.
    pub fn from_states(contract: impl Into<String>, states: &[serde_json::Value]) -> Option<Self> {
        let (name, args) = states.split_first()?;
        let name = name.as_str()?;
        Some(Self::new(contract, name, args.to_vec()))
    }
}

/// Native payload of a governance transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxPayload {
    pub contract: String,
    pub method: String,
    pub params: serde_json::Value,
}

impl TxPayload {
    /// Bytes every signer signs over.
    pub fn digest(&self) -> crate::error::Result<[u8; 32]> {
        let bytes = serde_json::to_vec(self)?;
        Ok(sha3_256(&bytes))
    }
}

/// A signature produced by one signer over a payload digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer: String,
    /// Hex-encoded public key
    pub public_key: String,
    /// Hex-encoded signature
    pub signature: String,
}

/// Multi-signature section of a committee-signed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSigSection {
    /// Signatures required by the chain, derived from the committee size at assembly time
    pub threshold: u16,
    /// Hex-encoded committee public keys in committee order
    pub public_keys: Vec<String>,
    pub signatures: Vec<SignatureEntry>,
}

/// A transaction ready for submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTx {
    pub chain: String,
    pub payload: TxPayload,
    /// Proposer/payer signature, distinct from committee approvals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<SignatureEntry>,
    /// Single-signer approvals and votes
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisig: Option<MultiSigSection>,
}

impl SignedTx {
    pub fn unsigned(chain: impl Into<String>, payload: TxPayload) -> Self {
        Self { chain: chain.into(), payload, payer: None, signatures: Vec::new(), multisig: None }
    }

    /// Address of the identity that signed last, if any.
    pub fn last_signer(&self) -> Option<&str> {
        if let Some(section) = &self.multisig {
            if let Some(entry) = section.signatures.last() {
                return Some(entry.signer.as_str());
            }
        }
        self.signatures
            .last()
            .or(self.payer.as_ref())
            .map(|entry| entry.signer.as_str())
    }

    /// Number of committee signatures carried.
    pub fn signature_count(&self) -> usize {
        self.signatures.len() + self.multisig.as_ref().map_or(0, |m| m.signatures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_from_states() {
        let states = vec![json!("putRelayerApply"), json!(12), json!(["AK..."])];
        let record = NotificationRecord::from_states("relayer_manager", &states).unwrap();
        assert_eq!(record.event_name, "putRelayerApply");
        assert_eq!(record.args[0], json!(12));
    }

    #[test]
    fn test_notification_from_empty_states() {
        assert!(NotificationRecord::from_states("x", &[]).is_none());
        assert!(NotificationRecord::from_states("x", &[json!(7)]).is_none());
    }

    #[test]
    fn test_payload_digest_depends_on_params() {
        let a = TxPayload { contract: "c".into(), method: "m".into(), params: json!({"id": 1}) };
        let b = TxPayload { contract: "c".into(), method: "m".into(), params: json!({"id": 2}) };
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
