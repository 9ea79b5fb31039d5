//! Signer identities and the ordered approving committee.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GovernanceError, Result};
use crate::types::{SignatureEntry, TxPayload};
use crate::utils::threshold;

/// A ready-to-use identity able to sign a payload digest.
///
/// Credential acquisition (keystores, hardware) happens before a `Signer` exists.
pub trait Signer: Send + Sync {
    /// Chain address of this identity.
    fn address(&self) -> &str;

    /// Raw public key bytes.
    fn public_key(&self) -> &[u8];

    /// Sign a 32-byte payload digest.
    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>>;

    /// Sign `payload` and wrap the result for inclusion in a transaction.
    fn sign_payload(&self, payload: &TxPayload) -> Result<SignatureEntry> {
        let digest = payload.digest()?;
        let signature = self.sign(&digest)?;
        Ok(SignatureEntry {
            signer: self.address().to_string(),
            public_key: hex::encode(self.public_key()),
            signature: hex::encode(signature),
        })
    }
}

/// Ordered, non-empty set of committee signers.
///
/// Order is submission order, nothing more.
#[derive(Clone)]
pub struct Committee {
    members: Vec<Arc<dyn Signer>>,
}

impl Committee {
    pub fn new(members: Vec<Arc<dyn Signer>>) -> Result<Self> {
        if members.is_empty() {
            return Err(GovernanceError::invalid_committee("committee has no members"));
        }
        let mut seen = HashSet::new();
        for (i, member) in members.iter().enumerate() {
            if member.address().is_empty() {
                let reason = format!("member {} has no address", i + 1);
                return Err(GovernanceError::invalid_committee(reason));
            }
            if !seen.insert(member.address().to_string()) {
                return Err(GovernanceError::invalid_committee(format!(
                    "signer {} appears more than once",
                    member.address()
                )));
            }
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current quorum requirement for this committee.
    pub fn threshold(&self) -> Result<usize> {
        threshold(self.members.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Signer>> {
        self.members.iter()
    }

    /// Hex-encoded public keys in committee order.
    pub fn public_keys(&self) -> Vec<String> {
        self.members.iter().map(|m| hex::encode(m.public_key())).collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.members.iter().map(|m| m.address().to_string()).collect()
    }
}

impl core::fmt::Debug for Committee {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Committee").field("members", &self.addresses()).finish()
    }
}
