//! Wallet loading: keystores and the committee source.
//!
//! The orchestrator only sees [`Signer`]s; this module turns keystore files plus
//! passwords into signers, in the order the operator listed them.

pub mod keystore;

pub use keystore::{Keystore, DEFAULT_KDF_ROUNDS};

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use std::path::PathBuf;
use std::sync::Arc;

use crate::committee::{Committee, Signer};
use crate::error::{GovernanceError, Result};
use crate::types::{SignatureEntry, TxPayload};
use crate::utils::{address_from_public_key, decode_hex};

/// Ed25519 signer held in memory.
pub struct LocalSigner {
    signing_key: SigningKey,
    public_key: [u8; 32],
    address: String,
}

impl LocalSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let public_key = signing_key.verifying_key().to_bytes();
        let address = address_from_public_key(&public_key);
        Self { signing_key, public_key, address }
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(digest).to_bytes().to_vec())
    }
}

/// Check that `entry` is a valid signature over `payload` by the key it names.
pub fn verify_entry(entry: &SignatureEntry, payload: &TxPayload) -> Result<bool> {
    let signing_error = |reason: String| GovernanceError::Signing {
        signer: entry.signer.clone(),
        reason,
    };
    let key_bytes: [u8; 32] = decode_hex(&entry.public_key)?
        .try_into()
        .map_err(|_| signing_error("bad public key length".into()))?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| signing_error(e.to_string()))?;
    let signature = Signature::from_slice(&decode_hex(&entry.signature)?)
        .map_err(|e| signing_error(e.to_string()))?;
    Ok(key.verify(&payload.digest()?, &signature).is_ok())
}

/// A keystore path and the password that unlocks it.
#[derive(Clone, Debug)]
pub struct WalletRef {
    pub path: PathBuf,
    pub password: String,
}

impl WalletRef {
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self { path: path.into(), password: password.into() }
    }

    pub fn unlock(&self) -> Result<LocalSigner> {
        Keystore::load(&self.path)?.unlock(&self.password)
    }
}

/// Pair comma-separated wallet paths with comma-separated passwords.
pub fn parse_wallet_list(paths: &str, passwords: &str) -> Result<Vec<WalletRef>> {
    let paths: Vec<&str> = paths.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if paths.is_empty() {
        return Err(GovernanceError::invalid_committee("no committee wallets given"));
    }
    let passwords: Vec<&str> = passwords.split(',').collect();
    if paths.len() != passwords.len() {
        return Err(GovernanceError::invalid_committee(format!(
            "{} wallets but {} passwords",
            paths.len(),
            passwords.len()
        )));
    }
    Ok(paths
        .into_iter()
        .zip(passwords)
        .map(|(path, password)| WalletRef::new(path, password))
        .collect())
}

/// Unlock every wallet, in order, and build the committee.
pub fn load_committee(wallets: &[WalletRef]) -> Result<Committee> {
    let mut members: Vec<Arc<dyn Signer>> = Vec::with_capacity(wallets.len());
    for (i, wallet) in wallets.iter().enumerate() {
        let signer = wallet.unlock().map_err(|e| GovernanceError::Wallet {
            reason: format!("failed to decode no{} wallet {}: {}", i, wallet.path.display(), e),
        })?;
        members.push(Arc::new(signer));
    }
    Committee::new(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_verifies() {
        let signer = LocalSigner::from_seed([1u8; 32]);
        let payload = TxPayload { contract: "c".into(), method: "m".into(), params: json!(1) };
        let entry = signer.sign_payload(&payload).unwrap();
        assert!(verify_entry(&entry, &payload).unwrap());

        let other = TxPayload { contract: "c".into(), method: "m".into(), params: json!(2) };
        assert!(!verify_entry(&entry, &other).unwrap());
    }

    #[test]
    fn test_wallet_list_mismatch() {
        assert!(parse_wallet_list("a.json,b.json", "p1").is_err());
        assert!(parse_wallet_list("", "").is_err());
        let wallets = parse_wallet_list("a.json, b.json", "p1,p2").unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[1].path, PathBuf::from("b.json"));
        assert_eq!(wallets[1].password, "p2");
    }

    #[test]
    fn test_load_committee_reports_failing_wallet() {
        let wallets = vec![WalletRef::new("/nonexistent/w0.json", "x")];
        let err = load_committee(&wallets).unwrap_err();
        assert!(err.to_string().contains("no0 wallet"));
    }
}
