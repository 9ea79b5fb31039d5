//! Password-encrypted keystore files.
//!
//! Enforces:
//! 1. Memory hygiene (Zeroize on every decrypted seed)
//! 2. Encryption at rest (AES-256-GCM)
//! 3. Password key derivation (PBKDF2-HMAC-SHA256, per-file salt)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bip39::Mnemonic;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use super::LocalSigner;
use crate::committee::Signer;
use crate::error::{GovernanceError, Result};
use crate::utils::decode_hex;

/// Keystore format version written by this crate.
pub const KEYSTORE_VERSION: u32 = 1;

/// PBKDF2 rounds for newly created keystores.
pub const DEFAULT_KDF_ROUNDS: u32 = 100_000;

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// On-disk keystore: an Ed25519 seed encrypted under a password-derived key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystore {
    pub version: u32,
    pub address: String,
    /// Hex-encoded public key, readable without the password
    pub public_key: String,
    pub salt: String,
    pub kdf_rounds: u32,
    pub nonce: String,
    pub ciphertext: String,
}

impl Keystore {
    /// Encrypt `seed` under `password`.
    pub fn create(seed: &[u8; 32], password: &str, kdf_rounds: u32) -> Result<Self> {
        let signer = LocalSigner::from_seed(*seed);

        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce_bytes);

        let key = derive_key(password, &salt, kdf_rounds);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|e| GovernanceError::Wallet {
            reason: format!("cipher init failed: {}", e),
        })?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), seed.as_ref())
            .map_err(|e| GovernanceError::Wallet { reason: format!("encryption failed: {}", e) })?;

        Ok(Self {
            version: KEYSTORE_VERSION,
            address: signer.address().to_string(),
            public_key: hex::encode(signer.public_key()),
            salt: hex::encode(salt),
            kdf_rounds,
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Derive the seed deterministically from a BIP-39 mnemonic and encrypt it.
    pub fn from_mnemonic(phrase: &str, password: &str, kdf_rounds: u32) -> Result<Self> {
        let mnemonic = Mnemonic::parse(phrase)
            .map_err(|e| GovernanceError::Wallet { reason: format!("invalid mnemonic: {}", e) })?;

        // seed = SHA-256(entropy)
        let entropy = Zeroizing::new(mnemonic.to_entropy());
        let mut hasher = Sha256::new();
        hasher.update(&entropy[..]);
        let seed: Zeroizing<[u8; 32]> = Zeroizing::new(hasher.finalize().into());

        Self::create(&seed, password, kdf_rounds)
    }

    /// Decrypt the seed and return a signer. The seed never leaves zeroizing memory.
    pub fn unlock(&self, password: &str) -> Result<LocalSigner> {
        if self.version != KEYSTORE_VERSION {
            return Err(GovernanceError::Wallet {
                reason: format!("unsupported keystore version {}", self.version),
            });
        }
        let salt = decode_hex(&self.salt)?;
        let nonce_bytes = decode_hex(&self.nonce)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(GovernanceError::Wallet {
                reason: "keystore corrupted (nonce length)".into(),
            });
        }
        let ciphertext = decode_hex(&self.ciphertext)?;

        let key = derive_key(password, &salt, self.kdf_rounds);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|e| GovernanceError::Wallet {
            reason: format!("cipher init failed: {}", e),
        })?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
                .map_err(|_| GovernanceError::Wallet {
                    reason: format!(
                        "failed to decrypt keystore {} (wrong password?)",
                        self.address
                    ),
                })?,
        );
        let seed: [u8; 32] = plaintext[..]
            .try_into()
            .map_err(|_| GovernanceError::Wallet {
                reason: "keystore corrupted (seed length)".into(),
            })?;
        let seed = Zeroizing::new(seed);

        let signer = LocalSigner::from_seed(*seed);
        if signer.address() != self.address {
            return Err(GovernanceError::Wallet {
                reason: format!("keystore address {} does not match its key", self.address),
            });
        }
        Ok(signer)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| GovernanceError::Wallet {
            reason: format!("failed to read keystore {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&contents).map_err(|e| GovernanceError::Wallet {
            reason: format!("failed to parse keystore {}: {}", path.display(), e),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key[..]);
    key
}
