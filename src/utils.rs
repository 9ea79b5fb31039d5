//! Utility functions: committee threshold and hashing helpers.

use sha3::{Digest, Sha3_256};

use crate::error::{GovernanceError, Result};

/// SHA3-256 hash helper.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Minimum number of committee approvals for a committee of `n` members.
///
/// Supermajority `ceil(5n / 7)`, the rule the committee's own consensus enforces.
/// Must be recomputed whenever a multi-signed transaction is assembled, as the
/// committee can change size between invocations.
pub fn threshold(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(GovernanceError::invalid_committee("committee has no members"));
    }
    Ok((5 * n + 6) / 7)
}

/// Derive a short address from a public key: first 20 bytes of SHA3-256, hex.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    hex::encode(&sha3_256(public_key)[..20])
}

/// Strip an optional `0x` prefix and decode hex.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(trimmed).map_err(|e| GovernanceError::InvalidAction {
        reason: format!("invalid hex '{}': {}", input, e),
    })
}
