//! Tool configuration.
//!
//! Loaded from a JSON file, then defaults fill every missing or zero field and
//! `GOVTOOL_RPC_URL` overrides the node address.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::action::SideChainSpec;
use crate::error::{GovernanceError, Result};
use crate::policy::{IdempotencyClassifier, PhraseRule};
use crate::runtime::ConfirmationWaiter;
use crate::wallet::WalletRef;

const DEFAULT_RPC_ADDRESS: &str = "http://127.0.0.1:20336";
const DEFAULT_CHAIN_NAME: &str = "poly";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_ATTEMPTS: u32 = 120;
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding `rpc_address`.
pub const ENV_RPC_URL: &str = "GOVTOOL_RPC_URL";

/// Confirmation wait policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default)]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub max_attempts: u32,
    /// Wait on every ratification submission instead of only the last one
    #[serde(default)]
    pub confirm_each_submission: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub rpc_address: String,
    #[serde(default)]
    pub chain_name: String,
    /// Keystore of the operator proposing side-chain and relayer actions
    #[serde(default)]
    pub operator_wallet: Option<PathBuf>,
    #[serde(default)]
    pub operator_password: Option<String>,
    #[serde(default)]
    pub side_chains: Vec<SideChainSpec>,
    #[serde(default)]
    pub wait: WaitConfig,
    /// Phrases appended after the built-in idempotency table
    #[serde(default)]
    pub extra_phrases: Vec<PhraseRule>,
    #[serde(default)]
    pub rpc_timeout_secs: u64,
}

impl ToolConfig {
    /// Load, fill defaults, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading configuration");
        let raw = std::fs::read_to_string(path).map_err(|e| GovernanceError::Config {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_overrides(std::env::var(ENV_RPC_URL).ok());
        config.validate()?;
        debug!(
            rpc_address = %config.rpc_address,
            chain = %config.chain_name,
            side_chains = config.side_chains.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and fill defaults; no environment access.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: ToolConfig = serde_json::from_str(raw)
            .map_err(|e| GovernanceError::Config {
                reason: format!("invalid configuration: {}", e),
            })?;
        config.apply_defaults();
        Ok(config)
    }

    pub fn apply_defaults(&mut self) {
        if self.rpc_address.trim().is_empty() {
            self.rpc_address = DEFAULT_RPC_ADDRESS.to_string();
        }
        if self.chain_name.trim().is_empty() {
            self.chain_name = DEFAULT_CHAIN_NAME.to_string();
        }
        if self.wait.poll_interval_ms == 0 {
            self.wait.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
        }
        if self.wait.max_attempts == 0 {
            self.wait.max_attempts = DEFAULT_MAX_ATTEMPTS;
        }
        if self.rpc_timeout_secs == 0 {
            self.rpc_timeout_secs = DEFAULT_RPC_TIMEOUT_SECS;
        }
    }

    pub fn apply_overrides(&mut self, rpc_url: Option<String>) {
        if let Some(url) = rpc_url.filter(|u| !u.trim().is_empty()) {
            info!(rpc_address = %url, "rpc address overridden from environment");
            self.rpc_address = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(rule) = self.extra_phrases.iter().find(|r| r.phrase.is_empty()) {
            return Err(GovernanceError::Config {
                reason: format!("empty idempotency phrase ({:?})", rule.classification),
            });
        }
        let mut ids: Vec<u64> = self.side_chains.iter().map(|s| s.chain_id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(GovernanceError::Config {
                reason: format!("side chain {} listed twice", pair[0]),
            });
        }
        if self.operator_wallet.is_some() && self.operator_password.is_none() {
            return Err(GovernanceError::Config {
                reason: "operator_wallet needs operator_password".into(),
            });
        }
        Ok(())
    }

    pub fn waiter(&self) -> ConfirmationWaiter {
        let poll_interval = Duration::from_millis(self.wait.poll_interval_ms);
        ConfirmationWaiter::new(poll_interval, self.wait.max_attempts)
    }

    pub fn classifier(&self) -> IdempotencyClassifier {
        self.extra_phrases
            .iter()
            .cloned()
            .fold(IdempotencyClassifier::default(), IdempotencyClassifier::with_rule)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn operator_wallet(&self) -> Option<WalletRef> {
        let path = self.operator_wallet.as_ref()?;
        Some(WalletRef::new(path.clone(), self.operator_password.clone().unwrap_or_default()))
    }
}
