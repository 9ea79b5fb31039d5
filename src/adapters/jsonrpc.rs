//! JSON-RPC adapter for relay chain nodes.
//!
//! Speaks the node's 2.0 JSON-RPC dialect, where every response is
//! `{ "error": code, "desc": text, "result": ... }` and a non-zero `error` carries the
//! refusal text in `result` or `desc`. Transactions travel hex-encoded; their byte
//! layout is the serialized [`SignedTx`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{AdapterCapabilities, ChainAdapter};
use crate::error::{GovernanceError, Result};
use crate::types::{NotificationRecord, SignedTx, TxHash, TxStatus};

/// Node reports a transaction it has never seen.
const ERR_UNKNOWN_TRANSACTION: i64 = 44001;

/// Default transport timeout for a single RPC call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    error: i64,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    result: Value,
}

impl RpcResponse {
    /// Refusal text, preferring the detailed `result` over `desc`.
    fn message(&self) -> String {
        match &self.result {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Null => self.desc.clone(),
            other => format!("{}: {}", self.desc, other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteNotify {
    #[serde(rename = "Notify", default)]
    notify: Vec<NotifyEntry>,
}

#[derive(Debug, Deserialize)]
struct NotifyEntry {
    #[serde(rename = "ContractAddress", default)]
    contract_address: String,
    #[serde(rename = "States", default)]
    states: Value,
}

/// HTTP JSON-RPC [`ChainAdapter`].
pub struct JsonRpcChain {
    http_client: reqwest::Client,
    rpc_url: String,
    chain_name: String,
    capabilities: AdapterCapabilities,
}

impl JsonRpcChain {
    pub fn new(
        rpc_url: impl Into<String>,
        chain_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GovernanceError::Config {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            chain_name: chain_name.into(),
            // relay chain multi-sig transactions carry a payer signature
            capabilities: AdapterCapabilities { supports_aggregation: false, requires_payer: true },
        })
    }

    pub fn with_capabilities(mut self, capabilities: AdapterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Value) -> Result<RpcResponse> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GovernanceError::transport(format!("{} failed: {}", method, e)))?;

        response
            .json::<RpcResponse>()
            .await
            .map_err(|e| {
                GovernanceError::transport(format!("failed to parse {} response: {}", method, e))
            })
    }
}

#[async_trait]
impl ChainAdapter for JsonRpcChain {
    fn chain_name(&self) -> &str {
        &self.chain_name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxHash> {
        let raw = hex::encode(serde_json::to_vec(tx)?);
        let response = self.call("sendrawtransaction", json!([raw])).await?;
        if response.error != 0 {
            return Err(GovernanceError::rejected(response.message()));
        }
        match response.result {
            Value::String(hash) if !hash.is_empty() => Ok(TxHash::new(hash)),
            other => Err(GovernanceError::transport(format!(
                "unexpected sendrawtransaction result: {}",
                other
            ))),
        }
    }

    async fn status(&self, tx_hash: &TxHash) -> Result<TxStatus> {
        let response = self.call("getblockheightbytxhash", json!([tx_hash.as_str()])).await?;
        match response.error {
            0 => {}
            ERR_UNKNOWN_TRANSACTION => return Ok(TxStatus::Unknown),
            _ => return Err(GovernanceError::transport(response.message())),
        }
        match response.result.as_u64() {
            Some(height) => Ok(TxStatus::Confirmed { height }),
            None => Ok(TxStatus::Pending),
        }
    }

    async fn events(&self, tx_hash: &TxHash) -> Result<Vec<NotificationRecord>> {
        let response = self.call("getsmartcodeevent", json!([tx_hash.as_str()])).await?;
        if response.error != 0 {
            return Err(GovernanceError::transport(response.message()));
        }
        if response.result.is_null() {
            return Ok(Vec::new());
        }
        let execute: ExecuteNotify = serde_json::from_value(response.result)?;
        Ok(execute
            .notify
            .into_iter()
            .filter_map(|entry| match entry.states {
                Value::Array(states) => {
                    NotificationRecord::from_states(entry.contract_address, &states)
                }
                _ => None,
            })
            .collect())
    }

    async fn query_storage(&self, contract: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let response = self.call("getstorage", json!([contract, hex::encode(key)])).await?;
        if response.error != 0 {
            return Err(GovernanceError::transport(response.message()));
        }
        match response.result {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => hex::decode(&s)
                .map(Some)
                .map_err(|e| {
                    GovernanceError::transport(format!("storage value is not hex: {}", e))
                }),
            other => Err(GovernanceError::transport(format!(
                "unexpected getstorage result: {}",
                other
            ))),
        }
    }
}
