//! Scriptable in-process chain.
//!
//! Backs `--dry-run` and the test suite. Every `submit` call is recorded, accepted or
//! not, so callers can assert exactly which signers reached the chain and in what
//! order. Behaviour is scripted up front: rejections per method (optionally per
//! signer), the number of polls before a transaction finalizes, events emitted per
//! method and raw storage contents. A transaction carrying a signature that does not
//! verify against its payload is always refused.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{AdapterCapabilities, ChainAdapter};
use crate::error::{GovernanceError, Result};
use crate::types::{NotificationRecord, SignedTx, TxHash, TxStatus};
use crate::utils::sha3_256;
use crate::wallet::verify_entry;

/// A scripted refusal for submissions of `method`.
#[derive(Clone, Debug)]
struct Rejection {
    method: String,
    /// Only transactions last signed by this address are refused
    signer: Option<String>,
    message: String,
    /// Remaining refusals; `None` refuses forever
    remaining: Option<usize>,
    transport: bool,
}

impl Rejection {
    fn matches(&self, tx: &SignedTx) -> bool {
        if self.remaining == Some(0) || self.method != tx.payload.method {
            return false;
        }
        match &self.signer {
            Some(signer) => tx.last_signer() == Some(signer.as_str()),
            None => true,
        }
    }
}

#[derive(Default)]
struct ChainState {
    seq: u64,
    height: u64,
    attempts: Vec<SignedTx>,
    accepted: Vec<(TxHash, SignedTx)>,
    heights: HashMap<TxHash, u64>,
    polls: HashMap<TxHash, u32>,
    events: HashMap<TxHash, Vec<NotificationRecord>>,
    status_failures: u32,
}

/// In-memory [`ChainAdapter`].
pub struct InMemoryChain {
    name: String,
    capabilities: AdapterCapabilities,
    /// Polls after which an accepted transaction reports `Confirmed`; `None` never confirms
    confirm_after: Option<u32>,
    rejections: Mutex<Vec<Rejection>>,
    method_events: Mutex<HashMap<String, Vec<NotificationRecord>>>,
    storage: Mutex<HashMap<(String, Vec<u8>), Vec<u8>>>,
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    /// A chain that confirms every accepted transaction on the first poll.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: AdapterCapabilities::default(),
            confirm_after: Some(1),
            rejections: Mutex::new(Vec::new()),
            method_events: Mutex::new(HashMap::new()),
            storage: Mutex::new(HashMap::new()),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: AdapterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Report `Confirmed` on the `polls`-th status query of each transaction.
    pub fn confirm_after(mut self, polls: u32) -> Self {
        self.confirm_after = Some(polls.max(1));
        self
    }

    /// Accepted transactions stay pending forever.
    pub fn never_confirm(mut self) -> Self {
        self.confirm_after = None;
        self
    }

    /// Refuse every submission of `method` with `message`.
    pub fn reject(&self, method: &str, message: &str) {
        self.push_rejection(method, None, message, None, false);
    }

    /// Refuse submissions of `method` last signed by `signer`.
    pub fn reject_signer(&self, method: &str, signer: &str, message: &str) {
        self.push_rejection(method, Some(signer), message, None, false);
    }

    /// Refuse the next `times` submissions of `method`.
    pub fn reject_times(&self, method: &str, message: &str, times: usize) {
        self.push_rejection(method, None, message, Some(times), false);
    }

    /// Fail submissions of `method` with a transport error instead of a chain refusal.
    pub fn fail_transport(&self, method: &str, reason: &str) {
        self.push_rejection(method, None, reason, None, true);
    }

    /// The next `count` status queries fail with a transport error.
    pub fn fail_status(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.status_failures = count;
        }
    }

    /// Notifications attached to every accepted transaction calling `method`.
    pub fn emit_on(&self, method: &str, record: NotificationRecord) {
        if let Ok(mut events) = self.method_events.lock() {
            events.entry(method.to_string()).or_default().push(record);
        }
    }

    pub fn set_storage(&self, contract: &str, key: &[u8], value: Vec<u8>) {
        if let Ok(mut storage) = self.storage.lock() {
            storage.insert((contract.to_string(), key.to_vec()), value);
        }
    }

    /// Every transaction handed to `submit`, including refused ones.
    pub fn attempts(&self) -> Vec<SignedTx> {
        self.state.lock().map(|s| s.attempts.clone()).unwrap_or_default()
    }

    /// Transactions the chain accepted, in submission order.
    pub fn submissions(&self) -> Vec<SignedTx> {
        self.state
            .lock()
            .map(|s| s.accepted.iter().map(|(_, tx)| tx.clone()).collect())
            .unwrap_or_default()
    }

    /// Methods of accepted transactions, in submission order.
    pub fn submitted_methods(&self) -> Vec<String> {
        self.submissions().into_iter().map(|tx| tx.payload.method).collect()
    }

    /// Hashes of accepted transactions, in submission order.
    pub fn submitted_hashes(&self) -> Vec<TxHash> {
        self.state
            .lock()
            .map(|s| s.accepted.iter().map(|(hash, _)| hash.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of status queries made for `tx_hash`.
    pub fn status_calls(&self, tx_hash: &TxHash) -> u32 {
        self.state
            .lock()
            .map(|s| s.polls.get(tx_hash).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn push_rejection(
        &self,
        method: &str,
        signer: Option<&str>,
        message: &str,
        remaining: Option<usize>,
        transport: bool,
    ) {
        if let Ok(mut rejections) = self.rejections.lock() {
            rejections.push(Rejection {
                method: method.to_string(),
                signer: signer.map(str::to_string),
                message: message.to_string(),
                remaining,
                transport,
            });
        }
    }

    /// First scripted refusal matching `tx`, consuming one use of it.
    fn take_rejection(&self, tx: &SignedTx) -> Result<Option<GovernanceError>> {
        let mut rejections = lock(&self.rejections)?;
        let Some(rule) = rejections.iter_mut().find(|r| r.matches(tx)) else {
            return Ok(None);
        };
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(Some(if rule.transport {
            GovernanceError::transport(rule.message.clone())
        } else {
            GovernanceError::rejected(rule.message.clone())
        }))
    }
}

/// Every payer, approval and multi-signature entry must verify against the payload.
fn check_signatures(tx: &SignedTx) -> Result<()> {
    let multisig = tx.multisig.iter().flat_map(|m| m.signatures.iter());
    for entry in tx.payer.iter().chain(tx.signatures.iter()).chain(multisig) {
        if !matches!(verify_entry(entry, &tx.payload), Ok(true)) {
            let reason = format!("invalid signature from {}", entry.signer);
            return Err(GovernanceError::rejected(reason));
        }
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| GovernanceError::transport("in-memory chain state poisoned"))
}

#[async_trait]
impl ChainAdapter for InMemoryChain {
    fn chain_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        self.capabilities
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxHash> {
        lock(&self.state)?.attempts.push(tx.clone());

        check_signatures(tx)?;
        if let Some(err) = self.take_rejection(tx)? {
            return Err(err);
        }

        let events = lock(&self.method_events)?
            .get(&tx.payload.method)
            .cloned()
            .unwrap_or_default();

        let mut state = lock(&self.state)?;
        state.seq += 1;
        state.height += 1;
        let mut preimage = serde_json::to_vec(tx)?;
        preimage.extend_from_slice(&state.seq.to_be_bytes());
        let hash = TxHash::from_digest(&sha3_256(&preimage));

        let height = state.height;
        state.heights.insert(hash.clone(), height);
        state.events.insert(hash.clone(), events);
        state.accepted.push((hash.clone(), tx.clone()));
        Ok(hash)
    }

    async fn status(&self, tx_hash: &TxHash) -> Result<TxStatus> {
        let mut state = lock(&self.state)?;
        let polls = {
            let entry = state.polls.entry(tx_hash.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(GovernanceError::transport("status query failed"));
        }
        let Some(height) = state.heights.get(tx_hash).copied() else {
            return Ok(TxStatus::Unknown);
        };
        match self.confirm_after {
            Some(needed) if polls >= needed => Ok(TxStatus::Confirmed { height }),
            _ => Ok(TxStatus::Pending),
        }
    }

    async fn events(&self, tx_hash: &TxHash) -> Result<Vec<NotificationRecord>> {
        let state = lock(&self.state)?;
        state
            .events
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| GovernanceError::transport(format!("unknown transaction {}", tx_hash)))
    }

    async fn query_storage(&self, contract: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(lock(&self.storage)?.get(&(contract.to_string(), key.to_vec())).cloned())
    }
}
