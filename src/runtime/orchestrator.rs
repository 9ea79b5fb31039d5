//! Two-phase governance driver.
//!
//! ```text
//! Proposing -> { Proposed, AlreadyApplied, AlreadyPending }
//! Proposed | AlreadyPending -> Ratifying -> { Finalized, Fatal }
//! ```
//!
//! Ratification is strictly sequential in committee order. Only the proposal's
//! answer is classified: any failed member submission stops the walk and later
//! members are never attempted. Earlier signatures stay on chain.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::action::{GovernanceAction, ProtocolShape};
use crate::adapters::{decode_handle_id, ChainAdapter};
use crate::committee::{Committee, Signer};
use crate::error::{ActionFailure, GovernanceError, Phase, Result};
use crate::policy::{Classification, IdempotencyClassifier};
use crate::runtime::assembler::MultiSigAssembler;
use crate::runtime::waiter::ConfirmationWaiter;
use crate::types::{Confirmation, SignedTx, TxHash};

/// A proposed action awaiting ratification.
#[derive(Clone, Debug)]
pub struct ActionHandle {
    pub action: GovernanceAction,
    /// Transaction built by the initiator
    pub proposal: SignedTx,
    /// Hash of the accepted proposal, if one was submitted
    pub proposal_hash: Option<TxHash>,
    /// Finality of the proposal, if it was waited on
    pub confirmation: Option<Confirmation>,
    /// Id decoded from the proposal's event log
    pub target_id: Option<u64>,
}

#[derive(Debug)]
pub enum ProposeOutcome {
    Proposed(ActionHandle),
    /// The desired end state already holds; nothing left to do.
    AlreadyApplied { reason: String },
    /// A proposal already exists on chain; only approvals remain.
    AlreadyPending { handle: ActionHandle, reason: String },
}

/// How an orchestrated action ended.
#[derive(Debug)]
pub enum TerminalOutcome {
    Finalized(Confirmation),
    AlreadyApplied(String),
    AlreadyPending(String),
    Fatal(ActionFailure),
}

impl TerminalOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TerminalOutcome::Fatal(_))
    }
}

/// Drives one governance action through propose and ratify.
pub struct GovernanceOrchestrator {
    adapter: Arc<dyn ChainAdapter>,
    assembler: MultiSigAssembler,
    classifier: IdempotencyClassifier,
    waiter: ConfirmationWaiter,
    confirm_each_submission: bool,
    cancel: watch::Receiver<bool>,
}

impl GovernanceOrchestrator {
    pub fn new(adapter: Arc<dyn ChainAdapter>) -> Self {
        let (_, cancel) = watch::channel(false);
        Self {
            assembler: MultiSigAssembler::new(adapter.clone()),
            adapter,
            classifier: IdempotencyClassifier::default(),
            waiter: ConfirmationWaiter::default(),
            confirm_each_submission: false,
            cancel,
        }
    }

    pub fn with_classifier(mut self, classifier: IdempotencyClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_waiter(mut self, waiter: ConfirmationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Wait for every ratification submission to finalize, not only the last one.
    pub fn confirm_each_submission(mut self, enabled: bool) -> Self {
        self.confirm_each_submission = enabled;
        self
    }

    /// Confirmation waits end with `Cancelled` once `cancel` turns true.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn ChainAdapter> {
        &self.adapter
    }

    /// Submit the initiator's transaction and classify the chain's answer.
    ///
    /// A proposal the chain accepts is waited on; for actions whose approvals
    /// reference an id, the id is then decoded from the proposal's events.
    pub async fn propose(
        &self,
        action: &GovernanceAction,
        initiator: &dyn Signer,
    ) -> core::result::Result<ProposeOutcome, ActionFailure> {
        let kind = action.kind();
        info!(
            action = %kind,
            target = %action.target(),
            initiator = initiator.address(),
            "proposing"
        );

        let begun = self
            .assembler
            .begin(action, initiator)
            .await
            .map_err(|e| ActionFailure::new(kind, Phase::Propose, e))?;

        let mut handle = ActionHandle {
            action: action.clone(),
            proposal: begun.tx,
            proposal_hash: None,
            confirmation: None,
            target_id: None,
        };

        let tx_hash = match begun.first_result {
            None => return Ok(ProposeOutcome::Proposed(handle)),
            Some(Ok(tx_hash)) => tx_hash,
            Some(Err(e)) => {
                return match self.classifier.classify_for(kind, &e) {
                    Classification::AlreadyApplied => {
                        info!(action = %kind, reason = %e, "already applied, no ratification");
                        Ok(ProposeOutcome::AlreadyApplied { reason: e.to_string() })
                    }
                    Classification::AlreadyPending => {
                        info!(action = %kind, reason = %e, "proposal already pending");
                        Ok(ProposeOutcome::AlreadyPending { handle, reason: e.to_string() })
                    }
                    Classification::Fatal => Err(ActionFailure::new(kind, Phase::Propose, e)),
                };
            }
        };

        info!(action = %kind, tx_hash = %tx_hash, "proposal submitted");
        let confirmation = self
            .wait(&tx_hash)
            .await
            .map_err(|e| ActionFailure::new(kind, Phase::Confirm, e))?;

        if let Some(event) = action.handle_event() {
            let id = self
                .decode_id(&tx_hash, event)
                .await
                .map_err(|e| ActionFailure::new(kind, Phase::Propose, e))?;
            info!(action = %kind, id, "decoded handle id");
            handle.target_id = Some(id);
        }

        handle.proposal_hash = Some(tx_hash);
        handle.confirmation = Some(confirmation);
        Ok(ProposeOutcome::Proposed(handle))
    }

    /// Walk the committee in order, each member signing and submitting, then wait
    /// for the last submission to finalize.
    pub async fn ratify(&self, handle: ActionHandle, committee: &Committee) -> TerminalOutcome {
        let kind = handle.action.kind();

        if handle.action.shape() == ProtocolShape::Single {
            return match handle.confirmation {
                Some(confirmation) => TerminalOutcome::Finalized(confirmation),
                None => TerminalOutcome::Fatal(ActionFailure::new(
                    kind,
                    Phase::Ratify,
                    GovernanceError::InvalidAction {
                        reason: format!("{} was never submitted", kind),
                    },
                )),
            };
        }

        let prepared = self
            .assembler
            .prepare(&handle.action, &handle.proposal, handle.target_id, committee);
        let mut pending = match prepared {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                return TerminalOutcome::Fatal(ActionFailure::new(
                    kind,
                    Phase::Ratify,
                    GovernanceError::InvalidAction {
                        reason: format!("{} has nothing to ratify", kind),
                    },
                ))
            }
            Err(e) => return TerminalOutcome::Fatal(ActionFailure::new(kind, Phase::Ratify, e)),
        };
        let ratified = pending.kind();

        match committee.threshold() {
            Ok(threshold) => info!(
                action = %ratified,
                members = committee.len(),
                threshold,
                "ratifying"
            ),
            Err(e) => return TerminalOutcome::Fatal(ActionFailure::new(ratified, Phase::Ratify, e)),
        }

        let mut last_hash: Option<TxHash> = None;
        let mut last_confirmation: Option<Confirmation> = None;

        for (i, member) in committee.iter().enumerate() {
            let position = i + 1;
            match self.assembler.attach(&mut pending, member.as_ref()).await {
                Ok(Some(tx_hash)) => {
                    info!(
                        action = %ratified,
                        member = position,
                        signer = member.address(),
                        tx_hash = %tx_hash,
                        "No{}: submitted",
                        position
                    );
                    if self.confirm_each_submission {
                        match self.wait(&tx_hash).await {
                            Ok(confirmation) => last_confirmation = Some(confirmation),
                            Err(e) => {
                                return TerminalOutcome::Fatal(ActionFailure {
                                    kind: ratified,
                                    phase: Phase::Confirm,
                                    member: Some(position),
                                    source: e,
                                })
                            }
                        }
                    }
                    last_hash = Some(tx_hash);
                }
                Ok(None) => debug!(action = %ratified, member = position, "signature accumulated"),
                Err(e) => {
                    warn!(
                        action = %ratified,
                        member = position,
                        signer = member.address(),
                        reason = %e,
                        "No{}: submission failed, later members not attempted",
                        position
                    );
                    return TerminalOutcome::Fatal(ActionFailure::at_member(ratified, position, e));
                }
            }
        }

        match self.assembler.flush(&pending).await {
            Ok(Some(tx_hash)) => {
                info!(
                    action = %ratified,
                    signatures = pending.collected(),
                    tx_hash = %tx_hash,
                    "aggregated transaction submitted"
                );
                last_hash = Some(tx_hash);
                last_confirmation = None;
            }
            Ok(None) => {}
            Err(e) => return TerminalOutcome::Fatal(ActionFailure::new(ratified, Phase::Ratify, e)),
        }

        let Some(tx_hash) = last_hash else {
            return TerminalOutcome::Fatal(ActionFailure::new(
                ratified,
                Phase::Ratify,
                GovernanceError::InvalidAction {
                    reason: format!("no {} transaction was submitted", ratified),
                },
            ));
        };

        if let Some(confirmation) = last_confirmation.filter(|c| c.tx_hash == tx_hash) {
            return TerminalOutcome::Finalized(confirmation);
        }

        match self.wait(&tx_hash).await {
            Ok(confirmation) => {
                info!(
                    action = %ratified,
                    tx_hash = %tx_hash,
                    height = confirmation.finalized_at,
                    "finalized"
                );
                TerminalOutcome::Finalized(confirmation)
            }
            Err(e) => TerminalOutcome::Fatal(ActionFailure::new(ratified, Phase::Confirm, e)),
        }
    }

    /// Propose then ratify.
    pub async fn run_to_completion(
        &self,
        action: &GovernanceAction,
        initiator: &dyn Signer,
        committee: &Committee,
    ) -> TerminalOutcome {
        match self.propose(action, initiator).await {
            Err(failure) => TerminalOutcome::Fatal(failure),
            Ok(ProposeOutcome::AlreadyApplied { reason }) => {
                TerminalOutcome::AlreadyApplied(reason)
            }
            Ok(ProposeOutcome::AlreadyPending { reason, .. })
                if action.shape() == ProtocolShape::Single =>
            {
                TerminalOutcome::AlreadyPending(reason)
            }
            Ok(ProposeOutcome::AlreadyPending { handle, .. })
            | Ok(ProposeOutcome::Proposed(handle)) => self.ratify(handle, committee).await,
        }
    }

    /// Submit without ratification; for commands where only the proposer acts.
    pub async fn propose_only(
        &self,
        action: &GovernanceAction,
        initiator: &dyn Signer,
    ) -> TerminalOutcome {
        match self.propose(action, initiator).await {
            Err(failure) => TerminalOutcome::Fatal(failure),
            Ok(ProposeOutcome::AlreadyApplied { reason }) => {
                TerminalOutcome::AlreadyApplied(reason)
            }
            Ok(ProposeOutcome::AlreadyPending { reason, .. }) => {
                TerminalOutcome::AlreadyPending(reason)
            }
            Ok(ProposeOutcome::Proposed(handle)) => match handle.confirmation {
                Some(confirmation) => TerminalOutcome::Finalized(confirmation),
                None => TerminalOutcome::Fatal(ActionFailure::new(
                    action.kind(),
                    Phase::Propose,
                    GovernanceError::InvalidAction {
                        reason: format!("{} needs the committee to submit", action.kind()),
                    },
                )),
            },
        }
    }

    async fn wait(&self, tx_hash: &TxHash) -> Result<Confirmation> {
        self.waiter
            .wait_for_cancellable(self.adapter.as_ref(), tx_hash, self.cancel.clone())
            .await
    }

    async fn decode_id(&self, tx_hash: &TxHash, event: &str) -> Result<u64> {
        let records = self.adapter.events(tx_hash).await?;
        decode_handle_id(tx_hash, &records, event)
    }
}
