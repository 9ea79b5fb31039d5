//! Multi-signer transaction assembly.
//!
//! `begin` builds, signs and submits the initiator's transaction. Committee votes
//! have no proposal and submit nothing until the first member votes. `attach` then
//! adds one committee member's signature to a rebuilt view of the ratification
//! transaction and resubmits it: every member's submission is its own chain call.
//! Chains that accept a single aggregated transaction advertise
//! `supports_aggregation`; for those the multi-signature is accumulated locally and
//! sent once by `flush`.

use std::sync::Arc;
use tracing::debug;

use crate::action::{ActionKind, GovernanceAction, ProtocolShape};
use crate::adapters::ChainAdapter;
use crate::committee::{Committee, Signer};
use crate::error::{GovernanceError, Result};
use crate::types::{MultiSigSection, SignedTx, TxHash};

/// Outcome of [`MultiSigAssembler::begin`].
#[derive(Debug)]
pub struct Begun {
    /// Transaction as built and signed by the initiator.
    pub tx: SignedTx,
    /// Result of the initial submission; `None` for committee votes.
    pub first_result: Option<Result<TxHash>>,
}

/// Ratification transaction under construction.
#[derive(Clone, Debug)]
pub struct PendingTx {
    kind: ActionKind,
    template: SignedTx,
    aggregate: bool,
}

impl PendingTx {
    /// Kind of the action each member signs.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn is_multisig(&self) -> bool {
        self.template.multisig.is_some()
    }

    /// Committee signatures accumulated so far (multi-signed transactions only).
    pub fn collected(&self) -> usize {
        self.template.multisig.as_ref().map_or(0, |m| m.signatures.len())
    }

    pub fn payload_method(&self) -> &str {
        &self.template.payload.method
    }
}

pub struct MultiSigAssembler {
    adapter: Arc<dyn ChainAdapter>,
}

impl MultiSigAssembler {
    pub fn new(adapter: Arc<dyn ChainAdapter>) -> Self {
        Self { adapter }
    }

    /// Build the action's transaction, sign it as the initiator and submit it once.
    /// A multi-signed action is proposed without committee signatures; `prepare`
    /// builds the multi-signed view ratification resubmits.
    ///
    /// Local failures (encoding, signing) are returned as `Err`; the chain's answer
    /// to the submission is carried in [`Begun::first_result`].
    pub async fn begin(&self, action: &GovernanceAction, initiator: &dyn Signer) -> Result<Begun> {
        let payload = self.adapter.encode(action)?;
        let mut tx = SignedTx::unsigned(self.adapter.chain_name(), payload);

        match action.shape() {
            ProtocolShape::CommitteeVote => Ok(Begun { tx, first_result: None }),
            ProtocolShape::ProposeThenApprove
            | ProtocolShape::Single
            | ProtocolShape::MultiSigned => {
                tx.payer = Some(initiator.sign_payload(&tx.payload)?);
                let first_result = self.adapter.submit(&tx).await;
                Ok(Begun { tx, first_result: Some(first_result) })
            }
        }
    }

    /// Build the transaction the committee ratifies.
    ///
    /// `proposal` is the transaction returned by `begin`; `id` is the handle id decoded
    /// from the proposal's events, if the action has one. Returns `None` for actions
    /// that need no ratification. The multi-signature threshold is computed here from
    /// the committee size on every call.
    pub fn prepare(
        &self,
        action: &GovernanceAction,
        proposal: &SignedTx,
        id: Option<u64>,
        committee: &Committee,
    ) -> Result<Option<PendingTx>> {
        let chain = self.adapter.chain_name();
        let pending = match action.shape() {
            ProtocolShape::Single => return Ok(None),
            ProtocolShape::ProposeThenApprove => {
                let approval = action.approval(id)?.ok_or_else(|| GovernanceError::InvalidAction {
                    reason: format!("{} has no approval action", action.kind()),
                })?;
                PendingTx {
                    kind: approval.kind(),
                    template: SignedTx::unsigned(chain, self.adapter.encode(&approval)?),
                    aggregate: false,
                }
            }
            ProtocolShape::CommitteeVote => PendingTx {
                kind: action.kind(),
                template: SignedTx::unsigned(chain, proposal.payload.clone()),
                aggregate: false,
            },
            ProtocolShape::MultiSigned => {
                let threshold = u16::try_from(committee.threshold()?).map_err(|_| {
                    let reason = format!("committee of {} is too large", committee.len());
                    GovernanceError::invalid_committee(reason)
                })?;
                let capabilities = self.adapter.capabilities();
                let mut template = proposal.clone();
                if !capabilities.requires_payer {
                    template.payer = None;
                }
                template.multisig = Some(MultiSigSection {
                    threshold,
                    public_keys: committee.public_keys(),
                    signatures: Vec::with_capacity(committee.len()),
                });
                PendingTx {
                    kind: action.kind(),
                    template,
                    aggregate: capabilities.supports_aggregation,
                }
            }
        };
        Ok(Some(pending))
    }

    /// Attach `signer`'s signature and submit.
    ///
    /// Returns `None` when the signature was only accumulated for a later `flush`.
    pub async fn attach(
        &self,
        pending: &mut PendingTx,
        signer: &dyn Signer,
    ) -> Result<Option<TxHash>> {
        let entry = signer.sign_payload(&pending.template.payload)?;

        if let Some(section) = pending.template.multisig.as_mut() {
            section.signatures.push(entry);
            if pending.aggregate {
                debug!(
                    signer = signer.address(),
                    collected = section.signatures.len(),
                    "signature accumulated"
                );
                return Ok(None);
            }
            return self.adapter.submit(&pending.template).await.map(Some);
        }

        let mut tx = pending.template.clone();
        tx.signatures.push(entry);
        self.adapter.submit(&tx).await.map(Some)
    }

    /// Submit an aggregated multi-signature in one call.
    pub async fn flush(&self, pending: &PendingTx) -> Result<Option<TxHash>> {
        if !pending.aggregate || pending.collected() == 0 {
            return Ok(None);
        }
        self.adapter.submit(&pending.template).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SideChainSpec;
    use crate::adapters::{AdapterCapabilities, InMemoryChain};
    use crate::wallet::LocalSigner;

    fn committee(n: u8) -> Committee {
        let members: Vec<Arc<dyn Signer>> =
            (1..=n).map(|i| Arc::new(LocalSigner::from_seed([i; 32])) as Arc<dyn Signer>).collect();
        Committee::new(members).unwrap()
    }

    fn spec() -> SideChainSpec {
        SideChainSpec {
            address: String::new(),
            chain_id: 2,
            router: 2,
            name: "eth".into(),
            blocks_to_wait: 12,
            ccm_contract: String::new(),
        }
    }

    #[tokio::test]
    async fn test_begin_submits_proposal_with_payer() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let initiator = LocalSigner::from_seed([9; 32]);

        let begun = assembler
            .begin(&GovernanceAction::RegisterSideChain(spec()), &initiator)
            .await
            .unwrap();
        assert!(matches!(begun.first_result, Some(Ok(_))));
        assert_eq!(begun.tx.payer.as_ref().map(|p| p.signer.as_str()), Some(initiator.address()));
        assert_eq!(chain.submitted_methods(), vec!["registerSideChain"]);
    }

    #[tokio::test]
    async fn test_multisig_begin_submits_proposal() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let initiator = LocalSigner::from_seed([9; 32]);

        let begun = assembler.begin(&GovernanceAction::CommitDpos, &initiator).await.unwrap();
        assert!(matches!(begun.first_result, Some(Ok(_))));
        assert_eq!(begun.tx.payer.as_ref().map(|p| p.signer.as_str()), Some(initiator.address()));
        assert!(begun.tx.multisig.is_none());
        assert_eq!(chain.submitted_methods(), vec!["commitDpos"]);
    }

    #[tokio::test]
    async fn test_committee_vote_begin_defers_submission() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let initiator = LocalSigner::from_seed([9; 32]);
        let action = GovernanceAction::BlackNode { peer_pubkeys: vec!["02ab".into()] };

        let begun = assembler.begin(&action, &initiator).await.unwrap();
        assert!(begun.first_result.is_none());
        assert!(begun.tx.payer.is_none());
        assert!(chain.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_per_signer_resubmission_grows_signatures() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let committee = committee(4);
        let initiator = LocalSigner::from_seed([9; 32]);

        let begun = assembler.begin(&GovernanceAction::CommitDpos, &initiator).await.unwrap();
        let mut pending = assembler
            .prepare(&GovernanceAction::CommitDpos, &begun.tx, None, &committee)
            .unwrap()
            .unwrap();
        for member in committee.iter() {
            assert!(assembler.attach(&mut pending, member.as_ref()).await.unwrap().is_some());
        }

        let submissions = chain.submissions();
        assert_eq!(submissions.len(), 5);
        let counts: Vec<usize> =
            submissions.iter().skip(1).map(|tx| tx.signature_count()).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);
        assert!(submissions[1].payer.is_none());
        assert_eq!(submissions[1].multisig.as_ref().unwrap().threshold, 3);
    }

    #[tokio::test]
    async fn test_aggregation_submits_once() {
        let caps = AdapterCapabilities { supports_aggregation: true, requires_payer: true };
        let chain = Arc::new(InMemoryChain::new("relay").with_capabilities(caps));
        let assembler = MultiSigAssembler::new(chain.clone());
        let committee = committee(7);
        let initiator = LocalSigner::from_seed([9; 32]);

        let begun = assembler.begin(&GovernanceAction::CommitDpos, &initiator).await.unwrap();
        assert!(begun.tx.payer.is_some());
        let mut pending = assembler
            .prepare(&GovernanceAction::CommitDpos, &begun.tx, None, &committee)
            .unwrap()
            .unwrap();
        for member in committee.iter() {
            assert!(assembler.attach(&mut pending, member.as_ref()).await.unwrap().is_none());
        }
        assert_eq!(chain.attempts().len(), 1);

        assert!(assembler.flush(&pending).await.unwrap().is_some());
        let submissions = chain.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions[1].payer.is_some());
        let section = submissions[1].multisig.as_ref().unwrap();
        assert_eq!(section.threshold, 5);
        assert_eq!(section.signatures.len(), 7);
    }

    #[tokio::test]
    async fn test_approvals_are_independent_transactions() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let committee = committee(3);
        let initiator = LocalSigner::from_seed([9; 32]);
        let action = GovernanceAction::RegisterSideChain(spec());

        let begun = assembler.begin(&action, &initiator).await.unwrap();
        let mut pending = assembler.prepare(&action, &begun.tx, None, &committee).unwrap().unwrap();
        assert_eq!(pending.kind(), ActionKind::ApproveRegisterSideChain);
        for member in committee.iter() {
            assembler.attach(&mut pending, member.as_ref()).await.unwrap();
        }

        let approvals: Vec<SignedTx> = chain.submissions().into_iter().skip(1).collect();
        assert_eq!(approvals.len(), 3);
        for (tx, member) in approvals.iter().zip(committee.iter()) {
            assert_eq!(tx.signatures.len(), 1);
            assert_eq!(tx.last_signer(), Some(member.address()));
        }
    }

    #[tokio::test]
    async fn test_single_shape_needs_no_ratification() {
        let chain = Arc::new(InMemoryChain::new("relay"));
        let assembler = MultiSigAssembler::new(chain.clone());
        let action = GovernanceAction::QuitNode { peer_pubkey: "02ab".into() };
        let tx = SignedTx::unsigned("relay", action.to_payload().unwrap());
        assert!(assembler.prepare(&action, &tx, None, &committee(1)).unwrap().is_none());
    }
}
