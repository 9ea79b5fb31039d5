//! Ordered governance steps produced by a command, and their execution.

use std::sync::Arc;
use tracing::{error, info};

use crate::action::{GovernanceAction, ProtocolShape};
use crate::committee::{Committee, Signer};
use crate::error::{GovernanceError, Result};
use crate::runtime::orchestrator::{GovernanceOrchestrator, TerminalOutcome};

/// Which identity submits a step's proposal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Initiator {
    /// The operator wallet from the configuration
    Operator,
    /// The wallet being added, removed or acted on (`--newwallet`)
    Target,
    /// The first committee member
    Committee,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepMode {
    /// Propose, then ratify with the committee
    Full,
    /// Propose only; no committee involvement
    ProposeOnly,
}

#[derive(Clone, Debug)]
pub struct Step {
    pub action: GovernanceAction,
    pub initiator: Initiator,
    pub mode: StepMode,
}

impl Step {
    pub fn full(action: GovernanceAction, initiator: Initiator) -> Self {
        Self { action, initiator, mode: StepMode::Full }
    }

    pub fn propose_only(action: GovernanceAction, initiator: Initiator) -> Self {
        Self { action, initiator, mode: StepMode::ProposeOnly }
    }

    /// Whether executing this step needs committee signatures.
    pub fn needs_committee(&self) -> bool {
        self.mode == StepMode::Full && self.action.shape() != ProtocolShape::Single
    }
}

/// What to do with the remaining steps after one ends Fatal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OnFatal {
    /// Later steps depend on earlier ones
    Halt,
    /// Steps are independent of each other
    Continue,
}

#[derive(Clone, Debug)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub on_fatal: OnFatal,
}

impl Plan {
    pub fn single(step: Step) -> Self {
        Self { steps: vec![step], on_fatal: OnFatal::Halt }
    }

    pub fn halting(steps: Vec<Step>) -> Self {
        Self { steps, on_fatal: OnFatal::Halt }
    }

    pub fn independent(steps: Vec<Step>) -> Self {
        Self { steps, on_fatal: OnFatal::Continue }
    }
}

/// Identities available to a plan.
#[derive(Clone, Default)]
pub struct PlanSigners {
    pub operator: Option<Arc<dyn Signer>>,
    pub target: Option<Arc<dyn Signer>>,
    pub committee: Option<Committee>,
}

impl PlanSigners {
    fn initiator(&self, initiator: Initiator) -> Result<Arc<dyn Signer>> {
        let signer = match initiator {
            Initiator::Operator => self.operator.clone(),
            Initiator::Target => self.target.clone(),
            Initiator::Committee => self.committee.as_ref().and_then(|c| c.iter().next().cloned()),
        };
        signer.ok_or_else(|| GovernanceError::Config {
            reason: format!("no {:?} wallet configured", initiator).to_lowercase(),
        })
    }

    fn committee(&self) -> Result<&Committee> {
        self.committee.as_ref().ok_or_else(|| GovernanceError::Config {
            reason: "committee wallets are required (--pwallets/--ppwds)".into(),
        })
    }
}

/// Outcome of one step.
#[derive(Debug)]
pub struct StepReport {
    pub action: GovernanceAction,
    pub outcome: TerminalOutcome,
}

#[derive(Debug, Default)]
pub struct PlanReport {
    pub steps: Vec<StepReport>,
    /// Steps not attempted because an earlier step ended Fatal
    pub skipped: usize,
}

impl PlanReport {
    pub fn has_fatal(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_fatal())
    }
}

/// Check that every identity the plan needs is present, before anything is submitted.
pub fn check_signers(plan: &Plan, signers: &PlanSigners) -> Result<()> {
    for step in &plan.steps {
        signers.initiator(step.initiator)?;
        if step.needs_committee() {
            signers.committee()?;
        }
    }
    Ok(())
}

/// Run the plan's steps in order.
pub async fn execute(
    orchestrator: &GovernanceOrchestrator,
    plan: &Plan,
    signers: &PlanSigners,
) -> Result<PlanReport> {
    check_signers(plan, signers)?;

    let mut report = PlanReport::default();
    for (i, step) in plan.steps.iter().enumerate() {
        let initiator = signers.initiator(step.initiator)?;
        let outcome = match step.mode {
            StepMode::ProposeOnly => {
                orchestrator.propose_only(&step.action, initiator.as_ref()).await
            }
            StepMode::Full if step.action.shape() == ProtocolShape::Single => {
                orchestrator.propose_only(&step.action, initiator.as_ref()).await
            }
            StepMode::Full => {
                orchestrator
                    .run_to_completion(&step.action, initiator.as_ref(), signers.committee()?)
                    .await
            }
        };

        match &outcome {
            TerminalOutcome::Finalized(c) => info!(
                action = %step.action.kind(),
                tx_hash = %c.tx_hash,
                height = c.finalized_at,
                "step finalized"
            ),
            TerminalOutcome::AlreadyApplied(reason) => {
                info!(action = %step.action.kind(), %reason, "step already applied")
            }
            TerminalOutcome::AlreadyPending(reason) => {
                info!(action = %step.action.kind(), %reason, "step already pending")
            }
            TerminalOutcome::Fatal(failure) => error!(%failure, "step failed"),
        }

        let fatal = outcome.is_fatal();
        report.steps.push(StepReport { action: step.action.clone(), outcome });
        if fatal && plan.on_fatal == OnFatal::Halt {
            report.skipped = plan.steps.len() - i - 1;
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committee_need_follows_shape() {
        let approve = Step::full(
            GovernanceAction::ApproveQuitSideChain { chain_id: 1 },
            Initiator::Operator,
        );
        assert!(!approve.needs_committee());
        let commit = Step::full(GovernanceAction::CommitDpos, Initiator::Committee);
        assert!(commit.needs_committee());
        let reg = Step::propose_only(
            GovernanceAction::RegisterCandidate { peer_pubkey: "02".into() },
            Initiator::Target,
        );
        assert!(!reg.needs_committee());
    }

    #[test]
    fn test_missing_signers_reported_before_execution() {
        let plan = Plan::single(Step::full(GovernanceAction::CommitDpos, Initiator::Committee));
        let err = check_signers(&plan, &PlanSigners::default()).unwrap_err();
        assert!(matches!(err, GovernanceError::Config { .. }));

        let plan = Plan::single(Step::propose_only(
            GovernanceAction::UnregisterCandidate { peer_pubkey: "02".into() },
            Initiator::Target,
        ));
        let err = check_signers(&plan, &PlanSigners::default()).unwrap_err();
        assert!(err.to_string().contains("target"));
    }
}
