//! # Quorum-Gov
//!
//! Quorum-gated governance transactions for a cross-chain relay chain.
//!
//! Every governance command of the operator tool (side-chain registration, relayer
//! changes, consensus node management, config updates) is the same two-phase protocol:
//! one identity *proposes*, then each member of a fixed committee *ratifies* by
//! signing and submitting, and the tool waits for the chain to report finality.
//! "This already happened" answers from the chain are classified and treated as
//! success instead of failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quorum_gov::{
//!     Committee, GovernanceAction, GovernanceOrchestrator, InMemoryChain, LocalSigner, Signer,
//! };
//!
//! # async fn run() -> quorum_gov::Result<()> {
//! let chain = Arc::new(InMemoryChain::new("poly"));
//! let members: Vec<Arc<dyn Signer>> = (1..=7u8)
//!     .map(|i| Arc::new(LocalSigner::from_seed([i; 32])) as Arc<dyn Signer>)
//!     .collect();
//! let committee = Committee::new(members)?;
//! let operator = LocalSigner::from_seed([0; 32]);
//!
//! let orchestrator = GovernanceOrchestrator::new(chain);
//! let outcome = orchestrator
//!     .run_to_completion(&GovernanceAction::QuitSideChain { chain_id: 2 }, &operator, &committee)
//!     .await;
//! assert!(!outcome.is_fatal());
//! # Ok(())
//! # }
//! ```
//!
//! ## Threshold
//!
//! A committee of `N` needs `T = ceil(5N / 7)` signatures on multi-signed
//! transactions; see [`utils::threshold`].

pub mod action;
pub mod adapters;
pub mod committee;
pub mod config;
pub mod error;
pub mod policy;
pub mod runtime;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod wallet;

pub use action::{ActionKind, ConsensusConfig, GovernanceAction, ProtocolShape, SideChainSpec};
pub use adapters::{decode_handle_id, AdapterCapabilities, ChainAdapter, InMemoryChain};
#[cfg(feature = "rpc")]
pub use adapters::JsonRpcChain;
pub use committee::{Committee, Signer};
pub use config::ToolConfig;
pub use error::{ActionFailure, GovernanceError, Phase, Result};
pub use policy::{Classification, IdempotencyClassifier, PhraseRule};
pub use runtime::{
    ActionHandle, ConfirmationWaiter, GovernanceOrchestrator, MultiSigAssembler, ProposeOutcome,
    TerminalOutcome,
};
pub use types::{Confirmation, NotificationRecord, SignedTx, TxHash, TxPayload, TxStatus};
pub use utils::threshold;
pub use wallet::{load_committee, parse_wallet_list, Keystore, LocalSigner, WalletRef};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn committee(n: u8) -> Committee {
        let members: Vec<Arc<dyn Signer>> =
            (1..=n).map(|i| Arc::new(LocalSigner::from_seed([i; 32])) as Arc<dyn Signer>).collect();
        Committee::new(members).unwrap()
    }

    #[tokio::test]
    async fn test_full_flow() {
        let chain = Arc::new(InMemoryChain::new("poly").confirm_after(2));
        let orchestrator = GovernanceOrchestrator::new(chain.clone())
            .with_waiter(ConfirmationWaiter::new(Duration::from_millis(1), 5));
        let operator = LocalSigner::from_seed([0; 32]);

        let action = GovernanceAction::QuitSideChain { chain_id: 2 };
        let outcome = orchestrator.run_to_completion(&action, &operator, &committee(4)).await;

        assert!(matches!(outcome, TerminalOutcome::Finalized(_)));
        assert_eq!(
            chain.submitted_methods(),
            vec![
                "quitSideChain",
                "approveQuitSideChain",
                "approveQuitSideChain",
                "approveQuitSideChain",
                "approveQuitSideChain"
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_vote_aborts_ratification() {
        let chain = Arc::new(InMemoryChain::new("poly"));
        chain.reject("blackNode", "blackNode, node already blacked");
        let orchestrator = GovernanceOrchestrator::new(chain.clone())
            .with_waiter(ConfirmationWaiter::new(Duration::from_millis(1), 5));
        let committee = committee(3);
        let first = committee.iter().next().unwrap().clone();

        let action = GovernanceAction::BlackNode { peer_pubkeys: vec!["02ab".into()] };

        let outcome = orchestrator.run_to_completion(&action, first.as_ref(), &committee).await;

        match outcome {
            TerminalOutcome::Fatal(failure) => {
                assert_eq!(failure.phase, Phase::Ratify);
                assert_eq!(failure.member, Some(1));
            }
            other => panic!("expected fatal outcome, got {:?}", other),
        }
        assert_eq!(chain.attempts().len(), 1);
    }
}
