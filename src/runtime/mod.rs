//! Protocol runtime: assembly, confirmation, orchestration and command plans.

pub mod assembler;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod waiter;

pub use assembler::{Begun, MultiSigAssembler, PendingTx};
pub use orchestrator::{ActionHandle, GovernanceOrchestrator, ProposeOutcome, TerminalOutcome};
pub use plan::{
    execute, Initiator, OnFatal, Plan, PlanReport, PlanSigners, Step, StepMode, StepReport,
};
pub use registry::{
    CommandContext, CommandKind, CommandRegistry, CommandSpec, Requirements, StorageQuery,
};
pub use waiter::ConfirmationWaiter;
