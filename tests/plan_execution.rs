use std::sync::Arc;
use std::time::Duration;

use quorum_gov::action::SideChainSpec;
use quorum_gov::adapters::{ChainAdapter, InMemoryChain};
use quorum_gov::committee::{Committee, Signer};
use quorum_gov::error::GovernanceError;
use quorum_gov::runtime::{
    execute, CommandContext, CommandKind, CommandRegistry, ConfirmationWaiter,
    GovernanceOrchestrator, Plan, PlanSigners, TerminalOutcome,
};
use quorum_gov::wallet::{load_committee, Keystore, LocalSigner, WalletRef};

fn signer(seed: u8) -> Arc<dyn Signer> {
    Arc::new(LocalSigner::from_seed([seed; 32]))
}

fn signers(with_target: bool) -> PlanSigners {
    let members: Vec<Arc<dyn Signer>> = (1..=4).map(signer).collect();
    PlanSigners {
        operator: Some(signer(0xA0)),
        target: if with_target { Some(signer(0xB0)) } else { None },
        committee: Some(Committee::new(members).unwrap()),
    }
}

fn context(signers: &PlanSigners) -> CommandContext {
    let side_chain = |chain_id: u64, name: &str| SideChainSpec {
        address: String::new(),
        chain_id,
        router: chain_id,
        name: name.into(),
        blocks_to_wait: 1,
        ccm_contract: String::new(),
    };
    CommandContext {
        side_chains: vec![side_chain(1, "btc"), side_chain(2, "eth"), side_chain(3, "ont")],
        operator_address: signers.operator.as_ref().map(|s| s.address().to_string()),
        target_address: signers.target.as_ref().map(|s| s.address().to_string()),
        target_public_key: signers.target.as_ref().map(|s| hex::encode(s.public_key())),
        ..Default::default()
    }
}

fn build(name: &str, ctx: &CommandContext) -> Plan {
    match CommandRegistry::standard().get(name).unwrap().kind {
        CommandKind::Governance(build) => build(ctx).unwrap(),
        CommandKind::Query(_) => panic!("{} is a query", name),
    }
}

fn orchestrator(chain: &Arc<InMemoryChain>) -> GovernanceOrchestrator {
    let waiter = ConfirmationWaiter::new(Duration::from_millis(1), 5);
    GovernanceOrchestrator::new(chain.clone()).with_waiter(waiter)
}

#[tokio::test]
async fn test_register_side_chain_continues_after_fatal() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    chain.reject_times("registerSideChain", "invalid router type", 1);
    let signers = signers(false);
    let plan = build("register_side_chain", &context(&signers));

    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();

    assert_eq!(report.steps.len(), 3);
    assert!(report.steps[0].outcome.is_fatal());
    assert!(matches!(report.steps[1].outcome, TerminalOutcome::Finalized(_)));
    assert!(matches!(report.steps[2].outcome, TerminalOutcome::Finalized(_)));
    assert!(report.has_fatal());
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn test_add_node_halts_before_commit() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    chain.reject("approveCandidate", "peer pubkey is not in the pool");
    let signers = signers(true);
    let plan = build("add_node", &context(&signers));

    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();

    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.skipped, 1);
    assert!(!chain.submitted_methods().iter().any(|m| m == "commitDpos"));
}

#[tokio::test]
async fn test_add_node_registers_approves_and_commits() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    let signers = signers(true);
    let plan = build("add_node", &context(&signers));

    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();

    assert!(!report.has_fatal());
    let methods = chain.submitted_methods();
    assert_eq!(methods[0], "registerCandidate");
    assert_eq!(methods.iter().filter(|m| *m == "approveCandidate").count(), 4);
    // proposal by the first committee member, then one resubmission per member
    assert_eq!(methods.iter().filter(|m| *m == "commitDpos").count(), 5);
    let target = signers.target.as_ref().unwrap();
    assert_eq!(chain.submissions()[0].last_signer(), Some(target.address()));
}

#[tokio::test]
async fn test_add_node_approves_already_registered_candidate() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    chain.reject("registerCandidate", "registerCandidate, peer already registered");
    let signers = signers(true);
    let plan = build("add_node", &context(&signers));

    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();

    assert!(!report.has_fatal());
    assert_eq!(report.steps.len(), 2);
    let methods = chain.submitted_methods();
    assert_eq!(methods.iter().filter(|m| *m == "approveCandidate").count(), 4);
    assert_eq!(methods.iter().filter(|m| *m == "commitDpos").count(), 5);
}

#[tokio::test]
async fn test_reg_node_needs_no_committee() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    let mut signers = signers(true);
    signers.committee = None;
    let plan = build("reg_node", &context(&signers));

    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();

    assert!(matches!(report.steps[0].outcome, TerminalOutcome::Finalized(_)));
    assert_eq!(chain.submitted_methods(), vec!["registerCandidate"]);
}

#[tokio::test]
async fn test_missing_committee_fails_before_submitting() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    let mut signers = signers(false);
    signers.committee = None;
    let plan = build("commit_dpos", &context(&signers));

    let err = execute(&orchestrator(&chain), &plan, &signers).await.unwrap_err();

    assert!(matches!(err, GovernanceError::Config { .. }));
    assert!(chain.attempts().is_empty());
}

#[tokio::test]
async fn test_storage_query() {
    let chain = Arc::new(InMemoryChain::new("poly"));
    let signers = signers(false);
    let mut ctx = context(&signers);
    ctx.chain_id = Some(2);

    let query = match CommandRegistry::standard().get("get_side_chain").unwrap().kind {
        CommandKind::Query(q) => q(&ctx).unwrap(),
        CommandKind::Governance(_) => panic!("get_side_chain is a query"),
    };
    assert_eq!(chain.query_storage(query.contract, &query.key).await.unwrap(), None);
    chain.set_storage(query.contract, &query.key, vec![0xAB]);
    assert_eq!(chain.query_storage(query.contract, &query.key).await.unwrap(), Some(vec![0xAB]));
}

#[tokio::test]
async fn test_committee_from_keystores() {
    let dir = std::env::temp_dir().join(format!("quorum-gov-plan-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut wallets = Vec::new();
    for i in 1..=3u8 {
        let path = dir.join(format!("w{}.json", i));
        Keystore::create(&[i; 32], &format!("pwd{}", i), 16).unwrap().save(&path).unwrap();
        wallets.push(WalletRef::new(path, format!("pwd{}", i)));
    }
    let committee = load_committee(&wallets).unwrap();
    assert_eq!(committee.len(), 3);
    assert_eq!(committee.addresses()[0], LocalSigner::from_seed([1; 32]).address());

    let chain = Arc::new(InMemoryChain::new("poly"));
    let signers = PlanSigners {
        operator: Some(signer(0xA0)),
        target: None,
        committee: Some(committee),
    };
    let plan = build("commit_dpos", &context(&signers));
    let report = execute(&orchestrator(&chain), &plan, &signers).await.unwrap();
    assert!(!report.has_fatal());

    wallets[1].password = "wrong".into();
    assert!(load_committee(&wallets).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
