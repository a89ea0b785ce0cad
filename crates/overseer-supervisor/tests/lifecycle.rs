mod common;

use common::*;
use overseer_assignment::{AssignmentEngine, PendingAssignment};
use overseer_consensus::{SelectionConfig, VerifierSelector};
use overseer_contract::ExecutionStatus;
use overseer_lifecycle::{
    ContractState, LifecycleConfig, LifecycleContract, LifecycleError, LifecycleManager,
    ProposalRequest, TransitionRequest,
};
use overseer_observability::DecisionType;
use overseer_supervisor::SupervisorConfig;
use overseer_types::{ContractId, ManualClock, RiskTolerance, Verdict};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn proposal(objective: &str) -> ProposalRequest {
    ProposalRequest {
        proposer: "alice".to_string(),
        objective: objective.to_string(),
        budget: 1_000,
        deadline_ms: 60 * MINUTE_MS,
        risk_tolerance: Some(RiskTolerance::Low),
        constraints: None,
        max_retries: None,
    }
}

async fn priced(lifecycle: &LifecycleManager, objective: &str) -> LifecycleContract {
    let contract = lifecycle.submit_proposal(proposal(objective)).await.unwrap();
    lifecycle
        .transition(TransitionRequest::new(
            contract.contract_id.clone(),
            ContractState::Priced,
            "priced",
        ))
        .await
        .unwrap();
    contract
}

async fn with_lifecycle() -> (Harness, Arc<LifecycleManager>) {
    let clock = Arc::new(ManualClock::new(0));
    let lifecycle = Arc::new(LifecycleManager::new(clock.clone(), LifecycleConfig::default()));
    let h = HarnessBuilder::new()
        .lifecycle(lifecycle.clone(), clock)
        .build()
        .await;
    (h, lifecycle)
}

async fn states(lifecycle: &LifecycleManager, id: &ContractId) -> Vec<ContractState> {
    lifecycle
        .history(id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.to)
        .collect()
}

#[tokio::test]
async fn outcomes_are_mirrored_onto_lifecycle() {
    let (h, lifecycle) = with_lifecycle().await;
    let lc = priced(&lifecycle, "index the archive").await;
    let id = lc.contract_id.clone();
    for state in [ContractState::Accepted, ContractState::Executing] {
        lifecycle
            .transition(TransitionRequest::new(id.clone(), state, "assigned"))
            .await
            .unwrap();
    }
    h.supervisor
        .register_contract(work_contract(id.as_str(), "w-a", &["v1"], 3, 60 * MINUTE_MS))
        .await
        .unwrap();
    h.supervisor.start_execution(&id).await.unwrap();

    h.clock.set(61_000);
    h.supervisor.poll_once().await;
    assert_eq!(lifecycle.state(&id).await.unwrap(), ContractState::Executing);

    h.supervisor.start_execution(&id).await.unwrap();
    h.supervisor.submit_work(&id, b"done".to_vec()).await.unwrap();
    h.supervisor
        .add_verifier_submission(&id, agent("v1"), Verdict::Pass, "ok")
        .await
        .unwrap();
    h.supervisor.poll_once().await;

    assert_eq!(
        states(&lifecycle, &id).await,
        vec![
            ContractState::Priced,
            ContractState::Accepted,
            ContractState::Executing,
            ContractState::Executing,
            ContractState::Verifying,
            ContractState::Completed,
        ]
    );
}

#[tokio::test]
async fn rejected_result_without_retries_mirrors_through_verifying() {
    let (h, lifecycle) = with_lifecycle().await;
    let lc = priced(&lifecycle, "summarize logs").await;
    let id = lc.contract_id.clone();
    for state in [ContractState::Accepted, ContractState::Executing] {
        lifecycle
            .transition(TransitionRequest::new(id.clone(), state, "assigned"))
            .await
            .unwrap();
    }
    h.supervisor
        .register_contract(work_contract(id.as_str(), "w-a", &["v1"], 0, 60 * MINUTE_MS))
        .await
        .unwrap();
    h.supervisor.start_execution(&id).await.unwrap();
    h.supervisor.submit_work(&id, b"wrong".to_vec()).await.unwrap();
    h.supervisor
        .add_verifier_submission(&id, agent("v1"), Verdict::Fail, "incorrect")
        .await
        .unwrap();
    h.supervisor.poll_once().await;

    assert_eq!(lifecycle.state(&id).await.unwrap(), ContractState::Failed);
    let history = lifecycle.history(&id).await.unwrap();
    let last = &history[history.len() - 1];
    assert_eq!(last.from, ContractState::Verifying);
    assert_eq!(last.event_type, "contract_failed");
}

#[tokio::test]
async fn assignment_hands_contracts_to_supervisor() {
    let (h, lifecycle) = with_lifecycle().await;
    let selector = Arc::new(VerifierSelector::new(h.registry.clone(), SelectionConfig::default()));
    let engine = AssignmentEngine::new(
        lifecycle.clone(),
        selector,
        h.enforcer.clone(),
        h.supervisor.clone(),
        h.clock.clone(),
    );

    let lc = priced(&lifecycle, "transcode video").await;
    let id = lc.contract_id.clone();
    let task_id = engine
        .queue_assignment(PendingAssignment::from_contract(&lc))
        .await
        .unwrap();

    let offered = engine
        .poll_for_assignment(&agent("w-a"), &BTreeSet::new(), 0)
        .await
        .unwrap();
    assert_eq!(offered.task_id, task_id);
    let accepted = engine.accept_assignment(&task_id, &agent("w-a")).await.unwrap();
    assert_eq!(accepted.verifiers.len(), 1);

    let supervised = h.supervisor.get(&id).await.unwrap();
    assert_eq!(supervised.status, ExecutionStatus::Assigned);
    assert_eq!(supervised.worker, agent("w-a"));
    assert_eq!(supervised.terms().budget, 1_000);
    assert_eq!(lifecycle.state(&id).await.unwrap(), ContractState::Executing);

    // A second hand-over of the same contract is refused
    assert!(engine.accept_assignment(&task_id, &agent("w-b")).await.is_err());

    h.supervisor.start_execution(&id).await.unwrap();
    engine.submit_result(&task_id, b"frames".to_vec()).await.unwrap();
    let verifier = accepted.verifiers[0].clone();
    h.supervisor
        .add_verifier_submission(&id, verifier, Verdict::Pass, "frames match")
        .await
        .unwrap();

    h.clock.set(5_000);
    let report = h.supervisor.poll_once().await;
    assert_eq!(report.completed, 1);
    assert_eq!(lifecycle.state(&id).await.unwrap(), ContractState::Completed);
}

#[tokio::test]
async fn safe_mode_gates_proposals_until_rates_recover() {
    let h = harness().await;
    let gated = LifecycleManager::new(h.clock.clone(), LifecycleConfig::default())
        .with_gate(h.health.clone());

    for n in 0..5 {
        let id = format!("ctr-bad-{n}");
        h.supervisor
            .register_contract(work_contract(&id, "w-a", &["v1"], 0, 60 * MINUTE_MS))
            .await
            .unwrap();
        h.supervisor.start_execution(&ContractId::new(&id)).await.unwrap();
    }
    h.clock.set(61_000);
    let report = h.supervisor.poll_once().await;
    assert_eq!(report.failed, 5);
    assert!(h.health.is_safe_mode());
    assert!(matches!(
        gated.submit_proposal(proposal("blocked")).await,
        Err(LifecycleError::SafeModeActive)
    ));

    // Staying unhealthy records nothing new
    h.supervisor.poll_once().await;
    assert_eq!(h.trace.by_type(DecisionType::SafeModeEntered).await.len(), 1);
    assert_eq!(h.metrics.contract_metrics().safe_mode_entries, 1);

    for n in 0..6 {
        let id = ContractId::new(format!("ctr-good-{n}"));
        h.supervisor
            .register_contract(work_contract(id.as_str(), "w-b", &["v1"], 3, 60 * MINUTE_MS))
            .await
            .unwrap();
        h.supervisor.start_execution(&id).await.unwrap();
        h.supervisor.submit_work(&id, b"ok".to_vec()).await.unwrap();
        h.supervisor
            .add_verifier_submission(&id, agent("v1"), Verdict::Pass, "ok")
            .await
            .unwrap();
    }
    let report = h.supervisor.poll_once().await;
    assert_eq!(report.completed, 6);
    assert!(!h.health.is_safe_mode());
    h.supervisor.poll_once().await;
    assert_eq!(h.trace.by_type(DecisionType::SafeModeExited).await.len(), 1);

    assert!(gated.submit_proposal(proposal("allowed")).await.is_ok());
}

#[tokio::test]
async fn run_loop_polls_until_shutdown() {
    let config = SupervisorConfig {
        poll_interval_ms: 10,
        ..Default::default()
    };
    let h = HarnessBuilder::new().config(config).build().await;
    h.supervisor
        .register_contract(work_contract("ctr-loop", "w-a", &["v1"], 3, 5_000))
        .await
        .unwrap();
    h.clock.set(6_000);

    let (tx, rx) = watch::channel(false);
    let supervisor = h.supervisor.clone();
    let handle = tokio::spawn(async move { supervisor.run(rx).await });

    let mut timed_out = false;
    for _ in 0..100 {
        if h.contract("ctr-loop").await.status == ExecutionStatus::Timeout {
            timed_out = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(timed_out);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("supervisor did not stop")
        .unwrap();
}
