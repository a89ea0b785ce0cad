use async_trait::async_trait;
use overseer_assignment::{
    AssignmentEngine, AssignmentError, AssignmentStatus, ContractSink, PendingAssignment,
};
use overseer_consensus::{SelectionConfig, VerifierSelector};
use overseer_contract::WorkContract;
use overseer_lifecycle::{
    ContractState, LifecycleConfig, LifecycleManager, ProposalRequest, TransitionRequest,
};
use overseer_types::{
    AgentId, AgentProfile, ContractId, EnforcementAction, Enforcer, ManualClock, MemoryRegistry,
    RecordingEnforcer, RiskTolerance, TaskId,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingSink {
    contracts: Mutex<Vec<WorkContract>>,
    results: Mutex<Vec<(ContractId, Vec<u8>)>>,
    down: AtomicBool,
}

#[async_trait]
impl ContractSink for RecordingSink {
    async fn hand_over(&self, contract: WorkContract) -> overseer_assignment::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AssignmentError::Handover("down".to_string()));
        }
        self.contracts.lock().await.push(contract);
        Ok(())
    }

    async fn submit_result(
        &self,
        contract_id: &ContractId,
        result: Vec<u8>,
    ) -> overseer_assignment::Result<()> {
        self.results.lock().await.push((contract_id.clone(), result));
        Ok(())
    }
}

struct Harness {
    engine: AssignmentEngine,
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<MemoryRegistry>,
    enforcer: Arc<RecordingEnforcer>,
    sink: Arc<RecordingSink>,
}

async fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(1_000));
    let lifecycle = Arc::new(LifecycleManager::new(clock.clone(), LifecycleConfig::default()));
    let registry = Arc::new(MemoryRegistry::new());
    for (id, op, rep) in [("v1", "op-a", 90.0), ("v2", "op-b", 85.0), ("v3", "op-c", 82.0)] {
        registry
            .register(
                AgentProfile::new(id, op, rep)
                    .with_capability("verification")
                    .with_fee(20),
            )
            .await;
    }
    let enforcer = Arc::new(RecordingEnforcer::new());
    let sink = Arc::new(RecordingSink::default());
    let selector = Arc::new(VerifierSelector::new(registry.clone(), SelectionConfig::default()));
    let engine = AssignmentEngine::new(
        lifecycle.clone(),
        selector,
        enforcer.clone(),
        sink.clone(),
        clock,
    );
    Harness {
        engine,
        lifecycle,
        registry,
        enforcer,
        sink,
    }
}

async fn priced_task(
    h: &Harness,
    budget: u64,
    deadline_ms: u64,
    risk: RiskTolerance,
    capabilities: &[&str],
) -> PendingAssignment {
    let contract = h
        .lifecycle
        .submit_proposal(ProposalRequest {
            proposer: "alice".to_string(),
            objective: format!("job {budget} {deadline_ms}"),
            budget,
            deadline_ms,
            risk_tolerance: Some(risk),
            constraints: Some(overseer_lifecycle::ProposalConstraints {
                required_capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
                resource_limits: None,
            }),
            max_retries: Some(2),
        })
        .await
        .unwrap();
    h.lifecycle
        .transition(TransitionRequest::new(
            contract.contract_id.clone(),
            ContractState::Priced,
            "priced",
        ))
        .await
        .unwrap();
    let contract = h.lifecycle.get(&contract.contract_id).await.unwrap();
    PendingAssignment::from_contract(&contract)
}

fn caps(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn poll_offers_earliest_deadline_then_highest_budget() {
    let h = harness().await;
    let late = priced_task(&h, 500, 900_000, RiskTolerance::Low, &[]).await;
    let early_cheap = priced_task(&h, 100, 500_000, RiskTolerance::Low, &[]).await;
    let early_rich = priced_task(&h, 400, 500_000, RiskTolerance::Low, &[]).await;
    for t in [late.clone(), early_cheap.clone(), early_rich.clone()] {
        h.engine.queue_assignment(t).await.unwrap();
    }

    let open: Vec<_> = h.engine.open_tasks().await.into_iter().map(|t| t.task_id).collect();
    assert_eq!(open, vec![early_rich.task_id.clone(), early_cheap.task_id, late.task_id]);

    let offered = h
        .engine
        .poll_for_assignment(&AgentId::new("w1"), &caps(&[]), 0)
        .await
        .unwrap();
    assert_eq!(offered.task_id, early_rich.task_id);
}

#[tokio::test]
async fn poll_filters_by_capabilities_and_fee() {
    let h = harness().await;
    let gpu = priced_task(&h, 1_000, 500_000, RiskTolerance::Low, &["gpu"]).await;
    let cheap = priced_task(&h, 50, 600_000, RiskTolerance::Low, &[]).await;
    h.engine.queue_assignment(gpu.clone()).await.unwrap();
    h.engine.queue_assignment(cheap.clone()).await.unwrap();

    let worker = AgentId::new("w1");
    assert_eq!(
        h.engine.poll_for_assignment(&worker, &caps(&[]), 0).await.unwrap().task_id,
        cheap.task_id
    );
    assert!(h.engine.poll_for_assignment(&worker, &caps(&[]), 100).await.is_none());
    assert_eq!(
        h.engine
            .poll_for_assignment(&worker, &caps(&["gpu", "cuda"]), 100)
            .await
            .unwrap()
            .task_id,
        gpu.task_id
    );
}

#[tokio::test]
async fn reserved_task_only_visible_to_designated_worker() {
    let h = harness().await;
    let public = priced_task(&h, 100, 300_000, RiskTolerance::Low, &[]).await;
    let direct = priced_task(&h, 100, 900_000, RiskTolerance::Low, &[])
        .await
        .reserved_for(AgentId::new("w-hired"));
    h.engine.queue_assignment(public.clone()).await.unwrap();
    h.engine.queue_assignment(direct.clone()).await.unwrap();
    assert_eq!(h.engine.queue_len().await, 1);

    let hired = h
        .engine
        .poll_for_assignment(&AgentId::new("w-hired"), &caps(&[]), 0)
        .await
        .unwrap();
    assert_eq!(hired.task_id, direct.task_id);

    let other = h
        .engine
        .poll_for_assignment(&AgentId::new("w-other"), &caps(&[]), 0)
        .await
        .unwrap();
    assert_eq!(other.task_id, public.task_id);

    assert!(matches!(
        h.engine
            .accept_assignment(&direct.task_id, &AgentId::new("w-other"))
            .await,
        Err(AssignmentError::NotReservedWorker { .. })
    ));
}

#[tokio::test]
async fn accept_hands_contract_to_supervisor() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::Medium, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();

    let worker = AgentId::new("w1");
    let contract = h.engine.accept_assignment(&task.task_id, &worker).await.unwrap();

    assert_eq!(contract.worker, worker);
    assert_eq!(contract.verifiers.len(), 2);
    assert_eq!(contract.terms().budget, 300);
    assert_eq!(contract.terms().max_retries, 2);
    assert_eq!(
        h.lifecycle.state(&task.contract_id).await.unwrap(),
        ContractState::Executing
    );
    assert_eq!(h.sink.contracts.lock().await.len(), 1);
    assert_eq!(h.engine.queue_len().await, 0);
    assert_eq!(
        h.engine.task(&task.task_id).await.unwrap().status,
        AssignmentStatus::Assigned
    );

    // Accepting twice fails
    assert!(matches!(
        h.engine.accept_assignment(&task.task_id, &AgentId::new("w2")).await,
        Err(AssignmentError::TaskNotOpen { .. })
    ));

    h.engine
        .submit_result(&task.task_id, b"result".to_vec())
        .await
        .unwrap();
    assert_eq!(h.sink.results.lock().await[0].0, task.contract_id);
}

#[tokio::test]
async fn verifier_shortage_leaves_task_open() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::High, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();

    // The worker itself is one of the three verifiers, leaving two
    let err = h
        .engine
        .accept_assignment(&task.task_id, &AgentId::new("v1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AssignmentError::Consensus(_)));

    let stored = h.engine.task(&task.task_id).await.unwrap();
    assert_eq!(stored.status, AssignmentStatus::Open);
    assert_eq!(h.engine.queue_len().await, 1);
    assert_eq!(
        h.lifecycle.state(&task.contract_id).await.unwrap(),
        ContractState::Priced
    );

    h.registry
        .register(AgentProfile::new("v4", "op-d", 88.0).with_fee(20))
        .await;
    assert!(h
        .engine
        .accept_assignment(&task.task_id, &AgentId::new("v1"))
        .await
        .is_ok());
}

#[tokio::test]
async fn quarantined_worker_gets_nothing() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::Low, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();

    let worker = AgentId::new("w-bad");
    h.enforcer
        .enforce(EnforcementAction::Quarantine {
            worker: worker.clone(),
            until_ms: 1_000_000,
            reason: "stall".to_string(),
        })
        .await
        .unwrap();

    assert!(h.engine.poll_for_assignment(&worker, &caps(&[]), 0).await.is_none());
    assert!(matches!(
        h.engine.accept_assignment(&task.task_id, &worker).await,
        Err(AssignmentError::WorkerQuarantined(_))
    ));
}

#[tokio::test]
async fn queue_requires_priced_contract() {
    let h = harness().await;
    let contract = h
        .lifecycle
        .submit_proposal(ProposalRequest {
            proposer: "bob".to_string(),
            objective: "unpriced".to_string(),
            budget: 10,
            deadline_ms: 50_000,
            risk_tolerance: None,
            constraints: None,
            max_retries: None,
        })
        .await
        .unwrap();
    let err = h
        .engine
        .queue_assignment(PendingAssignment::from_contract(&contract))
        .await
        .unwrap_err();
    assert!(matches!(err, AssignmentError::InvalidLifecycleState { .. }));
}

#[tokio::test]
async fn failed_handover_keeps_task_assignable() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::Medium, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();
    h.sink.down.store(true, Ordering::SeqCst);

    let worker = AgentId::new("w1");
    let err = h.engine.accept_assignment(&task.task_id, &worker).await.unwrap_err();
    assert!(matches!(err, AssignmentError::Handover(ref msg) if msg == "down"));

    let stored = h.engine.task(&task.task_id).await.unwrap();
    assert_eq!(stored.status, AssignmentStatus::Open);
    assert!(stored.assigned_to.is_none());
    assert_eq!(h.engine.queue_len().await, 1);
    assert_eq!(
        h.lifecycle.state(&task.contract_id).await.unwrap(),
        ContractState::Accepted
    );
    assert!(h.sink.contracts.lock().await.is_empty());
    assert!(matches!(
        h.engine.submit_result(&task.task_id, b"early".to_vec()).await,
        Err(AssignmentError::TaskNotAssigned(_))
    ));

    // Offered again and accepted once the supervisor is back
    let offered = h.engine.poll_for_assignment(&worker, &caps(&[]), 0).await.unwrap();
    assert_eq!(offered.task_id, task.task_id);
    h.sink.down.store(false, Ordering::SeqCst);
    h.engine.accept_assignment(&task.task_id, &worker).await.unwrap();
    assert_eq!(
        h.lifecycle.state(&task.contract_id).await.unwrap(),
        ContractState::Executing
    );
    assert_eq!(h.engine.queue_len().await, 0);
}

#[tokio::test]
async fn contract_is_queued_under_one_task_only() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::Low, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();

    let mut again = task.clone();
    again.task_id = TaskId::new("task-again");
    let err = h.engine.queue_assignment(again).await.unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::ContractAlreadyQueued { ref task_id, .. } if *task_id == task.task_id
    ));
    assert_eq!(h.engine.queue_len().await, 1);

    h.engine
        .accept_assignment(&task.task_id, &AgentId::new("w1"))
        .await
        .unwrap();
    assert_eq!(h.sink.contracts.lock().await.len(), 1);
}

#[tokio::test]
async fn accept_rejects_contract_already_executing() {
    let h = harness().await;
    let task = priced_task(&h, 300, 500_000, RiskTolerance::Low, &[]).await;
    h.engine.queue_assignment(task.clone()).await.unwrap();

    // Someone else moved the lifecycle contract on after it was queued
    for state in [ContractState::Accepted, ContractState::Executing] {
        h.lifecycle
            .transition(TransitionRequest::new(task.contract_id.clone(), state, "elsewhere"))
            .await
            .unwrap();
    }

    let err = h
        .engine
        .accept_assignment(&task.task_id, &AgentId::new("w1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::InvalidLifecycleState { state: ContractState::Executing, .. }
    ));
    assert!(h.sink.contracts.lock().await.is_empty());
    assert_eq!(
        h.engine.task(&task.task_id).await.unwrap().status,
        AssignmentStatus::Open
    );
}
