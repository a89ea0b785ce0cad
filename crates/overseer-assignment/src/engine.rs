use crate::error::{AssignmentError, Result};
use crate::queue::TaskQueue;
use crate::types::{AssignmentStatus, PendingAssignment};
use async_trait::async_trait;
use overseer_consensus::VerifierSelector;
use overseer_contract::{ContractDefaults, ContractTerms, WorkContract};
use overseer_lifecycle::{ContractState, LifecycleManager, TransitionRequest};
use overseer_types::{AgentId, Clock, ContractId, Enforcer, TaskId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Receiver of accepted contracts (the execution supervisor).
#[async_trait]
pub trait ContractSink: Send + Sync {
    async fn hand_over(&self, contract: WorkContract) -> Result<()>;

    async fn submit_result(&self, contract_id: &ContractId, result: Vec<u8>) -> Result<()>;
}

#[derive(Default)]
struct AssignmentState {
    tasks: HashMap<TaskId, PendingAssignment>,
    queue: TaskQueue,
    reserved: HashMap<AgentId, Vec<TaskId>>,
    /// A contract is offered under one task only.
    by_contract: HashMap<ContractId, TaskId>,
}

pub struct AssignmentEngine {
    state: RwLock<AssignmentState>,
    lifecycle: Arc<LifecycleManager>,
    selector: Arc<VerifierSelector>,
    enforcer: Arc<dyn Enforcer>,
    sink: Arc<dyn ContractSink>,
    clock: Arc<dyn Clock>,
    defaults: ContractDefaults,
}

impl AssignmentEngine {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        selector: Arc<VerifierSelector>,
        enforcer: Arc<dyn Enforcer>,
        sink: Arc<dyn ContractSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(AssignmentState::default()),
            lifecycle,
            selector,
            enforcer,
            sink,
            clock,
            defaults: ContractDefaults::default(),
        }
    }

    pub fn with_contract_defaults(mut self, defaults: ContractDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Queue a task for a lifecycle contract that is `PRICED` or `ACCEPTED`.
    /// Reserved tasks are kept out of the public queue.
    pub async fn queue_assignment(&self, task: PendingAssignment) -> Result<TaskId> {
        let state = self.lifecycle.state(&task.contract_id).await?;
        if !matches!(state, ContractState::Priced | ContractState::Accepted) {
            return Err(AssignmentError::InvalidLifecycleState {
                contract_id: task.contract_id,
                state,
            });
        }

        let mut inner = self.state.write().await;
        if inner.tasks.contains_key(&task.task_id) {
            return Err(AssignmentError::DuplicateTask(task.task_id));
        }
        if let Some(existing) = inner.by_contract.get(&task.contract_id) {
            return Err(AssignmentError::ContractAlreadyQueued {
                contract_id: task.contract_id.clone(),
                task_id: existing.clone(),
            });
        }

        let task_id = task.task_id.clone();
        match &task.reserved_for {
            Some(worker) => {
                inner
                    .reserved
                    .entry(worker.clone())
                    .or_default()
                    .push(task_id.clone());
            }
            None => {
                inner.queue.push(&task);
            }
        }

        info!(
            task_id = %task_id,
            contract_id = %task.contract_id,
            deadline_ms = task.deadline_ms,
            budget = task.budget,
            reserved_for = ?task.reserved_for.as_ref().map(|w| w.as_str()),
            "📥 Task queued"
        );
        inner.by_contract.insert(task.contract_id.clone(), task_id.clone());
        inner.tasks.insert(task_id.clone(), task);
        Ok(task_id)
    }

    /// The reserved task for this worker if any, otherwise the first open
    /// queued task it can take. Quarantined workers are offered nothing.
    pub async fn poll_for_assignment(
        &self,
        worker: &AgentId,
        capabilities: &BTreeSet<String>,
        min_fee: u64,
    ) -> Option<PendingAssignment> {
        if self.enforcer.is_quarantined(worker, self.clock.now_ms()).await {
            debug!(worker = %worker, "Poll ignored: worker quarantined");
            return None;
        }

        let inner = self.state.read().await;

        let reserved = inner
            .reserved
            .get(worker)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.tasks.get(id))
            .find(|t| t.status == AssignmentStatus::Open);
        if let Some(task) = reserved {
            return Some(task.clone());
        }

        let found = inner
            .queue
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .find(|t| t.matches(capabilities, min_fee))
            .cloned();
        found
    }

    /// Accept an open task. On success the task leaves the queue and the
    /// supervisor owns the new work contract.
    pub async fn accept_assignment(&self, task_id: &TaskId, worker: &AgentId) -> Result<WorkContract> {
        let now = self.clock.now_ms();
        if self.enforcer.is_quarantined(worker, now).await {
            return Err(AssignmentError::WorkerQuarantined(worker.clone()));
        }

        // Lock the task so a concurrent accept fails fast
        let task = {
            let mut inner = self.state.write().await;
            let task = inner
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| AssignmentError::TaskNotFound(task_id.clone()))?;
            if task.status != AssignmentStatus::Open {
                return Err(AssignmentError::TaskNotOpen {
                    task_id: task_id.clone(),
                    status: task.status,
                });
            }
            if let Some(reserved) = &task.reserved_for {
                if reserved != worker {
                    return Err(AssignmentError::NotReservedWorker {
                        task_id: task_id.clone(),
                        worker: worker.clone(),
                    });
                }
            }
            task.status = AssignmentStatus::Assigned;
            task.assigned_to = Some(worker.clone());
            task.clone()
        };

        let contract = match self.prepare(&task, worker, now).await {
            Ok(contract) => contract,
            Err(e) => {
                warn!(task_id = %task_id, worker = %worker, error = %e, "Acceptance failed; task stays open");
                self.reopen(task_id).await;
                return Err(e);
            }
        };

        {
            let mut inner = self.state.write().await;
            inner.queue.remove(task_id);
            if let Some(reserved) = inner.reserved.get_mut(worker) {
                reserved.retain(|id| id != task_id);
            }
        }

        info!(
            task_id = %task_id,
            contract_id = %task.contract_id,
            worker = %worker,
            verifiers = contract.verifiers.len(),
            "🤝 Assignment accepted"
        );
        Ok(contract)
    }

    /// Select verifiers and hand the work contract to the supervisor, then
    /// move the lifecycle contract to `EXECUTING`. Until the hand-over
    /// succeeds the lifecycle record stays assignable (`ACCEPTED`).
    async fn prepare(&self, task: &PendingAssignment, worker: &AgentId, now: u64) -> Result<WorkContract> {
        let id = &task.contract_id;
        let state = self.lifecycle.state(id).await?;
        if !matches!(state, ContractState::Priced | ContractState::Accepted) {
            return Err(AssignmentError::InvalidLifecycleState {
                contract_id: id.clone(),
                state,
            });
        }

        let selection = self.selector.select(task.risk_tolerance, worker, &[]).await?;
        let verifiers = selection.ids();
        if state == ContractState::Priced {
            self.lifecycle
                .transition(TransitionRequest::new(id.clone(), ContractState::Accepted, "assignment_accepted"))
                .await?;
        }

        let terms = ContractTerms::new(task.objective.clone(), task.budget, task.deadline_ms, task.max_retries)
            .with_resource_limits(task.resource_limits.clone().bounded_by_deadline(now, task.deadline_ms));
        let contract = WorkContract::new(
            id.clone(),
            task.proposal_id.clone(),
            task.proposer.clone(),
            terms,
            worker.clone(),
            now,
        )
        .with_verifiers(verifiers.clone())
        .with_monitoring(self.defaults);

        self.sink.hand_over(contract.clone()).await?;

        let executing = TransitionRequest::new(id.clone(), ContractState::Executing, "worker_assigned")
            .with_metadata(serde_json::json!({
                "worker": worker.as_str(),
                "verifiers": verifiers.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            }));
        if let Err(e) = self.lifecycle.transition(executing).await {
            // The supervisor already owns the contract; keep it there
            error!(contract_id = %id, error = %e, "Lifecycle did not record EXECUTING after hand-over");
        }
        Ok(contract)
    }

    async fn reopen(&self, task_id: &TaskId) {
        let mut inner = self.state.write().await;
        if let Some(task) = inner.tasks.get_mut(task_id) {
            task.status = AssignmentStatus::Open;
            task.assigned_to = None;
        }
    }

    /// Forward a worker's result for an accepted task to the supervisor.
    pub async fn submit_result(&self, task_id: &TaskId, result: Vec<u8>) -> Result<()> {
        let contract_id = {
            let inner = self.state.read().await;
            let task = inner
                .tasks
                .get(task_id)
                .ok_or_else(|| AssignmentError::TaskNotFound(task_id.clone()))?;
            if task.status != AssignmentStatus::Assigned {
                return Err(AssignmentError::TaskNotAssigned(task_id.clone()));
            }
            task.contract_id.clone()
        };
        debug!(task_id = %task_id, contract_id = %contract_id, "Forwarding result to supervisor");
        self.sink.submit_result(&contract_id, result).await
    }

    pub async fn task(&self, task_id: &TaskId) -> Option<PendingAssignment> {
        self.state.read().await.tasks.get(task_id).cloned()
    }

    /// Open tasks in the public queue, in priority order.
    pub async fn open_tasks(&self) -> Vec<PendingAssignment> {
        let inner = self.state.read().await;
        inner
            .queue
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .filter(|t| t.status == AssignmentStatus::Open)
            .cloned()
            .collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.state.read().await.queue.len()
    }
}
