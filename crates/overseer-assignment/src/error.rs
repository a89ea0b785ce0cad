use crate::types::AssignmentStatus;
use overseer_consensus::ConsensusError;
use overseer_lifecycle::{ContractState, LifecycleError};
use overseer_types::{AgentId, ContractId, TaskId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task already queued: {0}")]
    DuplicateTask(TaskId),

    #[error("Contract {contract_id} is already queued as task {task_id}")]
    ContractAlreadyQueued {
        contract_id: ContractId,
        task_id: TaskId,
    },

    #[error("Task {task_id} is not open (status {status:?})")]
    TaskNotOpen {
        task_id: TaskId,
        status: AssignmentStatus,
    },

    #[error("Task {0} has not been accepted by a worker")]
    TaskNotAssigned(TaskId),

    #[error("Task {task_id} is reserved for another worker, not {worker}")]
    NotReservedWorker { task_id: TaskId, worker: AgentId },

    #[error("Worker {0} is quarantined")]
    WorkerQuarantined(AgentId),

    #[error("Contract {contract_id} cannot be assigned from lifecycle state {state}")]
    InvalidLifecycleState {
        contract_id: ContractId,
        state: ContractState,
    },

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Verifier selection failed: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Supervisor rejected hand-over: {0}")]
    Handover(String),
}

pub type Result<T> = std::result::Result<T, AssignmentError>;
