use crate::types::ExecutionStatus;
use overseer_types::{AgentId, ContractId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    #[error("Contract {contract_id} is terminal ({status}); no further mutation allowed")]
    TerminalState {
        contract_id: ContractId,
        status: ExecutionStatus,
    },

    #[error("Cannot {operation} contract {contract_id}: expected status {expected}, found {actual}")]
    InvalidStatus {
        contract_id: ContractId,
        operation: &'static str,
        expected: ExecutionStatus,
        actual: ExecutionStatus,
    },

    #[error("Contract {contract_id} cannot move from {from} to {to}")]
    InvalidTransition {
        contract_id: ContractId,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Contract {contract_id} is not verifying (status {status})")]
    NotVerifying {
        contract_id: ContractId,
        status: ExecutionStatus,
    },

    #[error("Verifier {verifier} is not assigned to contract {contract_id}")]
    VerifierNotAssigned {
        contract_id: ContractId,
        verifier: AgentId,
    },

    #[error("Verifier {verifier} already submitted for contract {contract_id}")]
    DuplicateSubmission {
        contract_id: ContractId,
        verifier: AgentId,
    },

    #[error("Worker {worker} already held contract {contract_id}")]
    WorkerAlreadyHeld {
        contract_id: ContractId,
        worker: AgentId,
    },

    #[error("Progress must be within 0-100, got {0}")]
    InvalidProgress(u8),
}

pub type Result<T> = std::result::Result<T, ContractError>;
