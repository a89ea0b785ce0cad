use crate::state::ContractState;
use overseer_types::ContractId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Invalid state transition for {contract_id}: {from} -> {to}")]
    InvalidStateTransition {
        contract_id: ContractId,
        from: ContractState,
        to: ContractState,
    },

    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    #[error("Safe mode active: new proposals are not accepted")]
    SafeModeActive,

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
