use overseer_consensus::ConsensusError;
use overseer_contract::ContractError;
use overseer_types::{CollaboratorError, ContractId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    #[error("Contract already supervised: {0}")]
    DuplicateContract(ContractId),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
