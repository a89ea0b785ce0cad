use crate::engine::RoundKey;
use overseer_types::{AgentId, CollaboratorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Insufficient verifiers: need {required} at reputation >= {min_reputation}, found {available}")]
    InsufficientVerifiers {
        required: usize,
        available: usize,
        min_reputation: f64,
    },

    #[error("Unsupported verifier count {0}: consensus is defined for 1, 2 or 3 verifiers")]
    UnsupportedVerifierCount(usize),

    #[error("Verification round already open: {0}")]
    RoundAlreadyOpen(RoundKey),

    #[error("Verification round not found: {0}")]
    RoundNotFound(RoundKey),

    #[error("Verifier {verifier} is not assigned to round {key}")]
    NotAVerifier { key: RoundKey, verifier: AgentId },

    #[error("Verifier {verifier} already voted in round {key}")]
    DuplicateVote { key: RoundKey, verifier: AgentId },

    #[error("Verification round already finalized: {0}")]
    AlreadyFinalized(RoundKey),

    #[error("Registry error: {0}")]
    Registry(#[from] CollaboratorError),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
