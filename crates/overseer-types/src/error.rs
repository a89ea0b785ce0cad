use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Agent not found in registry: {0}")]
    AgentNotFound(String),

    #[error("Registry unavailable: {0}")]
    Registry(String),

    #[error("Job history store error: {0}")]
    HistoryStore(String),

    #[error("Enforcement failed: {0}")]
    Enforcement(String),

    #[error("Settlement failed: {0}")]
    Settlement(String),

    #[error("Invalid percentage: {0} (must be 0-100)")]
    InvalidPercentage(u8),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;
