use overseer_lifecycle::LifecycleState;
use overseer_types::{AgentId, FailureType, ResourceLimits, Verdict};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terms fixed when the contract is created. Never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub scope: String,
    pub budget: u64,
    /// Absolute deadline in ms since the epoch
    pub deadline_ms: u64,
    pub max_retries: u32,
    pub resource_limits: ResourceLimits,
}

impl ContractTerms {
    pub fn new(scope: impl Into<String>, budget: u64, deadline_ms: u64, max_retries: u32) -> Self {
        Self {
            scope: scope.into(),
            budget,
            deadline_ms,
            max_retries,
            resource_limits: ResourceLimits::default(),
        }
    }

    pub fn with_resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }
}

/// Operational status of a work contract while it is supervised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Assigned,
    Executing,
    Verifying,
    Completed,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    /// Active contracts are the ones the supervisor polls.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl LifecycleState for ExecutionStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (Assigned, Executing) => true,
            (Executing, Verifying) => true,
            (Verifying, Completed) => true,
            // Reassignment is the only back-edge
            (Assigned | Executing | Verifying, Assigned) => true,
            (Assigned | Executing | Verifying, Failed | Timeout) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assigned => "assigned",
            Self::Executing => "executing",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// One recorded failure of a worker on this contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryEntry {
    pub worker: AgentId,
    pub failure_type: FailureType,
    pub timestamp: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierSubmission {
    pub verifier_id: AgentId,
    pub verdict: Verdict,
    pub reason: String,
    pub timestamp: u64,
}

/// Submissions of an earlier worker's attempt, archived on reassignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRound {
    pub round: u32,
    pub worker: AgentId,
    pub submissions: Vec<VerifierSubmission>,
    pub result: Option<bool>,
}
