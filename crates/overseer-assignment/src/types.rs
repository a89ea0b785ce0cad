use overseer_lifecycle::LifecycleContract;
use overseer_types::{AgentId, ContractId, ResourceLimits, RiskTolerance, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Open,
    Assigned,
}

/// A contract waiting for a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAssignment {
    pub task_id: TaskId,
    pub contract_id: ContractId,
    pub proposal_id: String,
    pub proposer: String,
    pub objective: String,
    pub budget: u64,
    pub deadline_ms: u64,
    pub max_retries: u32,
    pub risk_tolerance: RiskTolerance,
    pub required_capabilities: BTreeSet<String>,
    pub resource_limits: ResourceLimits,
    pub status: AssignmentStatus,
    /// Direct hire: only this worker is offered the task
    pub reserved_for: Option<AgentId>,
    /// Worker that accepted the task
    pub assigned_to: Option<AgentId>,
}

impl PendingAssignment {
    pub fn from_contract(contract: &LifecycleContract) -> Self {
        Self {
            task_id: TaskId::for_contract(&contract.contract_id),
            contract_id: contract.contract_id.clone(),
            proposal_id: contract.proposal_id.clone(),
            proposer: contract.proposer.clone(),
            objective: contract.objective.clone(),
            budget: contract.budget,
            deadline_ms: contract.deadline_ms,
            max_retries: contract.max_retries,
            risk_tolerance: contract.risk_tolerance,
            required_capabilities: contract
                .constraints
                .required_capabilities
                .iter()
                .cloned()
                .collect(),
            resource_limits: contract.constraints.resource_limits.clone().unwrap_or_default(),
            status: AssignmentStatus::Open,
            reserved_for: None,
            assigned_to: None,
        }
    }

    pub fn reserved_for(mut self, worker: AgentId) -> Self {
        self.reserved_for = Some(worker);
        self
    }

    /// Required capabilities are a subset of the worker's and the budget
    /// covers its minimum fee.
    pub fn matches(&self, capabilities: &BTreeSet<String>, min_fee: u64) -> bool {
        self.status == AssignmentStatus::Open
            && self.budget >= min_fee
            && self.required_capabilities.is_subset(capabilities)
    }
}
