use crate::health::{HealthMonitor, HealthStatus};
use crate::metrics::{AgentStats, MetricsEngine, MetricsSnapshot};
use crate::trace::{DecisionTrace, DecisionTraceEntry, Replay};
use async_trait::async_trait;
use overseer_contract::{ExecutionStatus, WorkContract};
use overseer_types::{AgentId, ContractId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read-only summary of one supervised contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub contract_id: ContractId,
    pub worker: AgentId,
    pub status: ExecutionStatus,
    pub progress: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub deadline_ms: u64,
    pub verifiers: usize,
    pub submissions: usize,
}

impl From<&WorkContract> for ContractSummary {
    fn from(c: &WorkContract) -> Self {
        Self {
            contract_id: c.contract_id.clone(),
            worker: c.worker.clone(),
            status: c.status,
            progress: c.progress,
            retry_count: c.retry_count,
            max_retries: c.terms().max_retries,
            deadline_ms: c.terms().deadline_ms,
            verifiers: c.verifiers.len(),
            submissions: c.verifier_submissions.len(),
        }
    }
}

/// Read access to the live contract set.
#[async_trait]
pub trait ContractView: Send + Sync {
    async fn contract_summaries(&self) -> Vec<ContractSummary>;

    async fn contract_summary(&self, contract_id: &ContractId) -> Option<ContractSummary>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverSnapshot {
    pub health: HealthStatus,
    pub metrics: MetricsSnapshot,
    pub contracts: Vec<ContractSummary>,
    pub recent_decisions: Vec<DecisionTraceEntry>,
}

/// Read-only façade for dashboards and audits. Exposes no mutating calls.
pub struct Observer {
    metrics: Arc<MetricsEngine>,
    trace: Arc<DecisionTrace>,
    health: Arc<HealthMonitor>,
    contracts: Arc<dyn ContractView>,
    recent_limit: usize,
}

impl Observer {
    pub fn new(
        metrics: Arc<MetricsEngine>,
        trace: Arc<DecisionTrace>,
        health: Arc<HealthMonitor>,
        contracts: Arc<dyn ContractView>,
    ) -> Self {
        Self {
            metrics,
            trace,
            health,
            contracts,
            recent_limit: 20,
        }
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub async fn snapshot(&self) -> ObserverSnapshot {
        ObserverSnapshot {
            health: self.health.evaluate(),
            metrics: self.metrics.snapshot().await,
            contracts: self.contracts.contract_summaries().await,
            recent_decisions: self.trace.recent(self.recent_limit).await,
        }
    }

    pub fn health(&self) -> HealthStatus {
        self.health.evaluate()
    }

    pub async fn contract(&self, contract_id: &ContractId) -> Option<ContractSummary> {
        self.contracts.contract_summary(contract_id).await
    }

    pub async fn contract_trace(&self, contract_id: &ContractId) -> Vec<DecisionTraceEntry> {
        self.trace.by_contract(contract_id).await
    }

    pub async fn replay(&self, contract_id: &ContractId) -> Replay {
        self.trace.replay(contract_id).await
    }

    pub async fn recent_decisions(&self, n: usize) -> Vec<DecisionTraceEntry> {
        self.trace.recent(n).await
    }

    pub async fn worker_stats(&self, worker: &AgentId) -> Option<AgentStats> {
        self.metrics.worker_stats(worker).await
    }

    pub async fn verifier_stats(&self, verifier: &AgentId) -> Option<AgentStats> {
        self.metrics.verifier_stats(verifier).await
    }

    pub fn metrics_text(&self) -> crate::Result<String> {
        self.metrics.gather_text()
    }
}
