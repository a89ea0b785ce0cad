use crate::error::Result;
use overseer_types::{AgentId, FailureType};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Rolling statistics for one worker or verifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub assigned: u64,
    pub completed: u64,
    pub failed: u64,
    /// Verifier only: rounds in which this verifier was an outlier
    pub outliers: u64,
    /// completed / assigned, recomputed on every update
    pub success_rate: f64,
}

impl AgentStats {
    fn recompute(&mut self) {
        self.success_rate = if self.assigned == 0 {
            0.0
        } else {
            self.completed as f64 / self.assigned as f64
        };
    }
}

/// Contract outcome counters read by the health monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetrics {
    pub created: u64,
    pub completed: u64,
    pub failed: u64,
    pub timeout: u64,
    pub active: i64,
    pub stalls: u64,
    pub crashes: u64,
    pub verification_failures: u64,
    pub retries_used: u64,
    pub retries_exhausted: u64,
    pub reassignments: u64,
    pub safe_mode_entries: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub contracts: ContractMetrics,
    pub workers: BTreeMap<AgentId, AgentStats>,
    pub verifiers: BTreeMap<AgentId, AgentStats>,
}

/// Contract-outcome counters in a private Prometheus registry, plus
/// per-agent statistics.
#[derive(Clone)]
pub struct MetricsEngine {
    registry: Arc<Registry>,

    pub contracts_created: IntCounter,
    pub contracts_completed: IntCounter,
    pub contracts_failed: IntCounter,
    pub contracts_timeout: IntCounter,
    pub contracts_active: IntGauge,

    pub failures_stall: IntCounter,
    pub failures_crash: IntCounter,
    pub failures_verification: IntCounter,

    pub retries_used: IntCounter,
    pub retries_exhausted: IntCounter,
    pub reassignments: IntCounter,
    pub safe_mode_entries: IntCounter,
    pub verifier_outliers: IntCounter,

    workers: Arc<RwLock<HashMap<AgentId, AgentStats>>>,
    verifiers: Arc<RwLock<HashMap<AgentId, AgentStats>>>,
}

impl MetricsEngine {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let contracts_created = counter("overseer_contracts_created_total", "Contracts handed to the supervisor")?;
        let contracts_completed = counter("overseer_contracts_completed_total", "Contracts completed")?;
        let contracts_failed = counter("overseer_contracts_failed_total", "Contracts failed permanently")?;
        let contracts_timeout = counter("overseer_contracts_timeout_total", "Contracts past their deadline")?;
        let failures_stall = counter("overseer_failures_stall_total", "Stall failures")?;
        let failures_crash = counter("overseer_failures_crash_total", "Crash failures")?;
        let failures_verification =
            counter("overseer_failures_verification_total", "Verification failures")?;
        let retries_used = counter("overseer_retries_used_total", "Retries charged")?;
        let retries_exhausted =
            counter("overseer_retries_exhausted_total", "Failures with no retry budget left")?;
        let reassignments = counter("overseer_reassignments_total", "Worker reassignments")?;
        let safe_mode_entries = counter("overseer_safe_mode_entries_total", "Safe mode entries")?;
        let verifier_outliers = counter("overseer_verifier_outliers_total", "Outlier votes")?;

        let contracts_active = IntGauge::new("overseer_contracts_active", "Contracts under supervision")?;
        registry.register(Box::new(contracts_active.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            contracts_created,
            contracts_completed,
            contracts_failed,
            contracts_timeout,
            contracts_active,
            failures_stall,
            failures_crash,
            failures_verification,
            retries_used,
            retries_exhausted,
            reassignments,
            safe_mode_entries,
            verifier_outliers,
            workers: Arc::new(RwLock::new(HashMap::new())),
            verifiers: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    async fn update_worker(&self, worker: &AgentId, f: impl FnOnce(&mut AgentStats)) {
        let mut workers = self.workers.write().await;
        let stats = workers.entry(worker.clone()).or_default();
        f(stats);
        stats.recompute();
    }

    async fn update_verifier(&self, verifier: &AgentId, f: impl FnOnce(&mut AgentStats)) {
        let mut verifiers = self.verifiers.write().await;
        let stats = verifiers.entry(verifier.clone()).or_default();
        f(stats);
        stats.recompute();
    }

    pub async fn contract_created(&self, worker: &AgentId) {
        self.contracts_created.inc();
        self.contracts_active.inc();
        self.update_worker(worker, |s| s.assigned += 1).await;
    }

    pub async fn worker_reassigned(&self, new_worker: &AgentId) {
        self.reassignments.inc();
        self.update_worker(new_worker, |s| s.assigned += 1).await;
    }

    pub async fn contract_completed(&self, worker: &AgentId) {
        self.contracts_completed.inc();
        self.contracts_active.dec();
        self.update_worker(worker, |s| s.completed += 1).await;
    }

    pub fn contract_failed(&self) {
        self.contracts_failed.inc();
        self.contracts_active.dec();
    }

    pub async fn contract_timed_out(&self, worker: &AgentId) {
        self.contracts_timeout.inc();
        self.contracts_active.dec();
        self.update_worker(worker, |s| s.failed += 1).await;
    }

    /// A worker failure was recorded; `retry_charged` tells whether it used
    /// up a retry or found the budget exhausted.
    pub async fn failure_recorded(&self, worker: &AgentId, failure_type: FailureType, retry_charged: bool) {
        match failure_type {
            FailureType::Stall => self.failures_stall.inc(),
            FailureType::Crash => self.failures_crash.inc(),
            FailureType::VerificationFailed => self.failures_verification.inc(),
        }
        if retry_charged {
            self.retries_used.inc();
        } else {
            self.retries_exhausted.inc();
        }
        self.update_worker(worker, |s| s.failed += 1).await;
    }

    /// A verifier's vote was counted in a finalized round.
    pub async fn verifier_voted(&self, verifier: &AgentId, outlier: bool) {
        if outlier {
            self.verifier_outliers.inc();
        }
        self.update_verifier(verifier, |s| {
            s.assigned += 1;
            if outlier {
                s.outliers += 1;
                s.failed += 1;
            } else {
                s.completed += 1;
            }
        })
        .await;
    }

    pub fn safe_mode_entered(&self) {
        self.safe_mode_entries.inc();
    }

    pub fn contract_metrics(&self) -> ContractMetrics {
        ContractMetrics {
            created: self.contracts_created.get(),
            completed: self.contracts_completed.get(),
            failed: self.contracts_failed.get(),
            timeout: self.contracts_timeout.get(),
            active: self.contracts_active.get(),
            stalls: self.failures_stall.get(),
            crashes: self.failures_crash.get(),
            verification_failures: self.failures_verification.get(),
            retries_used: self.retries_used.get(),
            retries_exhausted: self.retries_exhausted.get(),
            reassignments: self.reassignments.get(),
            safe_mode_entries: self.safe_mode_entries.get(),
        }
    }

    pub async fn worker_stats(&self, worker: &AgentId) -> Option<AgentStats> {
        self.workers.read().await.get(worker).cloned()
    }

    pub async fn verifier_stats(&self, verifier: &AgentId) -> Option<AgentStats> {
        self.verifiers.read().await.get(verifier).cloned()
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let workers = self
            .workers
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let verifiers = self
            .verifiers
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        MetricsSnapshot {
            contracts: self.contract_metrics(),
            workers,
            verifiers,
        }
    }

    /// Prometheus text exposition of all counters.
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
