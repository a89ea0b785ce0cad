use overseer_types::{Clock, ContractId, DeploymentMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const TRACE_CHANNEL_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    ContractCreated,
    ExecutionStarted,
    HeartbeatReceived,
    WorkerKilled,
    WorkReassigned,
    ContractCompleted,
    ContractFailed,
    ContractTimeout,
    VerificationPassed,
    VerificationFailed,
    SafeModeEntered,
    SafeModeExited,
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ContractCreated => "CONTRACT_CREATED",
            Self::ExecutionStarted => "EXECUTION_STARTED",
            Self::HeartbeatReceived => "HEARTBEAT_RECEIVED",
            Self::WorkerKilled => "WORKER_KILLED",
            Self::WorkReassigned => "WORK_REASSIGNED",
            Self::ContractCompleted => "CONTRACT_COMPLETED",
            Self::ContractFailed => "CONTRACT_FAILED",
            Self::ContractTimeout => "CONTRACT_TIMEOUT",
            Self::VerificationPassed => "VERIFICATION_PASSED",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::SafeModeEntered => "SAFE_MODE_ENTERED",
            Self::SafeModeExited => "SAFE_MODE_EXITED",
        };
        f.write_str(s)
    }
}

/// One immutable audit record. System-wide decisions (safe mode) carry no
/// contract id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTraceEntry {
    pub timestamp: u64,
    pub trace_id: String,
    pub contract_id: Option<ContractId>,
    pub decision: DecisionType,
    pub reason: String,
    pub mode: DeploymentMode,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub index: usize,
    pub timestamp: u64,
    /// Time since the contract's first recorded decision
    pub elapsed_ms: u64,
    pub decision: DecisionType,
    pub reason: String,
}

/// A contract's decisions in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub contract_id: ContractId,
    pub steps: Vec<ReplayStep>,
}

impl Replay {
    pub fn render(&self) -> String {
        let mut out = format!("Replay of {} ({} steps)\n", self.contract_id, self.steps.len());
        for step in &self.steps {
            let _ = writeln!(
                out,
                "{:>3}. +{}ms {} - {}",
                step.index + 1,
                step.elapsed_ms,
                step.decision,
                step.reason
            );
        }
        out
    }
}

#[derive(Default)]
struct TraceLog {
    entries: Vec<DecisionTraceEntry>,
    by_contract: HashMap<ContractId, Vec<usize>>,
    by_type: HashMap<DecisionType, Vec<usize>>,
}

/// Append-only decision log. Entries are indexed by contract and by type at
/// insertion, and published to subscribers.
pub struct DecisionTrace {
    log: RwLock<TraceLog>,
    tx: broadcast::Sender<DecisionTraceEntry>,
    clock: Arc<dyn Clock>,
    mode: DeploymentMode,
    sequence: AtomicU64,
}

impl DecisionTrace {
    pub fn new(clock: Arc<dyn Clock>, mode: DeploymentMode) -> Self {
        let (tx, _) = broadcast::channel(TRACE_CHANNEL_CAPACITY);
        Self {
            log: RwLock::new(TraceLog::default()),
            tx,
            clock,
            mode,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DecisionTraceEntry> {
        self.tx.subscribe()
    }

    pub async fn record(
        &self,
        contract_id: Option<&ContractId>,
        decision: DecisionType,
        reason: impl Into<String>,
        context: serde_json::Value,
    ) -> DecisionTraceEntry {
        let timestamp = self.clock.now_ms();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&seq.to_le_bytes());
        hasher.update(&timestamp.to_le_bytes());
        if let Some(id) = contract_id {
            hasher.update(id.as_str().as_bytes());
        }
        let trace_id = format!("trace-{}", hex::encode(&hasher.finalize().as_bytes()[..8]));

        let entry = DecisionTraceEntry {
            timestamp,
            trace_id,
            contract_id: contract_id.cloned(),
            decision,
            reason: reason.into(),
            mode: self.mode,
            context,
        };

        {
            let mut log = self.log.write().await;
            let index = log.entries.len();
            if let Some(id) = &entry.contract_id {
                log.by_contract.entry(id.clone()).or_default().push(index);
            }
            log.by_type.entry(decision).or_default().push(index);
            log.entries.push(entry.clone());
        }

        if self.tx.send(entry.clone()).is_err() {
            debug!(decision = %decision, "Trace entry recorded but no subscribers listening");
        }
        entry
    }

    /// Convenience for contract-scoped decisions without extra context.
    pub async fn record_for(
        &self,
        contract_id: &ContractId,
        decision: DecisionType,
        reason: impl Into<String>,
    ) -> DecisionTraceEntry {
        self.record(Some(contract_id), decision, reason, serde_json::Value::Null)
            .await
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.entries.is_empty()
    }

    pub async fn by_contract(&self, contract_id: &ContractId) -> Vec<DecisionTraceEntry> {
        let log = self.log.read().await;
        log.by_contract
            .get(contract_id)
            .map(|idx| idx.iter().map(|&i| log.entries[i].clone()).collect())
            .unwrap_or_default()
    }

    pub async fn by_type(&self, decision: DecisionType) -> Vec<DecisionTraceEntry> {
        let log = self.log.read().await;
        log.by_type
            .get(&decision)
            .map(|idx| idx.iter().map(|&i| log.entries[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Entries with `start_ms <= timestamp <= end_ms`.
    pub async fn in_range(&self, start_ms: u64, end_ms: u64) -> Vec<DecisionTraceEntry> {
        self.log
            .read()
            .await
            .entries
            .iter()
            .filter(|e| e.timestamp >= start_ms && e.timestamp <= end_ms)
            .cloned()
            .collect()
    }

    /// The last `n` entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<DecisionTraceEntry> {
        let log = self.log.read().await;
        let start = log.entries.len().saturating_sub(n);
        log.entries[start..].to_vec()
    }

    pub async fn replay(&self, contract_id: &ContractId) -> Replay {
        let entries = self.by_contract(contract_id).await;
        let origin = entries.first().map(|e| e.timestamp).unwrap_or_default();
        let steps = entries
            .into_iter()
            .enumerate()
            .map(|(index, e)| ReplayStep {
                index,
                timestamp: e.timestamp,
                elapsed_ms: e.timestamp.saturating_sub(origin),
                decision: e.decision,
                reason: e.reason,
            })
            .collect();
        Replay {
            contract_id: contract_id.clone(),
            steps,
        }
    }
}
