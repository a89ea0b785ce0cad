//! Interfaces to the systems that surround the supervision engine.
//!
//! None of these are implemented here for production use; the engine only
//! depends on the traits. See [`crate::memory`] for in-memory versions.

use crate::error::Result;
use crate::id::{AgentId, ContractId};
use crate::types::FailureType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Registry entry describing a worker or verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    /// Entity operating the agent; two agents with the same operator may collude.
    pub operator: String,
    /// Reputation on a 0-100 scale.
    pub reputation: f64,
    pub capabilities: BTreeSet<String>,
    /// Whether the agent passed an external audit.
    pub audited: bool,
    /// Fee the agent charges per job, in base units.
    pub fee: u64,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, operator: impl Into<String>, reputation: f64) -> Self {
        Self {
            id: AgentId::new(id),
            operator: operator.into(),
            reputation,
            capabilities: BTreeSet::new(),
            audited: false,
            fee: 0,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn audited(mut self) -> Self {
        self.audited = true;
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Filter for [`CapabilityRegistry::query`].
#[derive(Debug, Clone, Default)]
pub struct RegistryQuery {
    pub min_reputation: f64,
    pub capability: Option<String>,
    pub exclude: Vec<AgentId>,
}

impl RegistryQuery {
    pub fn min_reputation(min_reputation: f64) -> Self {
        Self {
            min_reputation,
            ..Default::default()
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn excluding<'a>(mut self, agents: impl IntoIterator<Item = &'a AgentId>) -> Self {
        self.exclude.extend(agents.into_iter().cloned());
        self
    }

    pub fn matches(&self, profile: &AgentProfile) -> bool {
        profile.reputation >= self.min_reputation
            && self
                .capability
                .as_deref()
                .map_or(true, |c| profile.has_capability(c))
            && !self.exclude.contains(&profile.id)
    }
}

/// Capability and reputation registry of workers and verifiers.
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// All agents matching the query.
    async fn query(&self, query: &RegistryQuery) -> Result<Vec<AgentProfile>>;

    /// Current reputation of an agent.
    async fn reputation(&self, agent: &AgentId) -> Result<f64>;

    /// Apply a reputation delta and return the new value.
    async fn adjust_reputation(&self, agent: &AgentId, delta: f64) -> Result<f64>;
}

/// How one job attempt ended, as recorded in the job history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Failed { failure_type: FailureType },
    Timeout,
}

/// One entry of a worker's job history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHistoryEntry {
    pub entry_id: String,
    pub contract_id: ContractId,
    pub worker: AgentId,
    pub outcome: JobOutcome,
    pub reason: String,
    pub recorded_at_ms: u64,
}

impl JobHistoryEntry {
    /// Deterministic entry id so that re-recording the same attempt is a no-op.
    pub fn entry_id_for(contract_id: &ContractId, worker: &AgentId, attempt: u32) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(contract_id.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(worker.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(&attempt.to_le_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

/// Durable job-history store.
#[async_trait]
pub trait JobHistoryStore: Send + Sync {
    /// Record an entry. Returns `false` when the entry id was already present.
    async fn record(&self, entry: JobHistoryEntry) -> Result<bool>;

    /// All entries for a worker, oldest first.
    async fn by_worker(&self, worker: &AgentId) -> Result<Vec<JobHistoryEntry>>;
}

/// Action issued against a misbehaving worker or verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EnforcementAction {
    TerminateProcess {
        contract_id: ContractId,
        worker: AgentId,
        reason: String,
    },
    Quarantine {
        worker: AgentId,
        until_ms: u64,
        reason: String,
    },
    SlashBond {
        contract_id: ContractId,
        worker: AgentId,
        percent: u8,
        reason: String,
    },
}

impl EnforcementAction {
    pub fn target(&self) -> &AgentId {
        match self {
            Self::TerminateProcess { worker, .. }
            | Self::Quarantine { worker, .. }
            | Self::SlashBond { worker, .. } => worker,
        }
    }
}

/// Carries out enforcement actions (process control, bonds, quarantine lists).
#[async_trait]
pub trait Enforcer: Send + Sync {
    async fn enforce(&self, action: EnforcementAction) -> Result<()>;

    async fn is_quarantined(&self, worker: &AgentId, now_ms: u64) -> bool;
}

/// Instruction for the external settlement mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementInstruction {
    Refund {
        contract_id: ContractId,
        proposal_id: String,
        percent: u8,
    },
    Payout {
        contract_id: ContractId,
        worker: AgentId,
        percent: u8,
    },
}

impl SettlementInstruction {
    pub fn percent(&self) -> u8 {
        match self {
            Self::Refund { percent, .. } | Self::Payout { percent, .. } => *percent,
        }
    }

    pub fn contract_id(&self) -> &ContractId {
        match self {
            Self::Refund { contract_id, .. } | Self::Payout { contract_id, .. } => contract_id,
        }
    }
}

/// External settlement: moves funds according to refund/payout percentages.
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn settle(&self, instruction: SettlementInstruction) -> Result<()>;
}
