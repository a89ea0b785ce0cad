//! In-memory collaborators for tests, simulations and single-process deployments.

use crate::collaborators::{
    AgentProfile, CapabilityRegistry, EnforcementAction, Enforcer, JobHistoryEntry,
    JobHistoryStore, RegistryQuery, Settlement, SettlementInstruction,
};
use crate::error::{CollaboratorError, Result};
use crate::id::{AgentId, ContractId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MIN_REPUTATION: f64 = 0.0;
const MAX_REPUTATION: f64 = 100.0;

/// In-memory capability registry.
pub struct MemoryRegistry {
    agents: Arc<RwLock<HashMap<AgentId, AgentProfile>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, profile: AgentProfile) {
        debug!(agent = %profile.id, operator = %profile.operator, "Agent registered");
        self.agents.write().await.insert(profile.id.clone(), profile);
    }

    pub async fn get(&self, agent: &AgentId) -> Option<AgentProfile> {
        self.agents.read().await.get(agent).cloned()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityRegistry for MemoryRegistry {
    async fn query(&self, query: &RegistryQuery) -> Result<Vec<AgentProfile>> {
        let agents = self.agents.read().await;
        let mut matches: Vec<AgentProfile> =
            agents.values().filter(|p| query.matches(p)).cloned().collect();

        // Highest reputation first; id as a stable tie-break.
        matches.sort_by(|a, b| {
            b.reputation
                .partial_cmp(&a.reputation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matches)
    }

    async fn reputation(&self, agent: &AgentId) -> Result<f64> {
        self.agents
            .read()
            .await
            .get(agent)
            .map(|p| p.reputation)
            .ok_or_else(|| CollaboratorError::AgentNotFound(agent.to_string()))
    }

    async fn adjust_reputation(&self, agent: &AgentId, delta: f64) -> Result<f64> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent)
            .ok_or_else(|| CollaboratorError::AgentNotFound(agent.to_string()))?;

        let old = profile.reputation;
        profile.reputation = (old + delta).clamp(MIN_REPUTATION, MAX_REPUTATION);

        info!(
            agent = %agent,
            old_rep = old,
            new_rep = profile.reputation,
            delta,
            "📊 Reputation updated"
        );

        Ok(profile.reputation)
    }
}

/// In-memory job history, idempotent on entry id.
#[derive(Default)]
pub struct MemoryJobHistory {
    entries: RwLock<Vec<JobHistoryEntry>>,
    seen: RwLock<HashSet<String>>,
}

impl MemoryJobHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl JobHistoryStore for MemoryJobHistory {
    async fn record(&self, entry: JobHistoryEntry) -> Result<bool> {
        let mut seen = self.seen.write().await;
        if !seen.insert(entry.entry_id.clone()) {
            debug!(entry_id = %entry.entry_id, "Job history entry already recorded");
            return Ok(false);
        }
        self.entries.write().await.push(entry);
        Ok(true)
    }

    async fn by_worker(&self, worker: &AgentId) -> Result<Vec<JobHistoryEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| &e.worker == worker)
            .cloned()
            .collect())
    }
}

/// Enforcer that records every action and keeps a quarantine list.
#[derive(Default)]
pub struct RecordingEnforcer {
    actions: RwLock<Vec<EnforcementAction>>,
    quarantined_until: RwLock<HashMap<AgentId, u64>>,
}

impl RecordingEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn actions(&self) -> Vec<EnforcementAction> {
        self.actions.read().await.clone()
    }

    pub async fn actions_against(&self, worker: &AgentId) -> Vec<EnforcementAction> {
        self.actions
            .read()
            .await
            .iter()
            .filter(|a| a.target() == worker)
            .cloned()
            .collect()
    }

    pub async fn quarantine_expiry(&self, worker: &AgentId) -> Option<u64> {
        self.quarantined_until.read().await.get(worker).copied()
    }
}

#[async_trait]
impl Enforcer for RecordingEnforcer {
    async fn enforce(&self, action: EnforcementAction) -> Result<()> {
        if let EnforcementAction::Quarantine { worker, until_ms, .. } = &action {
            let mut quarantined = self.quarantined_until.write().await;
            let entry = quarantined.entry(worker.clone()).or_insert(0);
            // Overlapping quarantines keep the later expiry.
            *entry = (*entry).max(*until_ms);
        }
        if let EnforcementAction::SlashBond { percent, .. } = &action {
            if *percent > 100 {
                return Err(CollaboratorError::InvalidPercentage(*percent));
            }
        }

        info!(action = ?action, "🔨 Enforcement action applied");
        self.actions.write().await.push(action);
        Ok(())
    }

    async fn is_quarantined(&self, worker: &AgentId, now_ms: u64) -> bool {
        self.quarantined_until
            .read()
            .await
            .get(worker)
            .is_some_and(|until| *until > now_ms)
    }
}

/// Settlement that records instructions instead of moving funds.
#[derive(Default)]
pub struct RecordingSettlement {
    instructions: RwLock<Vec<SettlementInstruction>>,
}

impl RecordingSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn instructions(&self) -> Vec<SettlementInstruction> {
        self.instructions.read().await.clone()
    }

    pub async fn for_contract(&self, contract_id: &ContractId) -> Vec<SettlementInstruction> {
        self.instructions
            .read()
            .await
            .iter()
            .filter(|i| i.contract_id() == contract_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Settlement for RecordingSettlement {
    async fn settle(&self, instruction: SettlementInstruction) -> Result<()> {
        if instruction.percent() > 100 {
            return Err(CollaboratorError::InvalidPercentage(instruction.percent()));
        }
        info!(instruction = ?instruction, "💸 Settlement instruction issued");
        self.instructions.write().await.push(instruction);
        Ok(())
    }
}
