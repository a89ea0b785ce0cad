use crate::error::{LifecycleError, Result};
use crate::state::{validate_transition, ContractState};
use overseer_types::{Clock, ContractId, ResourceLimits, RiskTolerance};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Admission control for new proposals (safe mode closes the gate).
pub trait ProposalGate: Send + Sync {
    fn admits_proposals(&self) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Retry budget used when a proposal does not specify one
    pub default_max_retries: u32,
    /// Upper bound accepted for a proposal's `max_retries`
    pub max_retries_cap: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            max_retries_cap: 10,
        }
    }
}

/// Optional constraints attached to a proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalConstraints {
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub resource_limits: Option<ResourceLimits>,
}

/// Proposal submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub proposer: String,
    pub objective: String,
    pub budget: u64,
    pub deadline_ms: u64,
    #[serde(default)]
    pub risk_tolerance: Option<RiskTolerance>,
    #[serde(default)]
    pub constraints: Option<ProposalConstraints>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Lifecycle transition payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub contract_id: ContractId,
    pub to_state: ContractState,
    pub event_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl TransitionRequest {
    pub fn new(contract_id: ContractId, to_state: ContractState, event_type: &str) -> Self {
        Self {
            contract_id,
            to_state,
            event_type: event_type.to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ContractState,
    pub to: ContractState,
    pub event_type: String,
    pub metadata: serde_json::Value,
    pub at_ms: u64,
}

/// Event emitted after every successful transition.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub contract_id: ContractId,
    pub from_state: ContractState,
    pub to_state: ContractState,
    pub event_type: String,
    pub at_ms: u64,
}

/// Lifecycle-tracked contract record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleContract {
    pub contract_id: ContractId,
    pub proposal_id: String,
    pub proposer: String,
    pub objective: String,
    pub budget: u64,
    pub deadline_ms: u64,
    pub risk_tolerance: RiskTolerance,
    pub constraints: ProposalConstraints,
    pub max_retries: u32,
    pub state: ContractState,
    pub created_at_ms: u64,
    pub history: Vec<StateTransition>,
}

/// Owns lifecycle records; validates every transition against the table.
pub struct LifecycleManager {
    contracts: Arc<RwLock<HashMap<ContractId, LifecycleContract>>>,
    clock: Arc<dyn Clock>,
    gate: Option<Arc<dyn ProposalGate>>,
    event_tx: Option<mpsc::UnboundedSender<LifecycleEvent>>,
    sequence: AtomicU64,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(clock: Arc<dyn Clock>, config: LifecycleConfig) -> Self {
        Self {
            contracts: Arc::new(RwLock::new(HashMap::new())),
            clock,
            gate: None,
            event_tx: None,
            sequence: AtomicU64::new(0),
            config,
        }
    }

    /// Create a lifecycle manager that emits an event per transition.
    pub fn with_events(
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut manager = Self::new(clock, config);
        manager.event_tx = Some(tx);
        (manager, rx)
    }

    /// Install the admission gate consulted on every proposal.
    pub fn with_gate(mut self, gate: Arc<dyn ProposalGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Submit a new proposal; the created contract starts in `PROPOSED`.
    pub async fn submit_proposal(&self, request: ProposalRequest) -> Result<LifecycleContract> {
        if let Some(gate) = &self.gate {
            if !gate.admits_proposals() {
                warn!(proposer = %request.proposer, "🛑 Proposal rejected: safe mode active");
                return Err(LifecycleError::SafeModeActive);
            }
        }

        let now = self.clock.now_ms();
        self.validate_proposal(&request, now)?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let seed = format!("{}|{}|{}|{}", request.proposer, request.objective, now, seq);
        let contract_id = ContractId::derive(seed.as_bytes());
        let proposal_id = format!(
            "prop-{}",
            hex::encode(&blake3::hash(seed.as_bytes()).as_bytes()[8..16])
        );

        let contract = LifecycleContract {
            contract_id: contract_id.clone(),
            proposal_id,
            proposer: request.proposer,
            objective: request.objective,
            budget: request.budget,
            deadline_ms: request.deadline_ms,
            risk_tolerance: request.risk_tolerance.unwrap_or_default(),
            constraints: request.constraints.unwrap_or_default(),
            max_retries: request.max_retries.unwrap_or(self.config.default_max_retries),
            state: ContractState::Proposed,
            created_at_ms: now,
            history: Vec::new(),
        };

        self.contracts
            .write()
            .await
            .insert(contract_id.clone(), contract.clone());

        info!(
            contract_id = %contract_id,
            proposer = %contract.proposer,
            budget = contract.budget,
            deadline_ms = contract.deadline_ms,
            risk = %contract.risk_tolerance,
            "📋 Proposal submitted"
        );

        Ok(contract)
    }

    fn validate_proposal(&self, request: &ProposalRequest, now: u64) -> Result<()> {
        if request.objective.trim().is_empty() {
            return Err(LifecycleError::InvalidProposal(
                "objective must not be empty".to_string(),
            ));
        }
        if request.budget == 0 {
            return Err(LifecycleError::InvalidProposal(
                "budget must be positive".to_string(),
            ));
        }
        if request.deadline_ms <= now {
            return Err(LifecycleError::InvalidProposal(format!(
                "deadline {} is not in the future (now {})",
                request.deadline_ms, now
            )));
        }
        if let Some(max_retries) = request.max_retries {
            if max_retries > self.config.max_retries_cap {
                return Err(LifecycleError::InvalidProposal(format!(
                    "max_retries {} exceeds cap {}",
                    max_retries, self.config.max_retries_cap
                )));
            }
        }
        Ok(())
    }

    /// Apply a lifecycle transition. Fails for unknown contracts and for
    /// transitions outside the lifecycle table; nothing is mutated on failure.
    pub async fn transition(&self, request: TransitionRequest) -> Result<StateTransition> {
        let mut contracts = self.contracts.write().await;
        let contract = contracts
            .get_mut(&request.contract_id)
            .ok_or_else(|| LifecycleError::ContractNotFound(request.contract_id.clone()))?;

        let from = contract.state;
        validate_transition(&request.contract_id, from, request.to_state)?;

        let now = self.clock.now_ms();
        let transition = StateTransition {
            from,
            to: request.to_state,
            event_type: request.event_type.clone(),
            metadata: request.metadata,
            at_ms: now,
        };
        contract.state = request.to_state;
        contract.history.push(transition.clone());

        info!(
            contract_id = %request.contract_id,
            old_state = %from,
            new_state = %request.to_state,
            event = %request.event_type,
            "🔄 Lifecycle transition"
        );

        if let Some(tx) = &self.event_tx {
            let event = LifecycleEvent {
                contract_id: request.contract_id.clone(),
                from_state: from,
                to_state: request.to_state,
                event_type: request.event_type,
                at_ms: now,
            };
            if let Err(e) = tx.send(event) {
                warn!(
                    contract_id = %request.contract_id,
                    error = %e,
                    "Failed to emit lifecycle event"
                );
            } else {
                debug!(contract_id = %request.contract_id, "Lifecycle event emitted");
            }
        }

        Ok(transition)
    }

    pub async fn get(&self, contract_id: &ContractId) -> Option<LifecycleContract> {
        self.contracts.read().await.get(contract_id).cloned()
    }

    pub async fn state(&self, contract_id: &ContractId) -> Result<ContractState> {
        self.contracts
            .read()
            .await
            .get(contract_id)
            .map(|c| c.state)
            .ok_or_else(|| LifecycleError::ContractNotFound(contract_id.clone()))
    }

    pub async fn history(&self, contract_id: &ContractId) -> Result<Vec<StateTransition>> {
        self.contracts
            .read()
            .await
            .get(contract_id)
            .map(|c| c.history.clone())
            .ok_or_else(|| LifecycleError::ContractNotFound(contract_id.clone()))
    }

    /// All contracts currently in `state`, ordered by id.
    pub async fn in_state(&self, state: ContractState) -> Vec<LifecycleContract> {
        let mut matching: Vec<_> = self
            .contracts
            .read()
            .await
            .values()
            .filter(|c| c.state == state)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.contract_id.cmp(&b.contract_id));
        matching
    }
}
