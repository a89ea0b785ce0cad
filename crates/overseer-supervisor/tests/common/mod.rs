#![allow(dead_code)]

use overseer_consensus::{ConsensusConfig, ConsensusEngine};
use overseer_contract::{ContractTerms, WorkContract};
use overseer_lifecycle::LifecycleManager;
use overseer_observability::{DecisionTrace, DecisionType, HealthMonitor, HealthThresholds, MetricsEngine};
use overseer_supervisor::{Collaborators, ExecutionSupervisor, SupervisorConfig};
use overseer_types::{
    AgentId, AgentProfile, CapabilityRegistry, ContractId, ManualClock, MemoryJobHistory,
    MemoryRegistry, RecordingEnforcer, RecordingSettlement,
};
use std::sync::Arc;

pub const MINUTE_MS: u64 = 60_000;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub registry: Arc<MemoryRegistry>,
    pub job_history: Arc<MemoryJobHistory>,
    pub enforcer: Arc<RecordingEnforcer>,
    pub settlement: Arc<RecordingSettlement>,
    pub consensus: Arc<ConsensusEngine>,
    pub metrics: Arc<MetricsEngine>,
    pub trace: Arc<DecisionTrace>,
    pub health: Arc<HealthMonitor>,
    pub supervisor: Arc<ExecutionSupervisor>,
}

pub struct HarnessBuilder {
    config: SupervisorConfig,
    profiles: Vec<AgentProfile>,
    lifecycle: Option<Arc<LifecycleManager>>,
    clock: Arc<ManualClock>,
    supervisor_registry: Option<Box<dyn FnOnce(Arc<MemoryRegistry>) -> Arc<dyn CapabilityRegistry>>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig::default(),
            profiles: default_profiles(),
            lifecycle: None,
            clock: Arc::new(ManualClock::new(0)),
            supervisor_registry: None,
        }
    }

    pub fn config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn profiles(mut self, profiles: Vec<AgentProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn lifecycle(mut self, lifecycle: Arc<LifecycleManager>, clock: Arc<ManualClock>) -> Self {
        self.lifecycle = Some(lifecycle);
        self.clock = clock;
        self
    }

    /// Registry seen by the supervisor only, built around the shared one.
    pub fn supervisor_registry(
        mut self,
        wrap: impl FnOnce(Arc<MemoryRegistry>) -> Arc<dyn CapabilityRegistry> + 'static,
    ) -> Self {
        self.supervisor_registry = Some(Box::new(wrap));
        self
    }

    pub async fn build(self) -> Harness {
        let clock = self.clock;
        let registry = Arc::new(MemoryRegistry::new());
        for profile in self.profiles {
            registry.register(profile).await;
        }
        let job_history = Arc::new(MemoryJobHistory::new());
        let enforcer = Arc::new(RecordingEnforcer::new());
        let settlement = Arc::new(RecordingSettlement::new());
        let consensus = Arc::new(ConsensusEngine::new(
            registry.clone(),
            clock.clone(),
            ConsensusConfig::default(),
        ));
        let metrics = Arc::new(MetricsEngine::new().unwrap());
        let trace = Arc::new(DecisionTrace::new(clock.clone(), self.config.mode));
        let health = Arc::new(HealthMonitor::new(
            metrics.clone(),
            trace.clone(),
            HealthThresholds::default(),
        ));

        let supervisor_registry: Arc<dyn CapabilityRegistry> = match self.supervisor_registry {
            Some(wrap) => wrap(registry.clone()),
            None => registry.clone(),
        };
        let mut supervisor = ExecutionSupervisor::new(
            Collaborators {
                registry: supervisor_registry,
                job_history: job_history.clone(),
                enforcer: enforcer.clone(),
                settlement: settlement.clone(),
            },
            consensus.clone(),
            metrics.clone(),
            trace.clone(),
            health.clone(),
            clock.clone(),
            self.config,
        );
        if let Some(lifecycle) = self.lifecycle {
            supervisor = supervisor.with_lifecycle(lifecycle);
        }

        Harness {
            clock,
            registry,
            job_history,
            enforcer,
            settlement,
            consensus,
            metrics,
            trace,
            health,
            supervisor: Arc::new(supervisor),
        }
    }
}

/// Two original workers, two spare workers and three verifiers.
pub fn default_profiles() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("w-a", "op-w", 60.0),
        AgentProfile::new("w-b", "op-w", 60.0),
        AgentProfile::new("w-spare-1", "op-s1", 90.0),
        AgentProfile::new("w-spare-2", "op-s2", 80.0),
        AgentProfile::new("v1", "op-v1", 70.0).with_capability("verification"),
        AgentProfile::new("v2", "op-v2", 70.0).with_capability("verification"),
        AgentProfile::new("v3", "op-v3", 70.0).with_capability("verification"),
    ]
}

pub async fn harness() -> Harness {
    HarnessBuilder::new().build().await
}

pub fn agent(id: &str) -> AgentId {
    AgentId::new(id)
}

pub fn work_contract(
    id: &str,
    worker: &str,
    verifiers: &[&str],
    max_retries: u32,
    deadline_ms: u64,
) -> WorkContract {
    WorkContract::new(
        ContractId::new(id),
        format!("prop-{id}"),
        "alice",
        ContractTerms::new(format!("scope of {id}"), 1_000, deadline_ms, max_retries),
        agent(worker),
        0,
    )
    .with_verifiers(verifiers.iter().map(|v| agent(v)).collect())
}

impl Harness {
    pub async fn contract(&self, id: &str) -> WorkContract {
        self.supervisor.get(&ContractId::new(id)).await.unwrap()
    }

    pub async fn decisions(&self, id: &str) -> Vec<DecisionType> {
        self.trace
            .by_contract(&ContractId::new(id))
            .await
            .into_iter()
            .map(|e| e.decision)
            .collect()
    }
}
