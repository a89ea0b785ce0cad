use crate::config::NodeConfig;
use anyhow::{Context, Result};
use overseer_assignment::AssignmentEngine;
use overseer_consensus::{ConsensusEngine, VerifierSelector};
use overseer_lifecycle::{LifecycleEvent, LifecycleManager};
use overseer_observability::{DecisionTrace, HealthMonitor, MetricsEngine, Observer};
use overseer_supervisor::{Collaborators, ExecutionSupervisor};
use overseer_types::{Clock, MemoryJobHistory, MemoryRegistry, RecordingEnforcer, RecordingSettlement};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Every engine wired together over in-memory collaborators.
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<MemoryRegistry>,
    pub job_history: Arc<MemoryJobHistory>,
    pub enforcer: Arc<RecordingEnforcer>,
    pub settlement: Arc<RecordingSettlement>,
    pub lifecycle: Arc<LifecycleManager>,
    pub consensus: Arc<ConsensusEngine>,
    pub metrics: Arc<MetricsEngine>,
    pub trace: Arc<DecisionTrace>,
    pub health: Arc<HealthMonitor>,
    pub supervisor: Arc<ExecutionSupervisor>,
    pub assignment: Arc<AssignmentEngine>,
    pub observer: Observer,
}

impl Services {
    /// Build the service graph. The receiver yields one event per lifecycle
    /// transition.
    pub fn build(
        config: &NodeConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LifecycleEvent>)> {
        let registry = Arc::new(MemoryRegistry::new());
        let job_history = Arc::new(MemoryJobHistory::new());
        let enforcer = Arc::new(RecordingEnforcer::new());
        let settlement = Arc::new(RecordingSettlement::new());

        let metrics = Arc::new(MetricsEngine::new().context("registering metrics")?);
        let trace = Arc::new(DecisionTrace::new(clock.clone(), config.supervisor.mode));
        let health = Arc::new(HealthMonitor::new(
            metrics.clone(),
            trace.clone(),
            config.health.clone(),
        ));

        let (lifecycle, events) = LifecycleManager::with_events(clock.clone(), config.lifecycle.clone());
        let lifecycle = Arc::new(lifecycle.with_gate(health.clone()));

        let consensus = Arc::new(ConsensusEngine::new(
            registry.clone(),
            clock.clone(),
            config.consensus.clone(),
        ));

        let supervisor = Arc::new(
            ExecutionSupervisor::new(
                Collaborators {
                    registry: registry.clone(),
                    job_history: job_history.clone(),
                    enforcer: enforcer.clone(),
                    settlement: settlement.clone(),
                },
                consensus.clone(),
                metrics.clone(),
                trace.clone(),
                health.clone(),
                clock.clone(),
                config.supervisor.clone(),
            )
            .with_lifecycle(lifecycle.clone()),
        );

        let selector = Arc::new(VerifierSelector::new(registry.clone(), config.selection.clone()));
        let assignment = Arc::new(
            AssignmentEngine::new(
                lifecycle.clone(),
                selector,
                enforcer.clone(),
                supervisor.clone(),
                clock.clone(),
            )
            .with_contract_defaults(config.supervisor.contract_defaults()),
        );

        let observer = Observer::new(metrics.clone(), trace.clone(), health.clone(), supervisor.clone())
            .with_recent_limit(config.node.recent_decisions);

        info!(
            node = %config.node.name,
            mode = %config.supervisor.mode,
            poll_interval_ms = config.supervisor.poll_interval_ms,
            "✨ Services wired"
        );

        Ok((
            Self {
                clock,
                registry,
                job_history,
                enforcer,
                settlement,
                lifecycle,
                consensus,
                metrics,
                trace,
                health,
                supervisor,
                assignment,
                observer,
            },
            events,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_lifecycle::{ContractState, ProposalRequest, TransitionRequest};
    use overseer_types::ManualClock;

    #[tokio::test]
    async fn test_lifecycle_events_flow_from_wired_manager() {
        let clock = Arc::new(ManualClock::new(0));
        let (services, mut events) = Services::build(&NodeConfig::default(), clock).unwrap();

        let contract = services
            .lifecycle
            .submit_proposal(ProposalRequest {
                proposer: "alice".to_string(),
                objective: "render".to_string(),
                budget: 10,
                deadline_ms: 1_000,
                risk_tolerance: None,
                constraints: None,
                max_retries: None,
            })
            .await
            .unwrap();
        services
            .lifecycle
            .transition(TransitionRequest::new(
                contract.contract_id.clone(),
                ContractState::Priced,
                "priced",
            ))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.contract_id, contract.contract_id);
        assert_eq!(event.to_state, ContractState::Priced);
        assert!(services.observer.snapshot().await.health.healthy);
    }
}
