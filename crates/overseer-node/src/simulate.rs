//! Local scenario driver: proposals flow through pricing, the assignment
//! queue, execution and verification against simulated agents, with a
//! seeded share of crashing and faulty workers.

use crate::config::NodeConfig;
use crate::services::Services;
use anyhow::{Context, Result};
use overseer_assignment::PendingAssignment;
use overseer_contract::ExecutionStatus;
use overseer_lifecycle::{ContractState, LifecycleError, ProposalConstraints, ProposalRequest, TransitionRequest};
use overseer_observability::ObserverSnapshot;
use overseer_types::{
    AgentId, AgentProfile, Clock, ContractId, ManualClock, RiskTolerance, SettlementInstruction,
    Verdict,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPUTE: &str = "compute";
const HEARTBEATS_TO_FINISH: u32 = 3;

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub contracts: usize,
    pub workers: usize,
    pub seed: u64,
    /// Share of attempts whose worker never heartbeats
    pub crash_rate: f64,
    /// Share of attempts whose result verifiers reject
    pub reject_rate: f64,
    pub step_ms: u64,
    pub max_steps: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            contracts: 10,
            workers: 6,
            seed: 7,
            crash_rate: 0.15,
            reject_rate: 0.15,
            step_ms: 10_000,
            max_steps: 500,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub generated_at: String,
    pub seed: u64,
    pub steps: usize,
    pub simulated_ms: u64,
    pub rejected_proposals: usize,
    pub lifecycle_transitions: usize,
    pub settlements: Vec<SettlementInstruction>,
    pub snapshot: ObserverSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Honest,
    Crash,
    Faulty,
}

struct Simulation {
    services: Services,
    clock: Arc<ManualClock>,
    rng: StdRng,
    options: SimulationOptions,
    workers: Vec<AgentId>,
    behaviours: HashMap<(ContractId, u32), Behaviour>,
}

/// Run a complete scenario and return the final observer snapshot.
pub async fn run_simulation(config: &NodeConfig, options: SimulationOptions) -> Result<SimulationReport> {
    let clock = Arc::new(ManualClock::new(0));
    let (services, mut events) = Services::build(config, clock.clone()).context("wiring services")?;

    let mut sim = Simulation {
        services,
        clock,
        rng: StdRng::seed_from_u64(options.seed),
        workers: Vec::new(),
        behaviours: HashMap::new(),
        options,
    };
    sim.register_agents().await;
    let rejected = sim.submit_proposals().await?;

    let mut steps = 0;
    while steps < sim.options.max_steps {
        sim.step().await?;
        steps += 1;
        if sim.is_settled().await {
            break;
        }
    }
    if !sim.is_settled().await {
        warn!(steps, "Simulation stopped with contracts still active");
    }

    let mut transitions = 0;
    while events.try_recv().is_ok() {
        transitions += 1;
    }

    let snapshot = sim.services.observer.snapshot().await;
    info!(
        steps,
        completed = snapshot.metrics.contracts.completed,
        failed = snapshot.metrics.contracts.failed,
        timeout = snapshot.metrics.contracts.timeout,
        "🏁 Simulation finished"
    );

    Ok(SimulationReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        seed: sim.options.seed,
        steps,
        simulated_ms: sim.services.clock.now_ms(),
        rejected_proposals: rejected,
        lifecycle_transitions: transitions,
        settlements: sim.services.settlement.instructions().await,
        snapshot,
    })
}

impl Simulation {
    async fn register_agents(&mut self) {
        for i in 0..self.options.workers {
            let id = format!("worker-{i}");
            let reputation = 60.0 + (i as f64 * 5.0) % 35.0;
            self.services
                .registry
                .register(
                    AgentProfile::new(id.as_str(), format!("op-worker-{i}"), reputation)
                        .with_capability(COMPUTE)
                        .with_fee(5),
                )
                .await;
            self.workers.push(AgentId::new(id));
        }
        for i in 0..4 {
            let mut profile = AgentProfile::new(format!("verifier-{i}"), format!("op-verifier-{i}"), 82.0 + i as f64 * 2.0)
                .with_capability("verification")
                .with_fee(20);
            if i % 2 == 0 {
                profile = profile.audited();
            }
            self.services.registry.register(profile).await;
        }
    }

    /// Submit, price and queue one proposal per contract. Returns how many
    /// proposals were refused.
    async fn submit_proposals(&mut self) -> Result<usize> {
        let mut rejected = 0;
        for n in 0..self.options.contracts {
            let risk = match n % 3 {
                0 => RiskTolerance::Low,
                1 => RiskTolerance::Medium,
                _ => RiskTolerance::High,
            };
            let request = ProposalRequest {
                proposer: format!("proposer-{}", n % 2),
                objective: format!("simulated job {n}"),
                budget: 100 + 10 * n as u64,
                deadline_ms: self.clock.now_ms() + 30 * 60_000,
                risk_tolerance: Some(risk),
                constraints: Some(ProposalConstraints {
                    required_capabilities: vec![COMPUTE.to_string()],
                    resource_limits: None,
                }),
                max_retries: None,
            };

            let contract = match self.services.lifecycle.submit_proposal(request).await {
                Ok(contract) => contract,
                Err(LifecycleError::SafeModeActive) => {
                    rejected += 1;
                    continue;
                }
                Err(e) => return Err(e).context("submitting proposal"),
            };
            self.services
                .lifecycle
                .transition(TransitionRequest::new(
                    contract.contract_id.clone(),
                    ContractState::Priced,
                    "priced",
                ))
                .await?;
            self.services
                .assignment
                .queue_assignment(PendingAssignment::from_contract(&contract))
                .await?;
        }
        Ok(rejected)
    }

    fn roll(&mut self) -> Behaviour {
        let roll: f64 = self.rng.gen();
        if roll < self.options.crash_rate {
            Behaviour::Crash
        } else if roll < self.options.crash_rate + self.options.reject_rate {
            Behaviour::Faulty
        } else {
            Behaviour::Honest
        }
    }

    async fn step(&mut self) -> Result<()> {
        self.accept_open_tasks().await;

        for contract in self.services.supervisor.snapshot().await {
            let id = contract.contract_id.clone();
            let key = (id.clone(), contract.verification_round);
            match contract.status {
                ExecutionStatus::Assigned => {
                    let behaviour = self.roll();
                    debug!(contract_id = %id, worker = %contract.worker, ?behaviour, "Attempt started");
                    self.behaviours.insert(key, behaviour);
                    self.services.supervisor.start_execution(&id).await?;
                }
                ExecutionStatus::Executing => {
                    let behaviour = self.behaviours.get(&key).copied().unwrap_or(Behaviour::Honest);
                    if behaviour == Behaviour::Crash {
                        continue;
                    }
                    if contract.heartbeats_received >= HEARTBEATS_TO_FINISH {
                        let payload = match behaviour {
                            Behaviour::Faulty => b"garbage".to_vec(),
                            _ => format!("result of {id}").into_bytes(),
                        };
                        self.services.supervisor.submit_work(&id, payload).await?;
                    } else {
                        let progress = ((contract.heartbeats_received + 1) * 100 / (HEARTBEATS_TO_FINISH + 1)) as u8;
                        self.services.supervisor.record_heartbeat(&id, Some(progress)).await?;
                    }
                }
                ExecutionStatus::Verifying => {
                    let verdict = match self.behaviours.get(&key) {
                        Some(Behaviour::Faulty) => Verdict::Fail,
                        _ => Verdict::Pass,
                    };
                    let submitted: BTreeSet<_> = contract
                        .verifier_submissions
                        .iter()
                        .map(|s| s.verifier_id.clone())
                        .collect();
                    for verifier in contract.verifiers.iter().filter(|v| !submitted.contains(v)) {
                        self.services
                            .supervisor
                            .add_verifier_submission(&id, verifier.clone(), verdict, "simulated check")
                            .await?;
                    }
                }
                _ => {}
            }
        }

        self.clock.advance(self.options.step_ms);
        self.services.supervisor.poll_once().await;
        Ok(())
    }

    async fn accept_open_tasks(&self) {
        let capabilities: BTreeSet<String> = [COMPUTE.to_string()].into_iter().collect();
        for worker in &self.workers {
            let Some(task) = self
                .services
                .assignment
                .poll_for_assignment(worker, &capabilities, 0)
                .await
            else {
                continue;
            };
            if let Err(e) = self.services.assignment.accept_assignment(&task.task_id, worker).await {
                debug!(task_id = %task.task_id, worker = %worker, error = %e, "Accept failed");
            }
        }
    }

    async fn is_settled(&self) -> bool {
        self.services.assignment.queue_len().await == 0 && self.services.supervisor.active_count().await == 0
    }
}
