use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use async_trait::async_trait;
use overseer_assignment::{AssignmentError, ContractSink};
use overseer_consensus::{ConsensusEngine, ConsensusOutcome, RoundKey};
use overseer_contract::{
    decide_disposition, ExecutionStatus, FailureDisposition, VerificationOutcome, WorkContract,
    FAILURE_REFUND_PERCENT, TIMEOUT_REFUND_PERCENT,
};
use overseer_lifecycle::{ContractState, LifecycleError, LifecycleManager, TransitionRequest};
use overseer_observability::{
    ContractSummary, ContractView, DecisionTrace, DecisionType, HealthMonitor, MetricsEngine,
};
use overseer_types::{
    AgentId, CapabilityRegistry, Clock, ContractId, DeploymentMode, EnforcementAction, Enforcer,
    FailureType, JobHistoryEntry, JobHistoryStore, JobOutcome, RegistryQuery, Settlement,
    SettlementInstruction, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// External systems the supervisor acts through.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn CapabilityRegistry>,
    pub job_history: Arc<dyn JobHistoryStore>,
    pub enforcer: Arc<dyn Enforcer>,
    pub settlement: Arc<dyn Settlement>,
}

/// What one poll pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub examined: usize,
    pub timed_out: usize,
    pub failures: usize,
    pub reassigned: usize,
    pub completed: usize,
    pub failed: usize,
    pub errors: usize,
}

pub struct ExecutionSupervisor {
    contracts: RwLock<HashMap<ContractId, Arc<Mutex<WorkContract>>>>,
    consensus: Arc<ConsensusEngine>,
    lifecycle: Option<Arc<LifecycleManager>>,
    collaborators: Collaborators,
    metrics: Arc<MetricsEngine>,
    trace: Arc<DecisionTrace>,
    health: Arc<HealthMonitor>,
    clock: Arc<dyn Clock>,
    config: SupervisorConfig,
}

impl ExecutionSupervisor {
    pub fn new(
        collaborators: Collaborators,
        consensus: Arc<ConsensusEngine>,
        metrics: Arc<MetricsEngine>,
        trace: Arc<DecisionTrace>,
        health: Arc<HealthMonitor>,
        clock: Arc<dyn Clock>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            contracts: RwLock::new(HashMap::new()),
            consensus,
            lifecycle: None,
            collaborators,
            metrics,
            trace,
            health,
            clock,
            config,
        }
    }

    /// Mirror supervision outcomes onto lifecycle records.
    pub fn with_lifecycle(mut self, lifecycle: Arc<LifecycleManager>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Boundaries
    // ------------------------------------------------------------------

    /// Take ownership of a newly accepted contract and open its first
    /// verification round.
    pub async fn register_contract(&self, contract: WorkContract) -> Result<()> {
        let id = contract.contract_id.clone();
        let mut contracts = self.contracts.write().await;
        if contracts.contains_key(&id) {
            return Err(SupervisorError::DuplicateContract(id));
        }

        self.consensus
            .open_round(
                RoundKey::new(id.clone(), contract.verification_round),
                contract.verifiers.clone(),
            )
            .await?;

        self.metrics.contract_created(&contract.worker).await;
        self.trace
            .record(
                Some(&id),
                DecisionType::ContractCreated,
                format!("assigned to {}", contract.worker),
                json!({
                    "worker": contract.worker,
                    "verifiers": contract.verifiers,
                    "budget": contract.terms().budget,
                    "deadline_ms": contract.terms().deadline_ms,
                    "max_retries": contract.terms().max_retries,
                }),
            )
            .await;

        info!(
            contract_id = %id,
            worker = %contract.worker,
            verifiers = contract.verifiers.len(),
            deadline_ms = contract.terms().deadline_ms,
            "📋 Contract under supervision"
        );
        contracts.insert(id, Arc::new(Mutex::new(contract)));
        Ok(())
    }

    async fn cell(&self, contract_id: &ContractId) -> Result<Arc<Mutex<WorkContract>>> {
        self.contracts
            .read()
            .await
            .get(contract_id)
            .cloned()
            .ok_or_else(|| SupervisorError::ContractNotFound(contract_id.clone()))
    }

    pub async fn start_execution(&self, contract_id: &ContractId) -> Result<()> {
        let cell = self.cell(contract_id).await?;
        let mut contract = cell.lock().await;
        contract.start_execution(self.clock.now_ms())?;
        self.trace
            .record(
                Some(contract_id),
                DecisionType::ExecutionStarted,
                format!("worker {} started", contract.worker),
                json!({ "worker": contract.worker, "round": contract.verification_round }),
            )
            .await;
        Ok(())
    }

    /// Returns `false` when the heartbeat was ignored because the contract
    /// is not executing.
    pub async fn record_heartbeat(&self, contract_id: &ContractId, progress: Option<u8>) -> Result<bool> {
        let cell = self.cell(contract_id).await?;
        let mut contract = cell.lock().await;
        let accepted = contract.record_heartbeat(progress, self.clock.now_ms())?;
        if accepted {
            self.trace
                .record(
                    Some(contract_id),
                    DecisionType::HeartbeatReceived,
                    format!("progress {}%", contract.progress),
                    json!({ "worker": contract.worker, "progress": contract.progress }),
                )
                .await;
        }
        Ok(accepted)
    }

    pub async fn submit_work(&self, contract_id: &ContractId, result: Vec<u8>) -> Result<()> {
        let cell = self.cell(contract_id).await?;
        let mut contract = cell.lock().await;
        contract.submit_work(result, self.clock.now_ms())?;
        Ok(())
    }

    /// Record a verifier's vote on the contract and in its consensus round.
    /// Returns the number of submissions received so far.
    pub async fn add_verifier_submission(
        &self,
        contract_id: &ContractId,
        verifier: AgentId,
        verdict: Verdict,
        reason: impl Into<String>,
    ) -> Result<usize> {
        let cell = self.cell(contract_id).await?;
        let mut contract = cell.lock().await;
        contract.check_submission(&verifier)?;

        // The round accepts the vote before the contract records it
        let key = RoundKey::new(contract_id.clone(), contract.verification_round);
        let outcome = self.consensus.record_vote(&key, &verifier, verdict).await?;
        let count =
            contract.add_verifier_submission(verifier, verdict, reason, self.clock.now_ms())?;
        if let Some(outcome) = outcome {
            debug!(
                contract_id = %contract_id,
                passed = outcome.passed,
                "Consensus reached; applied on next poll"
            );
        }
        Ok(count)
    }

    pub async fn get(&self, contract_id: &ContractId) -> Option<WorkContract> {
        let cell = self.contracts.read().await.get(contract_id).cloned()?;
        let contract = cell.lock().await;
        Some(contract.clone())
    }

    /// All supervised contracts, ordered by id.
    pub async fn snapshot(&self) -> Vec<WorkContract> {
        let mut out = Vec::new();
        for (_, cell) in self.entries().await {
            out.push(cell.lock().await.clone());
        }
        out
    }

    pub async fn active_count(&self) -> usize {
        let mut active = 0;
        for (_, cell) in self.entries().await {
            if cell.lock().await.status.is_active() {
                active += 1;
            }
        }
        active
    }

    async fn entries(&self) -> Vec<(ContractId, Arc<Mutex<WorkContract>>)> {
        let mut entries: Vec<_> = self
            .contracts
            .read()
            .await
            .iter()
            .map(|(id, cell)| (id.clone(), cell.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // ------------------------------------------------------------------
    // Poll loop
    // ------------------------------------------------------------------

    /// Drive [`poll_once`](Self::poll_once) until `shutdown` flips to true.
    /// Each pass completes before the next tick is taken.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            mode = %self.config.mode,
            "🛰️ Supervisor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.poll_once().await;
                    if report.examined > 0 {
                        debug!(?report, "Poll pass complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("🛑 Supervisor stopped");
    }

    /// One sequential pass over all active contracts, followed by a health
    /// check.
    pub async fn poll_once(&self) -> PollReport {
        let start = Instant::now();
        let now = self.clock.now_ms();
        let mut report = PollReport::default();

        for (id, cell) in self.entries().await {
            let mut contract = cell.lock().await;
            if !contract.status.is_active() {
                continue;
            }
            report.examined += 1;
            if let Err(e) = self.evaluate(&mut contract, now, &mut report).await {
                report.errors += 1;
                error!(contract_id = %id, error = %e, "Supervision step failed");
            }
        }

        let health = self.health.check().await;
        debug!(
            examined = report.examined,
            healthy = health.healthy,
            duration_ms = start.elapsed().as_millis() as u64,
            "Poll pass"
        );
        report
    }

    async fn evaluate(&self, contract: &mut WorkContract, now: u64, report: &mut PollReport) -> Result<()> {
        if self.check_deadline(contract, now).await? {
            report.timed_out += 1;
            return Ok(());
        }
        match contract.status {
            ExecutionStatus::Executing => self.check_heartbeat(contract, now, report).await,
            ExecutionStatus::Verifying => self.check_verification(contract, now, report).await,
            _ => Ok(()),
        }
    }

    async fn check_deadline(&self, contract: &mut WorkContract, now: u64) -> Result<bool> {
        if !contract.is_past_deadline(now) {
            return Ok(false);
        }
        let id = contract.contract_id.clone();
        let worker = contract.worker.clone();
        let reason = format!(
            "deadline {} exceeded by {}ms",
            contract.deadline_ms(),
            now - contract.deadline_ms()
        );

        self.kill_worker(
            contract,
            &reason,
            self.config.timeout_quarantine_ms,
            self.config.timeout_slash_percent,
            now,
        )
        .await;
        contract.mark_timeout(now)?;

        self.settle(SettlementInstruction::Refund {
            contract_id: id.clone(),
            proposal_id: contract.proposal_id.clone(),
            percent: TIMEOUT_REFUND_PERCENT,
        })
        .await;
        self.metrics.contract_timed_out(&worker).await;
        self.record_history(contract, JobOutcome::Timeout, &reason, now).await;
        self.trace
            .record(
                Some(&id),
                DecisionType::ContractTimeout,
                reason.clone(),
                json!({ "worker": worker, "refund_percent": TIMEOUT_REFUND_PERCENT }),
            )
            .await;
        self.mirror(&id, &[ContractState::Timeout], "deadline_exceeded").await;

        warn!(contract_id = %id, worker = %worker, "⏰ Contract timed out; full refund");
        Ok(true)
    }

    async fn check_heartbeat(&self, contract: &mut WorkContract, now: u64, report: &mut PollReport) -> Result<()> {
        if !contract.is_grace_period_elapsed(now) || !contract.is_heartbeat_stale(now) {
            return Ok(());
        }

        let failure_type = contract.detect_failure_type(now);
        let silence = now.saturating_sub(contract.last_heartbeat.unwrap_or(now));
        let reason = match failure_type {
            FailureType::Stall => format!("heartbeat stale for {silence}ms after progress"),
            _ => "no heartbeat received since execution start".to_string(),
        };

        self.kill_worker(
            contract,
            &reason,
            self.config.quarantine_for(failure_type),
            self.config.slash_for(failure_type),
            now,
        )
        .await;

        let worker = contract.worker.clone();
        let retry_charged = contract.record_failure(failure_type, reason.clone(), now)?;
        report.failures += 1;
        self.metrics.failure_recorded(&worker, failure_type, retry_charged).await;
        self.record_history(contract, JobOutcome::Failed { failure_type }, &reason, now)
            .await;

        self.apply_disposition(contract, failure_type, retry_charged, now, report)
            .await
    }

    async fn check_verification(
        &self,
        contract: &mut WorkContract,
        now: u64,
        report: &mut PollReport,
    ) -> Result<()> {
        if !contract.all_verifiers_submitted() {
            return Ok(());
        }
        let key = RoundKey::new(contract.contract_id.clone(), contract.verification_round);
        let Some(outcome) = self.consensus.outcome(&key).await else {
            debug!(round = %key, "All submissions in; consensus not yet finalized");
            return Ok(());
        };

        for vote in &outcome.votes {
            self.metrics
                .verifier_voted(&vote.verifier, outcome.outliers.contains(&vote.verifier))
                .await;
        }
        if !outcome.outliers.is_empty() {
            warn!(
                round = %key,
                outliers = ?outcome.outliers.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
                "Outlier verifiers penalized"
            );
        }

        if outcome.passed {
            self.finalize_success(contract, &outcome, now).await?;
            report.completed += 1;
            Ok(())
        } else {
            self.handle_verification_failure(contract, &outcome, now, report)
                .await
        }
    }

    async fn finalize_success(
        &self,
        contract: &mut WorkContract,
        outcome: &ConsensusOutcome,
        now: u64,
    ) -> Result<()> {
        contract.complete_verification(true, now)?;
        let id = contract.contract_id.clone();
        let worker = contract.worker.clone();

        self.settle(SettlementInstruction::Payout {
            contract_id: id.clone(),
            worker: worker.clone(),
            percent: 100,
        })
        .await;
        self.metrics.contract_completed(&worker).await;
        self.record_history(contract, JobOutcome::Completed, "verification passed", now)
            .await;

        self.trace
            .record(
                Some(&id),
                DecisionType::VerificationPassed,
                format!("{} of {} verifiers", outcome.votes.len(), contract.verifiers.len()),
                json!({ "votes": outcome.votes, "outliers": outcome.outliers }),
            )
            .await;
        self.trace
            .record(
                Some(&id),
                DecisionType::ContractCompleted,
                format!("completed by {worker}"),
                json!({ "worker": worker, "payout_percent": 100 }),
            )
            .await;
        self.mirror(
            &id,
            &[ContractState::Verifying, ContractState::Completed],
            "verification_passed",
        )
        .await;
        Ok(())
    }

    async fn handle_verification_failure(
        &self,
        contract: &mut WorkContract,
        outcome: &ConsensusOutcome,
        now: u64,
        report: &mut PollReport,
    ) -> Result<()> {
        let id = contract.contract_id.clone();
        let worker = contract.worker.clone();
        let reason = "verification consensus failed".to_string();

        let penalty = match self.config.mode {
            DeploymentMode::Local => EnforcementAction::Quarantine {
                worker: worker.clone(),
                until_ms: now + self.config.verification_quarantine_ms,
                reason: reason.clone(),
            },
            DeploymentMode::TrustMinimized => EnforcementAction::SlashBond {
                contract_id: id.clone(),
                worker: worker.clone(),
                percent: self.config.verification_slash_percent,
                reason: reason.clone(),
            },
        };
        self.enforce(penalty).await;

        self.trace
            .record(
                Some(&id),
                DecisionType::VerificationFailed,
                reason.clone(),
                json!({
                    "worker": worker,
                    "votes": outcome.votes,
                    "outliers": outcome.outliers,
                }),
            )
            .await;

        let retry_charged = match contract.complete_verification(false, now)? {
            VerificationOutcome::Failed { retry_charged } => retry_charged,
            VerificationOutcome::Completed => return Ok(()),
        };
        report.failures += 1;
        self.metrics
            .failure_recorded(&worker, FailureType::VerificationFailed, retry_charged)
            .await;
        self.record_history(
            contract,
            JobOutcome::Failed {
                failure_type: FailureType::VerificationFailed,
            },
            &reason,
            now,
        )
        .await;

        self.apply_disposition(contract, FailureType::VerificationFailed, retry_charged, now, report)
            .await
    }

    /// Shared retry-vs-fail branch for liveness and verification failures.
    async fn apply_disposition(
        &self,
        contract: &mut WorkContract,
        failure_type: FailureType,
        retry_charged: bool,
        now: u64,
        report: &mut PollReport,
    ) -> Result<()> {
        let replacement = if retry_charged {
            self.find_replacement(contract, now).await
        } else {
            None
        };
        let searched = retry_charged;
        let found = replacement.is_some();

        let id = contract.contract_id.clone();
        let mut disposition = decide_disposition(
            contract,
            failure_type,
            retry_charged,
            replacement,
            self.config.verification_retry_policy,
        );

        // The replacement's round must exist before the contract changes hands
        let mut round_unavailable = false;
        if matches!(disposition, FailureDisposition::Reassign { .. }) {
            let key = RoundKey::new(id.clone(), contract.verification_round + 1);
            if let Err(e) = self.consensus.open_round(key, contract.verifiers.clone()).await {
                error!(contract_id = %id, error = %e, "Could not open verification round for replacement");
                round_unavailable = true;
                disposition = FailureDisposition::Fail {
                    refund_percent: FAILURE_REFUND_PERCENT,
                };
            }
        }

        match disposition {
            FailureDisposition::Reassign { worker } => {
                let previous = contract.worker.clone();
                contract.reassign_worker(worker.clone(), now)?;
                self.metrics.worker_reassigned(&worker).await;
                self.trace
                    .record(
                        Some(&id),
                        DecisionType::WorkReassigned,
                        format!("{failure_type} by {previous}; reassigned to {worker}"),
                        json!({
                            "from": previous,
                            "to": worker,
                            "failure_type": failure_type,
                            "retry_count": contract.retry_count,
                            "max_retries": contract.terms().max_retries,
                        }),
                    )
                    .await;
                self.mirror(&id, &[ContractState::Executing], "worker_reassigned").await;
                report.reassigned += 1;
            }
            FailureDisposition::Fail { refund_percent } => {
                let reason = if !retry_charged {
                    format!(
                        "{failure_type}: retries exhausted ({}/{})",
                        contract.retry_count,
                        contract.terms().max_retries
                    )
                } else if round_unavailable {
                    format!("{failure_type}: verification round unavailable")
                } else if searched && !found {
                    format!("{failure_type}: no replacement worker available")
                } else {
                    format!("{failure_type}: worker disqualified")
                };
                contract.mark_failed(reason.clone(), now)?;
                self.settle(SettlementInstruction::Refund {
                    contract_id: id.clone(),
                    proposal_id: contract.proposal_id.clone(),
                    percent: refund_percent,
                })
                .await;
                self.metrics.contract_failed();
                self.trace
                    .record(
                        Some(&id),
                        DecisionType::ContractFailed,
                        reason.clone(),
                        json!({
                            "worker": contract.worker,
                            "failure_type": failure_type,
                            "retry_count": contract.retry_count,
                            "refund_percent": refund_percent,
                        }),
                    )
                    .await;
                let path: &[ContractState] = if failure_type == FailureType::VerificationFailed {
                    &[ContractState::Verifying, ContractState::Failed]
                } else {
                    &[ContractState::Failed]
                };
                self.mirror(&id, path, "contract_failed").await;
                report.failed += 1;
                warn!(contract_id = %id, reason = %reason, refund_percent, "❌ Contract failed permanently");
            }
        }
        Ok(())
    }

    /// Highest-reputation registry candidate that never held the contract,
    /// is not one of its verifiers, and is not quarantined. A registry error
    /// counts as no candidate.
    async fn find_replacement(&self, contract: &WorkContract, now: u64) -> Option<AgentId> {
        let query = RegistryQuery::min_reputation(self.config.replacement_min_reputation)
            .excluding(std::iter::once(&contract.worker))
            .excluding(contract.former_workers.iter())
            .excluding(contract.verifiers.iter());
        let mut candidates = match self.collaborators.registry.query(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(contract_id = %contract.contract_id, error = %e, "Replacement lookup failed");
                return None;
            }
        };
        candidates.sort_by(|a, b| {
            b.reputation
                .partial_cmp(&a.reputation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        for candidate in candidates {
            if self
                .collaborators
                .enforcer
                .is_quarantined(&candidate.id, now)
                .await
            {
                debug!(candidate = %candidate.id, "Skipping quarantined replacement");
                continue;
            }
            return Some(candidate.id);
        }
        None
    }

    // ------------------------------------------------------------------
    // Collaborator calls. Failures are logged; supervision continues so no
    // contract is left unresolved.
    // ------------------------------------------------------------------

    async fn kill_worker(
        &self,
        contract: &WorkContract,
        reason: &str,
        quarantine_ms: u64,
        slash_percent: u8,
        now: u64,
    ) {
        let id = contract.contract_id.clone();
        let worker = contract.worker.clone();
        let actions = match self.config.mode {
            DeploymentMode::Local => vec![
                EnforcementAction::TerminateProcess {
                    contract_id: id.clone(),
                    worker: worker.clone(),
                    reason: reason.to_string(),
                },
                EnforcementAction::Quarantine {
                    worker: worker.clone(),
                    until_ms: now + quarantine_ms,
                    reason: reason.to_string(),
                },
            ],
            DeploymentMode::TrustMinimized => vec![EnforcementAction::SlashBond {
                contract_id: id.clone(),
                worker: worker.clone(),
                percent: slash_percent,
                reason: reason.to_string(),
            }],
        };
        for action in actions {
            self.enforce(action).await;
        }

        self.trace
            .record(
                Some(&id),
                DecisionType::WorkerKilled,
                reason.to_string(),
                json!({
                    "worker": worker,
                    "quarantine_ms": quarantine_ms,
                    "slash_percent": slash_percent,
                }),
            )
            .await;
        warn!(contract_id = %id, worker = %worker, reason, "🔪 Worker killed");
    }

    async fn enforce(&self, action: EnforcementAction) {
        let target = action.target().clone();
        if let Err(e) = self.collaborators.enforcer.enforce(action).await {
            error!(worker = %target, error = %e, "Enforcement action failed");
        }
    }

    async fn settle(&self, instruction: SettlementInstruction) {
        let contract_id = instruction.contract_id().clone();
        let percent = instruction.percent();
        match self.collaborators.settlement.settle(instruction).await {
            Ok(()) => info!(contract_id = %contract_id, percent, "💰 Settlement issued"),
            Err(e) => error!(contract_id = %contract_id, error = %e, "Settlement failed"),
        }
    }

    async fn record_history(&self, contract: &WorkContract, outcome: JobOutcome, reason: &str, now: u64) {
        let entry = JobHistoryEntry {
            entry_id: JobHistoryEntry::entry_id_for(
                &contract.contract_id,
                &contract.worker,
                contract.verification_round,
            ),
            contract_id: contract.contract_id.clone(),
            worker: contract.worker.clone(),
            outcome,
            reason: reason.to_string(),
            recorded_at_ms: now,
        };
        match self.collaborators.job_history.record(entry).await {
            Ok(true) => {}
            Ok(false) => debug!(contract_id = %contract.contract_id, "Job history entry already recorded"),
            Err(e) => error!(contract_id = %contract.contract_id, error = %e, "Job history write failed"),
        }
    }

    /// Apply lifecycle transitions in order, stopping at the first failure.
    async fn mirror(&self, contract_id: &ContractId, states: &[ContractState], event: &str) {
        let Some(lifecycle) = &self.lifecycle else {
            return;
        };
        for &state in states {
            let request = TransitionRequest::new(contract_id.clone(), state, event);
            match lifecycle.transition(request).await {
                Ok(_) => {}
                Err(LifecycleError::ContractNotFound(_)) => {
                    debug!(contract_id = %contract_id, "No lifecycle record to mirror");
                    return;
                }
                Err(e) => {
                    warn!(contract_id = %contract_id, error = %e, "Lifecycle mirror rejected");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ContractSink for ExecutionSupervisor {
    async fn hand_over(&self, contract: WorkContract) -> overseer_assignment::Result<()> {
        self.register_contract(contract)
            .await
            .map_err(|e| AssignmentError::Handover(e.to_string()))
    }

    async fn submit_result(&self, contract_id: &ContractId, result: Vec<u8>) -> overseer_assignment::Result<()> {
        self.submit_work(contract_id, result)
            .await
            .map_err(|e| AssignmentError::Handover(e.to_string()))
    }
}

#[async_trait]
impl ContractView for ExecutionSupervisor {
    async fn contract_summaries(&self) -> Vec<ContractSummary> {
        self.snapshot().await.iter().map(ContractSummary::from).collect()
    }

    async fn contract_summary(&self, contract_id: &ContractId) -> Option<ContractSummary> {
        self.get(contract_id).await.as_ref().map(ContractSummary::from)
    }
}
