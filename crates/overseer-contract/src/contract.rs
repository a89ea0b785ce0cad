use crate::error::{ContractError, Result};
use crate::types::{
    ContractTerms, ExecutionStatus, RetryEntry, VerificationRound, VerifierSubmission,
};
use overseer_lifecycle::LifecycleState;
use overseer_types::{AgentId, ContractId, FailureType, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Monitoring windows applied to new contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDefaults {
    /// Window after execution start in which missing heartbeats are tolerated
    pub initial_grace_ms: u64,
    /// Maximum silence between heartbeats once the grace period is over
    pub heartbeat_timeout_ms: u64,
}

impl Default for ContractDefaults {
    fn default() -> Self {
        Self {
            initial_grace_ms: 60_000,
            heartbeat_timeout_ms: 30_000,
        }
    }
}

/// Result of [`WorkContract::complete_verification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Completed,
    /// Verification failed and was recorded as a failure; the caller decides
    /// between reassignment and permanent failure.
    Failed { retry_charged: bool },
}

/// Execution-side record of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkContract {
    pub contract_id: ContractId,
    pub proposal_id: String,
    pub proposer: String,
    terms: ContractTerms,

    pub worker: AgentId,
    pub verifiers: Vec<AgentId>,
    pub former_workers: Vec<AgentId>,

    pub status: ExecutionStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub last_heartbeat: Option<u64>,
    pub heartbeats_received: u32,
    pub initial_grace_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub progress: u8,

    pub retry_count: u32,
    pub retry_history: Vec<RetryEntry>,

    pub result: Option<Vec<u8>>,
    pub verification_round: u32,
    pub verifier_submissions: Vec<VerifierSubmission>,
    pub verification_result: Option<bool>,
    pub past_rounds: Vec<VerificationRound>,

    pub completed_at: Option<u64>,
    pub terminal_reason: Option<String>,
}

impl WorkContract {
    pub fn new(
        contract_id: ContractId,
        proposal_id: impl Into<String>,
        proposer: impl Into<String>,
        terms: ContractTerms,
        worker: AgentId,
        now: u64,
    ) -> Self {
        let defaults = ContractDefaults::default();
        Self {
            contract_id,
            proposal_id: proposal_id.into(),
            proposer: proposer.into(),
            terms,
            worker,
            verifiers: Vec::new(),
            former_workers: Vec::new(),
            status: ExecutionStatus::Assigned,
            created_at: now,
            started_at: None,
            last_heartbeat: None,
            heartbeats_received: 0,
            initial_grace_ms: defaults.initial_grace_ms,
            heartbeat_timeout_ms: defaults.heartbeat_timeout_ms,
            progress: 0,
            retry_count: 0,
            retry_history: Vec::new(),
            result: None,
            verification_round: 0,
            verifier_submissions: Vec::new(),
            verification_result: None,
            past_rounds: Vec::new(),
            completed_at: None,
            terminal_reason: None,
        }
    }

    pub fn with_verifiers(mut self, verifiers: Vec<AgentId>) -> Self {
        self.verifiers = verifiers;
        self
    }

    pub fn with_monitoring(mut self, defaults: ContractDefaults) -> Self {
        self.initial_grace_ms = defaults.initial_grace_ms;
        self.heartbeat_timeout_ms = defaults.heartbeat_timeout_ms;
        self
    }

    /// The locked terms. There is no mutable accessor.
    pub fn terms(&self) -> &ContractTerms {
        &self.terms
    }

    pub fn deadline_ms(&self) -> u64 {
        self.terms.deadline_ms
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether `worker` currently holds or ever held this contract.
    pub fn has_held(&self, worker: &AgentId) -> bool {
        &self.worker == worker || self.former_workers.contains(worker)
    }

    pub fn is_past_deadline(&self, now: u64) -> bool {
        now > self.terms.deadline_ms
    }

    fn ensure_not_terminal(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(ContractError::TerminalState {
                contract_id: self.contract_id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_status(&self, operation: &'static str, expected: ExecutionStatus) -> Result<()> {
        self.ensure_not_terminal()?;
        if self.status != expected {
            return Err(ContractError::InvalidStatus {
                contract_id: self.contract_id.clone(),
                operation,
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    /// Every status change goes through the execution state table.
    fn advance(&mut self, next: ExecutionStatus) -> Result<()> {
        if !self.status.can_transition_to(&next) {
            return Err(ContractError::InvalidTransition {
                contract_id: self.contract_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start_execution(&mut self, now: u64) -> Result<()> {
        self.ensure_status("start", ExecutionStatus::Assigned)?;
        self.advance(ExecutionStatus::Executing)?;
        self.started_at = Some(now);
        // Baseline for staleness; does not count as a received heartbeat.
        self.last_heartbeat = Some(now);
        self.heartbeats_received = 0;
        info!(
            contract_id = %self.contract_id,
            worker = %self.worker,
            "▶️ Execution started"
        );
        Ok(())
    }

    /// Refresh liveness. Returns `Ok(false)` (and warns) when the contract is
    /// not executing.
    pub fn record_heartbeat(&mut self, progress: Option<u8>, now: u64) -> Result<bool> {
        if self.status != ExecutionStatus::Executing {
            warn!(
                contract_id = %self.contract_id,
                status = %self.status,
                "Heartbeat ignored: contract not executing"
            );
            return Ok(false);
        }
        if let Some(p) = progress {
            if p > 100 {
                return Err(ContractError::InvalidProgress(p));
            }
            self.progress = p;
        }
        self.last_heartbeat = Some(now);
        self.heartbeats_received += 1;
        debug!(
            contract_id = %self.contract_id,
            progress = self.progress,
            "💓 Heartbeat"
        );
        Ok(true)
    }

    pub fn is_grace_period_elapsed(&self, now: u64) -> bool {
        match self.started_at {
            Some(started) => now.saturating_sub(started) > self.initial_grace_ms,
            None => false,
        }
    }

    pub fn is_heartbeat_stale(&self, now: u64) -> bool {
        if self.heartbeats_received == 0 {
            return true;
        }
        match self.last_heartbeat {
            Some(last) => now.saturating_sub(last) > self.heartbeat_timeout_ms,
            None => true,
        }
    }

    /// CRASH when the worker never sent a heartbeat; STALL when it sent at
    /// least one and went silent after the grace period.
    pub fn detect_failure_type(&self, now: u64) -> FailureType {
        if self.heartbeats_received == 0 {
            return FailureType::Crash;
        }
        if self.is_grace_period_elapsed(now) && self.is_heartbeat_stale(now) {
            FailureType::Stall
        } else {
            FailureType::Crash
        }
    }

    pub fn submit_work(&mut self, result: Vec<u8>, _now: u64) -> Result<()> {
        self.ensure_status("submit work for", ExecutionStatus::Executing)?;
        self.advance(ExecutionStatus::Verifying)?;
        self.progress = 100;
        info!(
            contract_id = %self.contract_id,
            worker = %self.worker,
            result_bytes = result.len(),
            "📦 Work submitted for verification"
        );
        self.result = Some(result);
        Ok(())
    }

    /// Pass completes the contract. Fail only records a
    /// [`FailureType::VerificationFailed`] failure and leaves the status as is.
    pub fn complete_verification(&mut self, passed: bool, now: u64) -> Result<VerificationOutcome> {
        self.ensure_status("complete verification of", ExecutionStatus::Verifying)?;
        self.verification_result = Some(passed);

        if passed {
            self.advance(ExecutionStatus::Completed)?;
            self.completed_at = Some(now);
            info!(contract_id = %self.contract_id, worker = %self.worker, "✅ Contract completed");
            return Ok(VerificationOutcome::Completed);
        }

        let retry_charged =
            self.record_failure(FailureType::VerificationFailed, "verification consensus failed", now)?;
        Ok(VerificationOutcome::Failed { retry_charged })
    }

    /// Append a failure to the history. A retry is charged only while the
    /// budget allows; the return value says whether one was.
    pub fn record_failure(
        &mut self,
        failure_type: FailureType,
        reason: impl Into<String>,
        now: u64,
    ) -> Result<bool> {
        self.ensure_not_terminal()?;
        let reason = reason.into();
        self.retry_history.push(RetryEntry {
            worker: self.worker.clone(),
            failure_type,
            timestamp: now,
            reason: reason.clone(),
        });

        let charged = self.can_retry();
        if charged {
            self.retry_count += 1;
        }

        warn!(
            contract_id = %self.contract_id,
            worker = %self.worker,
            failure_type = %failure_type,
            retry_count = self.retry_count,
            max_retries = self.terms.max_retries,
            retry_charged = charged,
            reason = %reason,
            "⚠️ Failure recorded"
        );
        Ok(charged)
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.terms.max_retries
    }

    /// Hand the contract to a new worker and open a fresh monitoring window.
    /// History and earlier verification rounds are kept.
    pub fn reassign_worker(&mut self, new_worker: AgentId, _now: u64) -> Result<()> {
        self.ensure_not_terminal()?;
        if self.has_held(&new_worker) {
            return Err(ContractError::WorkerAlreadyHeld {
                contract_id: self.contract_id.clone(),
                worker: new_worker,
            });
        }

        let previous = std::mem::replace(&mut self.worker, new_worker);
        self.past_rounds.push(VerificationRound {
            round: self.verification_round,
            worker: previous.clone(),
            submissions: std::mem::take(&mut self.verifier_submissions),
            result: self.verification_result.take(),
        });
        self.verification_round += 1;
        self.former_workers.push(previous.clone());

        self.advance(ExecutionStatus::Assigned)?;
        self.started_at = None;
        self.last_heartbeat = None;
        self.heartbeats_received = 0;
        self.progress = 0;
        self.result = None;

        info!(
            contract_id = %self.contract_id,
            from = %previous,
            to = %self.worker,
            round = self.verification_round,
            "🔁 Worker reassigned"
        );
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>, now: u64) -> Result<()> {
        self.ensure_not_terminal()?;
        let reason = reason.into();
        self.advance(ExecutionStatus::Failed)?;
        self.completed_at = Some(now);
        info!(contract_id = %self.contract_id, reason = %reason, "❌ Contract failed");
        self.terminal_reason = Some(reason);
        Ok(())
    }

    pub fn mark_timeout(&mut self, now: u64) -> Result<()> {
        self.ensure_not_terminal()?;
        self.advance(ExecutionStatus::Timeout)?;
        self.completed_at = Some(now);
        self.terminal_reason = Some(format!(
            "deadline {} exceeded at {}",
            self.terms.deadline_ms, now
        ));
        info!(contract_id = %self.contract_id, deadline_ms = self.terms.deadline_ms, "⏰ Contract timed out");
        Ok(())
    }

    /// Whether `verifier_id` may submit now. Leaves the contract untouched.
    pub fn check_submission(&self, verifier_id: &AgentId) -> Result<()> {
        if self.status != ExecutionStatus::Verifying {
            return Err(ContractError::NotVerifying {
                contract_id: self.contract_id.clone(),
                status: self.status,
            });
        }
        if !self.verifiers.contains(verifier_id) {
            return Err(ContractError::VerifierNotAssigned {
                contract_id: self.contract_id.clone(),
                verifier: verifier_id.clone(),
            });
        }
        if self
            .verifier_submissions
            .iter()
            .any(|s| &s.verifier_id == verifier_id)
        {
            return Err(ContractError::DuplicateSubmission {
                contract_id: self.contract_id.clone(),
                verifier: verifier_id.clone(),
            });
        }
        Ok(())
    }

    /// Record one verifier's verdict. Returns the number of submissions so far.
    pub fn add_verifier_submission(
        &mut self,
        verifier_id: AgentId,
        verdict: Verdict,
        reason: impl Into<String>,
        now: u64,
    ) -> Result<usize> {
        self.check_submission(&verifier_id)?;

        debug!(
            contract_id = %self.contract_id,
            verifier = %verifier_id,
            verdict = ?verdict,
            "🗳️ Verifier submission"
        );
        self.verifier_submissions.push(VerifierSubmission {
            verifier_id,
            verdict,
            reason: reason.into(),
            timestamp: now,
        });
        Ok(self.verifier_submissions.len())
    }

    pub fn all_verifiers_submitted(&self) -> bool {
        !self.verifiers.is_empty() && self.verifier_submissions.len() == self.verifiers.len()
    }
}
