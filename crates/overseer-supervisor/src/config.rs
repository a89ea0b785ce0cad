use overseer_contract::{ContractDefaults, VerificationRetryPolicy};
use overseer_types::{DeploymentMode, FailureType};
use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub poll_interval_ms: u64,
    pub mode: DeploymentMode,
    pub initial_grace_ms: u64,
    pub heartbeat_timeout_ms: u64,

    /// Stall is the more culpable condition and is quarantined longer
    pub stall_quarantine_ms: u64,
    pub crash_quarantine_ms: u64,
    pub verification_quarantine_ms: u64,
    pub timeout_quarantine_ms: u64,

    pub stall_slash_percent: u8,
    pub crash_slash_percent: u8,
    pub verification_slash_percent: u8,
    pub timeout_slash_percent: u8,

    /// Minimum reputation of a replacement worker
    pub replacement_min_reputation: f64,
    pub verification_retry_policy: VerificationRetryPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            mode: DeploymentMode::Local,
            initial_grace_ms: 60_000,
            heartbeat_timeout_ms: 30_000,
            stall_quarantine_ms: 30 * MINUTE_MS,
            crash_quarantine_ms: 10 * MINUTE_MS,
            verification_quarantine_ms: 30 * MINUTE_MS,
            timeout_quarantine_ms: 10 * MINUTE_MS,
            stall_slash_percent: 50,
            crash_slash_percent: 25,
            verification_slash_percent: 50,
            timeout_slash_percent: 25,
            replacement_min_reputation: 50.0,
            verification_retry_policy: VerificationRetryPolicy::Retry,
        }
    }
}

impl SupervisorConfig {
    pub fn contract_defaults(&self) -> ContractDefaults {
        ContractDefaults {
            initial_grace_ms: self.initial_grace_ms,
            heartbeat_timeout_ms: self.heartbeat_timeout_ms,
        }
    }

    pub fn quarantine_for(&self, failure_type: FailureType) -> u64 {
        match failure_type {
            FailureType::Stall => self.stall_quarantine_ms,
            FailureType::Crash => self.crash_quarantine_ms,
            FailureType::VerificationFailed => self.verification_quarantine_ms,
        }
    }

    pub fn slash_for(&self, failure_type: FailureType) -> u8 {
        match failure_type {
            FailureType::Stall => self.stall_slash_percent,
            FailureType::Crash => self.crash_slash_percent,
            FailureType::VerificationFailed => self.verification_slash_percent,
        }
    }
}
