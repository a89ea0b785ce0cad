use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk tolerance declared by the proposer; drives verifier count and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

/// A verifier's judgement of a submitted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Classification of a failed execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    /// Heartbeated at least once, then went silent after the grace period.
    Stall,
    /// Never heartbeated.
    Crash,
    /// Submitted a result the verifiers rejected.
    VerificationFailed,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stall => f.write_str("STALL"),
            Self::Crash => f.write_str("CRASH"),
            Self::VerificationFailed => f.write_str("VERIFICATION_FAILED"),
        }
    }
}

/// How enforcement actions are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Workers run as local processes: kill the process and quarantine.
    #[default]
    Local,
    /// Workers post bonds: slash the bond instead of killing a process.
    TrustMinimized,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::TrustMinimized => f.write_str("trust_minimized"),
        }
    }
}

/// Resource-limit contract handed to whatever sandbox runs the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_runtime_seconds: u64,
    pub max_cpu_seconds: u64,
    pub max_memory_mb: u64,
    pub max_output_size_kb: u64,
    pub network_allowed: bool,
    pub filesystem_write: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_runtime_seconds: 3_600, // 1 hour
            max_cpu_seconds: 1_800,
            max_memory_mb: 2_048,
            max_output_size_kb: 10_240, // 10 MB
            network_allowed: false,
            filesystem_write: false,
        }
    }
}

impl ResourceLimits {
    /// Clamp the runtime so the sandbox cannot outlive the contract deadline.
    pub fn bounded_by_deadline(mut self, now_ms: u64, deadline_ms: u64) -> Self {
        let remaining_secs = deadline_ms.saturating_sub(now_ms) / 1_000;
        self.max_runtime_seconds = self.max_runtime_seconds.min(remaining_secs);
        self.max_cpu_seconds = self.max_cpu_seconds.min(self.max_runtime_seconds);
        self
    }
}
