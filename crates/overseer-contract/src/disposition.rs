use crate::contract::WorkContract;
use overseer_types::{AgentId, FailureType};
use serde::{Deserialize, Serialize};

/// Refund to the proposer when a contract fails permanently.
pub const FAILURE_REFUND_PERCENT: u8 = 80;
/// Refund to the proposer when a contract misses its deadline.
pub const TIMEOUT_REFUND_PERCENT: u8 = 100;

/// Whether a verification failure may be retried with another worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationRetryPolicy {
    /// Treat it like a liveness failure: reassign while retries remain
    #[default]
    Retry,
    /// A verified-bad result fails the contract immediately
    Disqualify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum FailureDisposition {
    Reassign { worker: AgentId },
    Fail { refund_percent: u8 },
}

/// Retry-vs-fail decision after a failure has been recorded on `contract`.
///
/// `retry_charged` is the value returned by
/// [`WorkContract::record_failure`]; `replacement` is the best candidate
/// found by the caller, if any.
pub fn decide_disposition(
    contract: &WorkContract,
    failure_type: FailureType,
    retry_charged: bool,
    replacement: Option<AgentId>,
    policy: VerificationRetryPolicy,
) -> FailureDisposition {
    let fail = FailureDisposition::Fail {
        refund_percent: FAILURE_REFUND_PERCENT,
    };

    if failure_type == FailureType::VerificationFailed
        && policy == VerificationRetryPolicy::Disqualify
    {
        return fail;
    }
    if !retry_charged {
        return fail;
    }
    match replacement {
        Some(worker) if !contract.has_held(&worker) => FailureDisposition::Reassign { worker },
        _ => fail,
    }
}
