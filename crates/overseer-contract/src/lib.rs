//! Work contracts: the execution-side record of one unit of work.
//!
//! A [`WorkContract`] carries the locked [`ContractTerms`], the current
//! assignment, liveness monitoring fields, retry bookkeeping and verifier
//! submissions. Every mutator takes the current time from the caller so that
//! all deadline and heartbeat arithmetic shares one clock.
//!
//! [`decide_disposition`] is the single retry-vs-fail decision used by both
//! liveness failures and verification failures.

pub mod contract;
pub mod disposition;
pub mod error;
pub mod types;

pub use contract::{ContractDefaults, VerificationOutcome, WorkContract};
pub use disposition::{
    decide_disposition, FailureDisposition, VerificationRetryPolicy, FAILURE_REFUND_PERCENT,
    TIMEOUT_REFUND_PERCENT,
};
pub use error::{ContractError, Result};
pub use types::{ContractTerms, ExecutionStatus, RetryEntry, VerificationRound, VerifierSubmission};
