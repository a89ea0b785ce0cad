//! Execution supervisor.
//!
//! A single poll loop scans every active work contract in id order and, per
//! contract, checks the deadline first (short-circuiting everything else),
//! then heartbeats while executing, then the verification outcome while
//! verifying. Failures are classified, enforced against the worker, and
//! resolved by [`overseer_contract::decide_disposition`] into a reassignment
//! or a permanent failure with a partial refund.

pub mod config;
pub mod error;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use error::{Result, SupervisorError};
pub use supervisor::{Collaborators, ExecutionSupervisor, PollReport};
