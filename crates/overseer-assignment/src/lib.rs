//! Matching idle workers to open contracts.
//!
//! Open tasks wait in a [`TaskQueue`] ordered by deadline, then budget
//! (highest first). Direct-hire tasks bypass the queue and are only offered
//! to their designated worker. Accepting a task selects verifiers, moves the
//! lifecycle contract to `EXECUTING`, and hands a fresh work contract to the
//! supervisor through a [`ContractSink`].

pub mod engine;
pub mod error;
pub mod queue;
pub mod types;

pub use engine::{AssignmentEngine, ContractSink};
pub use error::{AssignmentError, Result};
pub use queue::TaskQueue;
pub use types::{AssignmentStatus, PendingAssignment};
