//! Verifier selection and vote aggregation.
//!
//! [`VerifierSelector`] picks verifiers for a contract according to its risk
//! tolerance, preferring high-scoring candidates from distinct operators.
//! [`ConsensusEngine`] collects their votes per verification round and
//! finalizes each round exactly once, when the last assigned verifier votes.
//!
//! | verifiers | rule | outliers |
//! |---|---|---|
//! | 1 | its vote | none |
//! | 2 | both must pass | both, on a split |
//! | 3 | majority | the minority voter |

pub mod engine;
pub mod error;
pub mod selection;

pub use engine::{tally, ConsensusConfig, ConsensusEngine, ConsensusOutcome, ConsensusRecord, RoundKey, Tally, Vote};
pub use error::{ConsensusError, Result};
pub use selection::{
    ScoredVerifier, SelectionConfig, VerifierRequirement, VerifierSelection, VerifierSelector,
};
