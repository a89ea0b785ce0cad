//! Contract lifecycle: the fixed state machine every contract moves through,
//! plus the proposal-submission and transition boundaries built on it.
//!
//! ```text
//! PROPOSED ─► PRICED ─► ACCEPTED ─► EXECUTING ─► VERIFYING ─► COMPLETED
//!    │          │                     │  ▲ │          │
//!    ▼          ▼                     └──┘ ├─► FAILED ◄┤
//! REJECTED   REJECTED          (reassign)  └─► TIMEOUT ◄┘
//! ```

pub mod error;
pub mod manager;
pub mod state;

pub use error::{LifecycleError, Result};
pub use manager::{
    LifecycleConfig, LifecycleContract, LifecycleEvent, LifecycleManager, ProposalConstraints,
    ProposalGate, ProposalRequest, StateTransition, TransitionRequest,
};
pub use state::{
    is_valid_transition, transition_path, valid_next_states, validate_transition, ContractState,
    LifecycleState,
};
