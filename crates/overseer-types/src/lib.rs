/*!
# Overseer Types

Shared vocabulary for the Overseer work-contract supervision engine.

## Module Structure

- **id**: Contract, agent and task identifiers
- **types**: Risk tolerance, verdicts, failure classes, sandbox resource limits
- **clock**: Consistent time source shared by every deadline and heartbeat check
- **collaborators**: Interfaces to the systems around the engine (registry,
  job history, enforcement, settlement)
- **memory**: In-memory collaborator implementations for tests and local runs
- **error**: Collaborator errors
*/

pub mod clock;
pub mod collaborators;
pub mod error;
pub mod id;
pub mod memory;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    AgentProfile, CapabilityRegistry, EnforcementAction, Enforcer, JobHistoryEntry,
    JobHistoryStore, JobOutcome, RegistryQuery, Settlement, SettlementInstruction,
};
pub use error::{CollaboratorError, Result};
pub use id::{AgentId, ContractId, TaskId};
pub use memory::{MemoryJobHistory, MemoryRegistry, RecordingEnforcer, RecordingSettlement};
pub use types::{DeploymentMode, FailureType, ResourceLimits, RiskTolerance, Verdict};
