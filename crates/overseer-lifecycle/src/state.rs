use crate::error::{LifecycleError, Result};
use overseer_types::ContractId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// State-machine behaviour shared by lifecycle enums.
pub trait LifecycleState: Clone + fmt::Debug + PartialEq + Send + Sync {
    fn is_terminal(&self) -> bool;
    fn can_transition_to(&self, next: &Self) -> bool;
}

/// Lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractState {
    Proposed,
    Priced,
    Accepted,
    Executing,
    Verifying,
    Completed,
    Failed,
    Timeout,
    Rejected,
}

impl ContractState {
    pub const ALL: [ContractState; 9] = [
        Self::Proposed,
        Self::Priced,
        Self::Accepted,
        Self::Executing,
        Self::Verifying,
        Self::Completed,
        Self::Failed,
        Self::Timeout,
        Self::Rejected,
    ];

    /// Adjacency row of the lifecycle table.
    pub fn next_states(&self) -> &'static [ContractState] {
        use ContractState::*;
        match self {
            Proposed => &[Priced, Rejected],
            Priced => &[Accepted, Rejected],
            Accepted => &[Executing],
            // Self-loop: reassignment to another worker without a lifecycle change.
            Executing => &[Verifying, Executing, Timeout, Failed],
            Verifying => &[Completed, Failed, Timeout],
            Completed | Failed | Timeout | Rejected => &[],
        }
    }
}

impl LifecycleState for ContractState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Rejected
        )
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        self.next_states().contains(next)
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Proposed => "PROPOSED",
            Self::Priced => "PRICED",
            Self::Accepted => "ACCEPTED",
            Self::Executing => "EXECUTING",
            Self::Verifying => "VERIFYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

pub fn is_valid_transition(from: ContractState, to: ContractState) -> bool {
    from.can_transition_to(&to)
}

/// Fails unless `from -> to` is in the lifecycle table. Call before mutating.
pub fn validate_transition(
    contract_id: &ContractId,
    from: ContractState,
    to: ContractState,
) -> Result<()> {
    if from.is_terminal() || !from.can_transition_to(&to) {
        return Err(LifecycleError::InvalidStateTransition {
            contract_id: contract_id.clone(),
            from,
            to,
        });
    }
    Ok(())
}

pub fn valid_next_states(state: ContractState) -> Vec<ContractState> {
    state.next_states().to_vec()
}

/// Shortest state sequence from `from` to `to` (both inclusive), or `None`
/// when `to` is unreachable. For diagnostics only; enforcement goes through
/// [`validate_transition`].
pub fn transition_path(from: ContractState, to: ContractState) -> Option<Vec<ContractState>> {
    if from == to {
        return Some(vec![from]);
    }

    let mut parent: HashMap<ContractState, ContractState> = HashMap::new();
    let mut queue = VecDeque::from([from]);

    while let Some(state) = queue.pop_front() {
        for &next in state.next_states() {
            if next == from || parent.contains_key(&next) {
                continue;
            }
            parent.insert(next, state);
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}
