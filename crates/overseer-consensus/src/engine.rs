use crate::error::{ConsensusError, Result};
use overseer_types::{AgentId, CapabilityRegistry, Clock, ContractId, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// One verification round of a contract. A reassigned contract opens a new
/// round for the new worker's result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundKey {
    pub contract_id: ContractId,
    pub round: u32,
}

impl RoundKey {
    pub fn new(contract_id: ContractId, round: u32) -> Self {
        Self { contract_id, round }
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.contract_id, self.round)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub verifier: AgentId,
    pub verdict: Verdict,
    pub at_ms: u64,
}

/// Verdict and outliers derived from a complete set of votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: bool,
    pub outliers: Vec<AgentId>,
}

/// Apply the consensus rule for the number of votes given.
pub fn tally(votes: &[Vote]) -> Result<Tally> {
    match votes {
        [only] => Ok(Tally {
            passed: only.verdict.is_pass(),
            outliers: Vec::new(),
        }),
        [a, b] => {
            if a.verdict == b.verdict {
                Ok(Tally {
                    passed: a.verdict.is_pass(),
                    outliers: Vec::new(),
                })
            } else {
                // Fault cannot be attributed on a split; both are flagged.
                Ok(Tally {
                    passed: false,
                    outliers: vec![a.verifier.clone(), b.verifier.clone()],
                })
            }
        }
        [_, _, _] => {
            let passes = votes.iter().filter(|v| v.verdict.is_pass()).count();
            let passed = passes >= 2;
            let outliers = votes
                .iter()
                .filter(|v| v.verdict.is_pass() != passed)
                .map(|v| v.verifier.clone())
                .collect();
            Ok(Tally { passed, outliers })
        }
        _ => Err(ConsensusError::UnsupportedVerifierCount(votes.len())),
    }
}

/// Per-round consensus record. `consensus` stays `None` until every
/// assigned verifier has voted and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub key: RoundKey,
    pub verifiers: Vec<AgentId>,
    pub votes: Vec<Vote>,
    pub consensus: Option<bool>,
    pub outliers: Vec<AgentId>,
    pub opened_at_ms: u64,
    pub finalized_at_ms: Option<u64>,
}

impl ConsensusRecord {
    pub fn is_finalized(&self) -> bool {
        self.consensus.is_some()
    }

    pub fn outcome(&self) -> Option<ConsensusOutcome> {
        self.consensus.map(|passed| ConsensusOutcome {
            key: self.key.clone(),
            passed,
            outliers: self.outliers.clone(),
            votes: self.votes.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub key: RoundKey,
    pub passed: bool,
    pub outliers: Vec<AgentId>,
    pub votes: Vec<Vote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Reputation removed from each outlier after finalization
    pub outlier_penalty: f64,
    /// Reputation granted to each agreeing verifier after finalization
    pub agreement_reward: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            outlier_penalty: 5.0,
            agreement_reward: 1.0,
        }
    }
}

/// Collects votes and finalizes each round exactly once.
pub struct ConsensusEngine {
    rounds: Arc<RwLock<HashMap<RoundKey, ConsensusRecord>>>,
    registry: Arc<dyn CapabilityRegistry>,
    clock: Arc<dyn Clock>,
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(
        registry: Arc<dyn CapabilityRegistry>,
        clock: Arc<dyn Clock>,
        config: ConsensusConfig,
    ) -> Self {
        Self {
            rounds: Arc::new(RwLock::new(HashMap::new())),
            registry,
            clock,
            config,
        }
    }

    /// Open a round for the given verifier set. Only 1, 2 or 3 verifiers
    /// are accepted.
    pub async fn open_round(&self, key: RoundKey, verifiers: Vec<AgentId>) -> Result<()> {
        if !(1..=3).contains(&verifiers.len()) {
            return Err(ConsensusError::UnsupportedVerifierCount(verifiers.len()));
        }

        let mut rounds = self.rounds.write().await;
        if rounds.contains_key(&key) {
            return Err(ConsensusError::RoundAlreadyOpen(key));
        }

        info!(
            round = %key,
            verifiers = verifiers.len(),
            "🗳️ Verification round opened"
        );
        rounds.insert(
            key.clone(),
            ConsensusRecord {
                key,
                verifiers,
                votes: Vec::new(),
                consensus: None,
                outliers: Vec::new(),
                opened_at_ms: self.clock.now_ms(),
                finalized_at_ms: None,
            },
        );
        Ok(())
    }

    /// Record a vote. The vote that completes the round finalizes it and
    /// receives the outcome; earlier votes receive `None`.
    pub async fn record_vote(
        &self,
        key: &RoundKey,
        verifier: &AgentId,
        verdict: Verdict,
    ) -> Result<Option<ConsensusOutcome>> {
        let outcome = {
            let mut rounds = self.rounds.write().await;
            let record = rounds
                .get_mut(key)
                .ok_or_else(|| ConsensusError::RoundNotFound(key.clone()))?;

            if record.is_finalized() {
                return Err(ConsensusError::AlreadyFinalized(key.clone()));
            }
            if !record.verifiers.contains(verifier) {
                return Err(ConsensusError::NotAVerifier {
                    key: key.clone(),
                    verifier: verifier.clone(),
                });
            }
            if record.votes.iter().any(|v| &v.verifier == verifier) {
                return Err(ConsensusError::DuplicateVote {
                    key: key.clone(),
                    verifier: verifier.clone(),
                });
            }

            let now = self.clock.now_ms();
            record.votes.push(Vote {
                verifier: verifier.clone(),
                verdict,
                at_ms: now,
            });

            if record.votes.len() < record.verifiers.len() {
                return Ok(None);
            }

            let result = tally(&record.votes)?;
            record.consensus = Some(result.passed);
            record.outliers = result.outliers;
            record.finalized_at_ms = Some(now);
            record.outcome()
        };

        if let Some(outcome) = &outcome {
            info!(
                round = %outcome.key,
                passed = outcome.passed,
                outliers = outcome.outliers.len(),
                "⚖️ Consensus finalized"
            );
            self.adjust_reputations(outcome).await;
        }
        Ok(outcome)
    }

    /// Runs once per round: only the finalizing vote reaches this point.
    async fn adjust_reputations(&self, outcome: &ConsensusOutcome) {
        for vote in &outcome.votes {
            let delta = if outcome.outliers.contains(&vote.verifier) {
                -self.config.outlier_penalty
            } else {
                self.config.agreement_reward
            };
            match self.registry.adjust_reputation(&vote.verifier, delta).await {
                Ok(reputation) => info!(
                    verifier = %vote.verifier,
                    delta,
                    reputation,
                    "📊 Verifier reputation updated"
                ),
                Err(e) => warn!(
                    verifier = %vote.verifier,
                    error = %e,
                    "Failed to update verifier reputation"
                ),
            }
        }
    }

    pub async fn outcome(&self, key: &RoundKey) -> Option<ConsensusOutcome> {
        self.rounds.read().await.get(key).and_then(|r| r.outcome())
    }

    pub async fn record(&self, key: &RoundKey) -> Option<ConsensusRecord> {
        self.rounds.read().await.get(key).cloned()
    }

    pub async fn is_open(&self, key: &RoundKey) -> bool {
        self.rounds.read().await.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_types::{AgentProfile, ManualClock, MemoryRegistry};

    fn vote(verifier: &str, verdict: Verdict) -> Vote {
        Vote {
            verifier: AgentId::new(verifier),
            verdict,
            at_ms: 0,
        }
    }

    #[test]
    fn test_tally_single_verifier() {
        let t = tally(&[vote("a", Verdict::Pass)]).unwrap();
        assert!(t.passed);
        assert!(t.outliers.is_empty());

        assert!(!tally(&[vote("a", Verdict::Fail)]).unwrap().passed);
    }

    #[test]
    fn test_tally_two_verifiers() {
        let agree = tally(&[vote("a", Verdict::Pass), vote("b", Verdict::Pass)]).unwrap();
        assert!(agree.passed);
        assert!(agree.outliers.is_empty());

        let split = tally(&[vote("a", Verdict::Pass), vote("b", Verdict::Fail)]).unwrap();
        assert!(!split.passed);
        assert_eq!(split.outliers, vec![AgentId::new("a"), AgentId::new("b")]);

        let both_fail = tally(&[vote("a", Verdict::Fail), vote("b", Verdict::Fail)]).unwrap();
        assert!(!both_fail.passed);
        assert!(both_fail.outliers.is_empty());
    }

    #[test]
    fn test_tally_three_verifiers() {
        let pass = tally(&[
            vote("a", Verdict::Pass),
            vote("b", Verdict::Pass),
            vote("c", Verdict::Fail),
        ])
        .unwrap();
        assert!(pass.passed);
        assert_eq!(pass.outliers, vec![AgentId::new("c")]);

        let fail = tally(&[
            vote("a", Verdict::Fail),
            vote("b", Verdict::Fail),
            vote("c", Verdict::Pass),
        ])
        .unwrap();
        assert!(!fail.passed);
        assert_eq!(fail.outliers, vec![AgentId::new("c")]);
    }

    #[test]
    fn test_tally_rejects_other_sizes() {
        assert!(matches!(
            tally(&[]),
            Err(ConsensusError::UnsupportedVerifierCount(0))
        ));
        let four: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|v| vote(v, Verdict::Pass))
            .collect();
        assert!(matches!(
            tally(&four),
            Err(ConsensusError::UnsupportedVerifierCount(4))
        ));
    }

    async fn engine() -> (ConsensusEngine, Arc<MemoryRegistry>) {
        let registry = Arc::new(MemoryRegistry::new());
        for id in ["a", "b", "c"] {
            registry.register(AgentProfile::new(id, id, 70.0)).await;
        }
        let engine = ConsensusEngine::new(
            registry.clone(),
            Arc::new(ManualClock::new(1_000)),
            ConsensusConfig::default(),
        );
        (engine, registry)
    }

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_open_round_rejects_unsupported_sizes() {
        let (engine, _) = engine().await;
        let key = RoundKey::new(ContractId::new("ctr-1"), 0);

        assert!(matches!(
            engine.open_round(key.clone(), Vec::new()).await,
            Err(ConsensusError::UnsupportedVerifierCount(0))
        ));
        assert!(matches!(
            engine.open_round(key.clone(), ids(&["a", "b", "c", "d"])).await,
            Err(ConsensusError::UnsupportedVerifierCount(4))
        ));

        engine.open_round(key.clone(), ids(&["a"])).await.unwrap();
        assert!(matches!(
            engine.open_round(key, ids(&["a"])).await,
            Err(ConsensusError::RoundAlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_finalizes_exactly_once() {
        let (engine, registry) = engine().await;
        let key = RoundKey::new(ContractId::new("ctr-1"), 0);
        engine.open_round(key.clone(), ids(&["a", "b", "c"])).await.unwrap();

        assert!(engine
            .record_vote(&key, &AgentId::new("a"), Verdict::Pass)
            .await
            .unwrap()
            .is_none());
        assert!(engine.outcome(&key).await.is_none());

        assert!(matches!(
            engine.record_vote(&key, &AgentId::new("a"), Verdict::Fail).await,
            Err(ConsensusError::DuplicateVote { .. })
        ));
        assert!(matches!(
            engine.record_vote(&key, &AgentId::new("z"), Verdict::Pass).await,
            Err(ConsensusError::NotAVerifier { .. })
        ));

        engine
            .record_vote(&key, &AgentId::new("b"), Verdict::Fail)
            .await
            .unwrap();
        let outcome = engine
            .record_vote(&key, &AgentId::new("c"), Verdict::Pass)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.outliers, vec![AgentId::new("b")]);

        assert!(matches!(
            engine.record_vote(&key, &AgentId::new("c"), Verdict::Pass).await,
            Err(ConsensusError::AlreadyFinalized(_))
        ));

        // Applied once: -5 for the outlier, +1 for the others
        assert_eq!(registry.get(&AgentId::new("b")).await.unwrap().reputation, 65.0);
        assert_eq!(registry.get(&AgentId::new("a")).await.unwrap().reputation, 71.0);
        assert_eq!(registry.get(&AgentId::new("c")).await.unwrap().reputation, 71.0);
    }

    #[tokio::test]
    async fn test_concurrent_votes_finalize_once() {
        let (engine, _) = engine().await;
        let engine = Arc::new(engine);
        let key = RoundKey::new(ContractId::new("ctr-2"), 0);
        engine.open_round(key.clone(), ids(&["a", "b", "c"])).await.unwrap();

        let mut handles = Vec::new();
        for id in ["a", "b", "c"] {
            let engine = engine.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .record_vote(&key, &AgentId::new(id), Verdict::Pass)
                    .await
                    .unwrap()
            }));
        }

        let mut finalized = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                finalized += 1;
            }
        }
        assert_eq!(finalized, 1);
    }

    #[tokio::test]
    async fn test_rounds_are_independent_per_contract_round() {
        let (engine, _) = engine().await;
        let first = RoundKey::new(ContractId::new("ctr-3"), 0);
        let second = RoundKey::new(ContractId::new("ctr-3"), 1);
        engine.open_round(first.clone(), ids(&["a"])).await.unwrap();
        engine.open_round(second.clone(), ids(&["a"])).await.unwrap();

        engine.record_vote(&first, &AgentId::new("a"), Verdict::Fail).await.unwrap();
        let outcome = engine
            .record_vote(&second, &AgentId::new("a"), Verdict::Pass)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.passed);
        assert!(!engine.outcome(&first).await.unwrap().passed);
    }
}
