use crate::error::{ConsensusError, Result};
use overseer_types::{AgentId, AgentProfile, CapabilityRegistry, RegistryQuery, RiskTolerance};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Verifier count and minimum reputation for one risk level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifierRequirement {
    pub count: usize,
    pub min_reputation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub low: VerifierRequirement,
    pub medium: VerifierRequirement,
    pub high: VerifierRequirement,
    /// Reputation floor used by the single relaxation step
    pub relaxed_min_reputation: f64,
    /// Capability that earns the capability bonus
    pub verification_capability: String,
    pub capability_bonus: f64,
    pub audit_bonus: f64,
    /// Verifiers charging less than this look like low-effort rubber stamps
    pub fee_floor: u64,
    pub low_fee_penalty: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            low: VerifierRequirement {
                count: 1,
                min_reputation: 60.0,
            },
            medium: VerifierRequirement {
                count: 2,
                min_reputation: 70.0,
            },
            high: VerifierRequirement {
                count: 3,
                min_reputation: 80.0,
            },
            relaxed_min_reputation: 50.0,
            verification_capability: "verification".to_string(),
            capability_bonus: 10.0,
            audit_bonus: 5.0,
            fee_floor: 10,
            low_fee_penalty: 10.0,
        }
    }
}

impl SelectionConfig {
    pub fn requirement_for(&self, risk: RiskTolerance) -> VerifierRequirement {
        match risk {
            RiskTolerance::Low => self.low,
            RiskTolerance::Medium => self.medium,
            RiskTolerance::High => self.high,
        }
    }

    /// Reputation plus capability/audit bonuses minus the low-fee penalty.
    pub fn score(&self, profile: &AgentProfile) -> f64 {
        let mut score = profile.reputation;
        if profile.has_capability(&self.verification_capability) {
            score += self.capability_bonus;
        }
        if profile.audited {
            score += self.audit_bonus;
        }
        if profile.fee < self.fee_floor {
            score -= self.low_fee_penalty;
        }
        score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVerifier {
    pub id: AgentId,
    pub operator: String,
    pub score: f64,
}

/// Outcome of a selection, including which constraints had to be relaxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierSelection {
    pub verifiers: Vec<ScoredVerifier>,
    pub min_reputation: f64,
    pub relaxed_reputation: bool,
    pub relaxed_diversity: bool,
}

impl VerifierSelection {
    pub fn ids(&self) -> Vec<AgentId> {
        self.verifiers.iter().map(|v| v.id.clone()).collect()
    }
}

/// Chooses verifiers from the capability registry.
pub struct VerifierSelector {
    registry: Arc<dyn CapabilityRegistry>,
    config: SelectionConfig,
}

impl VerifierSelector {
    pub fn new(registry: Arc<dyn CapabilityRegistry>, config: SelectionConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Select verifiers for a contract worked by `worker`. The worker and
    /// every agent in `exclude` are never chosen.
    pub async fn select(
        &self,
        risk: RiskTolerance,
        worker: &AgentId,
        exclude: &[AgentId],
    ) -> Result<VerifierSelection> {
        let requirement = self.config.requirement_for(risk);
        let excluded: Vec<&AgentId> = std::iter::once(worker).chain(exclude.iter()).collect();

        let mut min_reputation = requirement.min_reputation;
        let mut candidates = self
            .registry
            .query(&RegistryQuery::min_reputation(min_reputation).excluding(excluded.iter().copied()))
            .await?;
        let mut relaxed_reputation = false;

        if candidates.len() < requirement.count {
            warn!(
                risk = %risk,
                required = requirement.count,
                found = candidates.len(),
                min_reputation,
                relaxed_to = self.config.relaxed_min_reputation,
                "Too few verifiers qualify; relaxing reputation threshold"
            );
            min_reputation = self.config.relaxed_min_reputation;
            relaxed_reputation = true;
            candidates = self
                .registry
                .query(
                    &RegistryQuery::min_reputation(min_reputation)
                        .excluding(excluded.iter().copied()),
                )
                .await?;
        }

        if candidates.len() < requirement.count {
            return Err(ConsensusError::InsufficientVerifiers {
                required: requirement.count,
                available: candidates.len(),
                min_reputation,
            });
        }

        let mut scored: Vec<ScoredVerifier> = candidates
            .iter()
            .map(|p| ScoredVerifier {
                id: p.id.clone(),
                operator: p.operator.clone(),
                score: self.config.score(p),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let (verifiers, relaxed_diversity) = pick_diverse(scored, requirement.count);

        info!(
            risk = %risk,
            worker = %worker,
            verifiers = ?verifiers.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            relaxed_reputation,
            relaxed_diversity,
            "🔍 Verifiers selected"
        );

        Ok(VerifierSelection {
            verifiers,
            min_reputation,
            relaxed_reputation,
            relaxed_diversity,
        })
    }
}

/// Greedy pick by score with one verifier per operator; fills remaining
/// slots from repeated operators only if the distinct ones run out.
fn pick_diverse(scored: Vec<ScoredVerifier>, count: usize) -> (Vec<ScoredVerifier>, bool) {
    let mut operators = HashSet::new();
    let mut picked = Vec::with_capacity(count);
    let mut skipped = Vec::new();

    for candidate in scored {
        if picked.len() == count {
            break;
        }
        if operators.insert(candidate.operator.clone()) {
            picked.push(candidate);
        } else {
            debug!(
                verifier = %candidate.id,
                operator = %candidate.operator,
                "Skipping verifier: operator already represented"
            );
            skipped.push(candidate);
        }
    }

    let mut relaxed = false;
    for candidate in skipped {
        if picked.len() == count {
            break;
        }
        relaxed = true;
        picked.push(candidate);
    }

    (picked, relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_types::MemoryRegistry;

    async fn registry(profiles: Vec<AgentProfile>) -> Arc<MemoryRegistry> {
        let registry = Arc::new(MemoryRegistry::new());
        for p in profiles {
            registry.register(p).await;
        }
        registry
    }

    #[test]
    fn test_score_components() {
        let config = SelectionConfig::default();
        let base = AgentProfile::new("v", "op", 70.0).with_fee(20);
        assert_eq!(config.score(&base), 70.0);

        let full = base.clone().with_capability("verification").audited();
        assert_eq!(config.score(&full), 85.0);

        let cheap = base.with_fee(1);
        assert_eq!(config.score(&cheap), 60.0);
    }

    #[tokio::test]
    async fn test_requirements_by_risk() {
        let registry = registry(vec![
            AgentProfile::new("v1", "op-a", 90.0).with_fee(20),
            AgentProfile::new("v2", "op-b", 85.0).with_fee(20),
            AgentProfile::new("v3", "op-c", 82.0).with_fee(20),
            AgentProfile::new("v4", "op-d", 65.0).with_fee(20),
        ])
        .await;
        let selector = VerifierSelector::new(registry, SelectionConfig::default());
        let worker = AgentId::new("w1");

        let low = selector.select(RiskTolerance::Low, &worker, &[]).await.unwrap();
        assert_eq!(low.verifiers.len(), 1);
        assert_eq!(low.min_reputation, 60.0);

        let medium = selector.select(RiskTolerance::Medium, &worker, &[]).await.unwrap();
        assert_eq!(medium.ids(), vec![AgentId::new("v1"), AgentId::new("v2")]);

        let high = selector.select(RiskTolerance::High, &worker, &[]).await.unwrap();
        assert_eq!(high.verifiers.len(), 3);
        assert!(!high.relaxed_reputation);
    }

    #[tokio::test]
    async fn test_relaxes_reputation_once() {
        let registry = registry(vec![
            AgentProfile::new("v1", "op-a", 85.0).with_fee(20),
            AgentProfile::new("v2", "op-b", 55.0).with_fee(20),
            AgentProfile::new("v3", "op-c", 52.0).with_fee(20),
            AgentProfile::new("v4", "op-d", 40.0).with_fee(20),
        ])
        .await;
        let selector = VerifierSelector::new(registry, SelectionConfig::default());

        let selection = selector
            .select(RiskTolerance::High, &AgentId::new("w1"), &[])
            .await
            .unwrap();
        assert!(selection.relaxed_reputation);
        assert_eq!(selection.min_reputation, 50.0);
        assert!(!selection.ids().contains(&AgentId::new("v4")));
    }

    #[tokio::test]
    async fn test_insufficient_verifiers() {
        let registry = registry(vec![
            AgentProfile::new("v1", "op-a", 85.0),
            AgentProfile::new("v2", "op-b", 45.0),
        ])
        .await;
        let selector = VerifierSelector::new(registry, SelectionConfig::default());

        let err = selector
            .select(RiskTolerance::Medium, &AgentId::new("w1"), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::InsufficientVerifiers {
                required: 2,
                available: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_worker_never_verifies_own_contract() {
        let registry = registry(vec![
            AgentProfile::new("w1", "op-a", 99.0).with_fee(20),
            AgentProfile::new("v1", "op-b", 75.0).with_fee(20),
        ])
        .await;
        let selector = VerifierSelector::new(registry, SelectionConfig::default());

        let selection = selector
            .select(RiskTolerance::Low, &AgentId::new("w1"), &[])
            .await
            .unwrap();
        assert_eq!(selection.ids(), vec![AgentId::new("v1")]);
    }

    #[tokio::test]
    async fn test_operator_diversity_preferred_then_relaxed() {
        let registry = registry(vec![
            AgentProfile::new("v1", "op-a", 95.0).with_fee(20),
            AgentProfile::new("v2", "op-a", 94.0).with_fee(20),
            AgentProfile::new("v3", "op-b", 81.0).with_fee(20),
        ])
        .await;
        let selector = VerifierSelector::new(registry, SelectionConfig::default());
        let worker = AgentId::new("w1");

        let medium = selector.select(RiskTolerance::Medium, &worker, &[]).await.unwrap();
        assert_eq!(medium.ids(), vec![AgentId::new("v1"), AgentId::new("v3")]);
        assert!(!medium.relaxed_diversity);

        let high = selector.select(RiskTolerance::High, &worker, &[]).await.unwrap();
        assert_eq!(high.verifiers.len(), 3);
        assert!(high.relaxed_diversity);
    }
}
