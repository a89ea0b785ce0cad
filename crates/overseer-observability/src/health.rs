use crate::metrics::{ContractMetrics, MetricsEngine};
use crate::trace::{DecisionTrace, DecisionType};
use overseer_lifecycle::ProposalGate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    /// Below this many created contracts the system is always healthy
    pub min_sample: u64,
    pub max_failure_rate: f64,
    pub max_stall_share: f64,
    pub max_retry_exhaustion_rate: f64,
    pub max_timeout_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_sample: 5,
            max_failure_rate: 0.5,
            max_stall_share: 0.7,
            max_retry_exhaustion_rate: 0.6,
            max_timeout_rate: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthRates {
    pub failure_rate: f64,
    pub stall_share: f64,
    pub retry_exhaustion_rate: f64,
    pub timeout_rate: f64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl HealthRates {
    pub fn from_metrics(m: &ContractMetrics) -> Self {
        Self {
            failure_rate: ratio(m.failed, m.created),
            stall_share: ratio(m.stalls, m.stalls + m.crashes + m.verification_failures),
            retry_exhaustion_rate: ratio(m.retries_exhausted, m.created),
            timeout_rate: ratio(m.timeout, m.created),
        }
    }

    /// Names of the rates above their threshold.
    pub fn breaches(&self, t: &HealthThresholds) -> Vec<&'static str> {
        let mut breaches = Vec::new();
        if self.failure_rate > t.max_failure_rate {
            breaches.push("failure_rate");
        }
        if self.stall_share > t.max_stall_share {
            breaches.push("stall_share");
        }
        if self.retry_exhaustion_rate > t.max_retry_exhaustion_rate {
            breaches.push("retry_exhaustion_rate");
        }
        if self.timeout_rate > t.max_timeout_rate {
            breaches.push("timeout_rate");
        }
        breaches
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub safe_mode: bool,
    pub sample: u64,
    pub rates: HealthRates,
    pub breaches: Vec<String>,
}

/// Circuit breaker over the contract outcome rates.
pub struct HealthMonitor {
    metrics: Arc<MetricsEngine>,
    trace: Arc<DecisionTrace>,
    thresholds: HealthThresholds,
    safe_mode: AtomicBool,
}

impl HealthMonitor {
    pub fn new(
        metrics: Arc<MetricsEngine>,
        trace: Arc<DecisionTrace>,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            metrics,
            trace,
            thresholds,
            safe_mode: AtomicBool::new(false),
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode.load(Ordering::SeqCst)
    }

    /// Evaluate current rates without changing safe mode.
    pub fn evaluate(&self) -> HealthStatus {
        let counts = self.metrics.contract_metrics();
        let rates = HealthRates::from_metrics(&counts);
        let breaches = if counts.created < self.thresholds.min_sample {
            Vec::new()
        } else {
            rates
                .breaches(&self.thresholds)
                .into_iter()
                .map(String::from)
                .collect()
        };
        HealthStatus {
            healthy: breaches.is_empty(),
            safe_mode: self.is_safe_mode(),
            sample: counts.created,
            rates,
            breaches,
        }
    }

    /// Evaluate and enter or leave safe mode. Each transition is recorded
    /// once; repeated checks in the same state record nothing.
    pub async fn check(&self) -> HealthStatus {
        let mut status = self.evaluate();
        let context = serde_json::json!({
            "sample": status.sample,
            "rates": status.rates,
            "breaches": status.breaches,
        });

        if !status.healthy
            && self
                .safe_mode
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            self.metrics.safe_mode_entered();
            warn!(
                breaches = ?status.breaches,
                failure_rate = status.rates.failure_rate,
                "🚨 Safe mode entered: new proposals rejected"
            );
            self.trace
                .record(
                    None,
                    DecisionType::SafeModeEntered,
                    format!("thresholds exceeded: {}", status.breaches.join(", ")),
                    context,
                )
                .await;
        } else if status.healthy
            && self
                .safe_mode
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            info!("✅ Safe mode exited: all rates within bounds");
            self.trace
                .record(
                    None,
                    DecisionType::SafeModeExited,
                    "all rates within bounds",
                    context,
                )
                .await;
        }

        status.safe_mode = self.is_safe_mode();
        status
    }
}

impl ProposalGate for HealthMonitor {
    fn admits_proposals(&self) -> bool {
        !self.is_safe_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_types::{AgentId, DeploymentMode, FailureType, ManualClock};

    fn monitor() -> (HealthMonitor, Arc<MetricsEngine>, Arc<DecisionTrace>) {
        let metrics = Arc::new(MetricsEngine::new().unwrap());
        let trace = Arc::new(DecisionTrace::new(
            Arc::new(ManualClock::new(0)),
            DeploymentMode::Local,
        ));
        let monitor = HealthMonitor::new(metrics.clone(), trace.clone(), HealthThresholds::default());
        (monitor, metrics, trace)
    }

    #[test]
    fn test_rates_guard_division_by_zero() {
        let rates = HealthRates::from_metrics(&ContractMetrics::default());
        assert_eq!(rates, HealthRates::default());
    }

    #[test]
    fn test_stall_share_of_failures() {
        let counts = ContractMetrics {
            created: 10,
            stalls: 3,
            crashes: 1,
            ..Default::default()
        };
        let rates = HealthRates::from_metrics(&counts);
        assert_eq!(rates.stall_share, 0.75);
        assert_eq!(rates.breaches(&HealthThresholds::default()), vec!["stall_share"]);
    }

    #[tokio::test]
    async fn test_below_sample_floor_is_always_healthy() {
        let (monitor, metrics, _) = monitor();
        let w = AgentId::new("w");
        for _ in 0..4 {
            metrics.contract_created(&w).await;
            metrics.contract_failed();
        }
        let status = monitor.check().await;
        assert!(status.healthy);
        assert!(!status.safe_mode);
        assert_eq!(status.rates.failure_rate, 1.0);
    }

    #[tokio::test]
    async fn test_enter_and_exit_exactly_once() {
        let (monitor, metrics, trace) = monitor();
        let w = AgentId::new("w");

        for _ in 0..5 {
            metrics.contract_created(&w).await;
        }
        for _ in 0..3 {
            metrics.contract_failed();
        }

        assert!(!monitor.check().await.healthy);
        assert!(monitor.is_safe_mode());
        assert!(!monitor.admits_proposals());
        monitor.check().await;
        monitor.check().await;
        assert_eq!(trace.by_type(DecisionType::SafeModeEntered).await.len(), 1);
        assert_eq!(metrics.contract_metrics().safe_mode_entries, 1);

        // Dilute the failure rate to 3/7
        metrics.contract_created(&w).await;
        metrics.contract_created(&w).await;
        let status = monitor.check().await;
        assert!(status.healthy);
        assert!(!status.safe_mode);
        monitor.check().await;
        assert_eq!(trace.by_type(DecisionType::SafeModeExited).await.len(), 1);
        assert!(monitor.admits_proposals());
    }

    #[tokio::test]
    async fn test_exit_requires_all_rates_within_bounds() {
        let (monitor, metrics, _) = monitor();
        let w = AgentId::new("w");
        for _ in 0..10 {
            metrics.contract_created(&w).await;
        }
        for _ in 0..6 {
            metrics.contract_failed();
        }
        for _ in 0..4 {
            metrics.contract_timed_out(&w).await;
        }
        monitor.check().await;
        assert!(monitor.is_safe_mode());

        // Failure rate back under 50%, timeout rate still 4/12 > 30%
        metrics.contract_created(&w).await;
        metrics.contract_created(&w).await;
        let status = monitor.check().await;
        assert_eq!(status.breaches, vec!["timeout_rate".to_string()]);
        assert!(monitor.is_safe_mode());
    }

    #[tokio::test]
    async fn test_failure_types_feed_stall_share() {
        let (monitor, metrics, _) = monitor();
        let w = AgentId::new("w");
        for _ in 0..5 {
            metrics.contract_created(&w).await;
        }
        for _ in 0..4 {
            metrics.failure_recorded(&w, FailureType::Stall, true).await;
        }
        let status = monitor.check().await;
        assert_eq!(status.breaches, vec!["stall_share".to_string()]);
    }
}
