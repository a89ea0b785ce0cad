/*!
# Overseer Observability

Derived, read-only views of the supervision engine.

## Module Structure

- **metrics**: Prometheus counters for contract outcomes plus per-agent statistics
- **trace**: Append-only decision trace with contract/type indexes and replay
- **health**: Failure-rate circuit breaker driving safe mode
- **observer**: Read-only façade combining the above with the live contract set

Data flows one way: supervisor events → trace → metrics → health.
*/

pub mod error;
pub mod health;
pub mod metrics;
pub mod observer;
pub mod trace;

pub use error::{ObservabilityError, Result};
pub use health::{HealthMonitor, HealthRates, HealthStatus, HealthThresholds};
pub use metrics::{AgentStats, ContractMetrics, MetricsEngine, MetricsSnapshot};
pub use observer::{ContractSummary, ContractView, Observer, ObserverSnapshot};
pub use trace::{DecisionTrace, DecisionTraceEntry, DecisionType, Replay, ReplayStep};
