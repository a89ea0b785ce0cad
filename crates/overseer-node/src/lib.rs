//! Service wiring for the Overseer binary.
//!
//! The library half exists so the wiring and the local simulation can be
//! exercised from tests; `main.rs` only parses arguments and dispatches.

pub mod config;
pub mod logging;
pub mod services;
pub mod simulate;

pub use config::{LoggingConfig, NodeConfig, NodeSettings};
pub use services::Services;
pub use simulate::{run_simulation, SimulationOptions, SimulationReport};
