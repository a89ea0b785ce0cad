use anyhow::{Context, Result};
use overseer_consensus::{ConsensusConfig, SelectionConfig};
use overseer_contract::VerificationRetryPolicy;
use overseer_lifecycle::LifecycleConfig;
use overseer_observability::HealthThresholds;
use overseer_supervisor::SupervisorConfig;
use overseer_types::DeploymentMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub supervisor: SupervisorConfig,
    pub lifecycle: LifecycleConfig,
    pub selection: SelectionConfig,
    pub consensus: ConsensusConfig,
    pub health: HealthThresholds,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub name: String,
    /// How often `start` logs a health line
    pub status_interval_secs: u64,
    /// Decisions included in observer snapshots
    pub recent_decisions: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "overseer".to_string(),
            status_interval_secs: 60,
            recent_decisions: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    pub module_filters: BTreeMap<String, String>,
    pub file_output: Option<PathBuf>,
    pub show_boot_banner: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            module_filters: BTreeMap::new(),
            file_output: None,
            show_boot_banner: true,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, content).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Apply `OVERSEER_*` environment variable overrides. Unparseable values
    /// are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(name) = var("OVERSEER_NODE_NAME") {
            if !name.is_empty() {
                self.node.name = name;
            }
        }

        // Supervisor
        if let Some(v) = var("OVERSEER_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.supervisor.poll_interval_ms = v;
        }
        if let Some(v) = var("OVERSEER_INITIAL_GRACE_MS").and_then(|v| v.parse().ok()) {
            self.supervisor.initial_grace_ms = v;
        }
        if let Some(v) = var("OVERSEER_HEARTBEAT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.supervisor.heartbeat_timeout_ms = v;
        }
        if let Some(mode) = var("OVERSEER_MODE") {
            match mode.as_str() {
                "local" => self.supervisor.mode = DeploymentMode::Local,
                "trust_minimized" => self.supervisor.mode = DeploymentMode::TrustMinimized,
                _ => {}
            }
        }
        if let Some(policy) = var("OVERSEER_VERIFICATION_RETRY_POLICY") {
            match policy.as_str() {
                "retry" => self.supervisor.verification_retry_policy = VerificationRetryPolicy::Retry,
                "disqualify" => {
                    self.supervisor.verification_retry_policy = VerificationRetryPolicy::Disqualify
                }
                _ => {}
            }
        }

        // Lifecycle
        if let Some(v) = var("OVERSEER_DEFAULT_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.lifecycle.default_max_retries = v;
        }

        // Logging
        if let Some(level) = var("OVERSEER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("OVERSEER_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(file) = var("OVERSEER_LOG_FILE") {
            if !file.is_empty() {
                self.logging.file_output = Some(PathBuf::from(file));
            }
        }
    }
}
