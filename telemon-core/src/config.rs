//! Configuration management.

use crate::error::{Result, TelemonError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default number of samples retained per metric.
pub const DEFAULT_CAPACITY: usize = 100;

/// Persistent configuration for telemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub metrics: Vec<MetricSpec>,
    pub capacity: usize,
    pub diagnostics_capacity: usize,
    pub backoff: BackoffConfig,
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            metrics: vec![MetricSpec::new("temperatura"), MetricSpec::new("humedad")],
            capacity: DEFAULT_CAPACITY,
            diagnostics_capacity: 50,
            backoff: BackoffConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    /// Empty means "generate one at startup".
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".to_string(),
            port: 1883,
            topic: "sensor_st".to_string(),
            client_id: String::new(),
            keep_alive_secs: 60,
        }
    }
}

impl BrokerConfig {
    /// The configured client id, or `telemon-<unix secs>` when none is set.
    pub fn resolved_client_id(&self) -> String {
        if !self.client_id.is_empty() {
            return self.client_id.clone();
        }
        let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        format!("telemon-{}", secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// A metric extracted from every payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSpec {
    /// Series name; payload keys are matched against it case-insensitively.
    pub name: String,
    /// Alternative payload keys feeding the same series.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Value recorded when the payload lacks the field.
    #[serde(default)]
    pub default: f64,
}

impl MetricSpec {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), aliases: Vec::new(), default: 0.0 }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Normalized series name: trimmed and lowercased.
    pub fn key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// Reconnect backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
    /// Random jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { initial_ms: 500, max_ms: 30_000, factor: 2.0, jitter: 0.1 }
    }
}

/// Logging and metrics export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Port for the Prometheus scrape endpoint; disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), metrics_port: None }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| TelemonError::IoError { path: path.to_path_buf(), source: e })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            TelemonError::InvalidConfig { reason: format!("Failed to parse config: {}", e) }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::config_file())
    }

    /// Save configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TelemonError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            TelemonError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| TelemonError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Check the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(TelemonError::InvalidConfig { reason: reason.to_string() });

        if self.capacity == 0 {
            return invalid("capacity must be greater than zero");
        }
        if self.diagnostics_capacity == 0 {
            return invalid("diagnostics_capacity must be greater than zero");
        }
        if self.broker.topic.trim().is_empty() {
            return invalid("broker.topic must not be empty");
        }
        if self.broker.host.trim().is_empty() {
            return invalid("broker.host must not be empty");
        }
        if self.metrics.is_empty() {
            return invalid("at least one metric must be configured");
        }

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                return invalid("metric names must not be empty");
            }
            if !seen.insert(metric.key()) {
                return Err(TelemonError::InvalidConfig {
                    reason: format!("duplicate metric name: {}", metric.name),
                });
            }
        }

        if self.backoff.factor < 1.0 {
            return invalid("backoff.factor must be at least 1.0");
        }
        if self.backoff.max_ms < self.backoff.initial_ms {
            return invalid("backoff.max_ms must not be below backoff.initial_ms");
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            return invalid("backoff.jitter must be within 0.0..=1.0");
        }

        Ok(())
    }
}
