//! Mailroom configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::address::Address;
use crate::patterns::DEFAULT_BATCH_THRESHOLD;
use crate::runtime::RuntimeConfig;

/// Main Mailroom configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Actor runtime settings
    pub runtime: RuntimeConfig,

    /// Demo setups
    pub demos: DemosConfig,
}

impl Config {
    /// Validate the demo setups before any actor is started
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        let pubsub = &self.demos.pubsub;
        if pubsub.publish_period_ms == 0 {
            return Err(eyre::eyre!("demos.pubsub.publish-period-ms must be positive"));
        }

        let balance = &self.demos.balance;
        if balance.responders.is_empty() {
            return Err(eyre::eyre!("demos.balance.responders must not be empty"));
        }
        if balance.batch_threshold == 0 {
            return Err(eyre::eyre!("demos.balance.batch-threshold must be positive"));
        }

        if self.demos.dispatch.workers.is_empty() {
            return Err(eyre::eyre!("demos.dispatch.workers must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "Config::load: called");
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidates().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    /// Project-local `.mailroom.yml`, then `~/.config/mailroom/mailroom.yml`
    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".mailroom.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("mailroom").join("mailroom.yml"));
        }
        candidates
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Demo setups driven by `mr demo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemosConfig {
    /// How long a demo runs before all actors are stopped
    #[serde(rename = "run-ms", default = "default_run_ms")]
    pub run_ms: u64,

    #[serde(default)]
    pub pubsub: PubSubConfig,

    #[serde(default)]
    pub balance: BalanceConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_run_ms() -> u64 {
    debug!("default_run_ms: called");
    6_000
}

impl Default for DemosConfig {
    fn default() -> Self {
        Self {
            run_ms: default_run_ms(),
            pubsub: PubSubConfig::default(),
            balance: BalanceConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl DemosConfig {
    pub fn run_for(&self) -> Duration {
        Duration::from_millis(self.run_ms)
    }
}

/// One subscriber and the topics it subscribes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    pub address: Address,
    pub topics: Vec<String>,
}

/// Broker, periodic publisher and subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub broker: Address,

    pub publisher: Address,

    /// Period between publish rounds in milliseconds
    #[serde(rename = "publish-period-ms")]
    pub publish_period_ms: u64,

    /// Topics published on every round
    pub topics: Vec<String>,

    pub subscribers: Vec<SubscriberConfig>,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        let topics = |list: &[&str]| list.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        Self {
            broker: "broker@localhost".into(),
            publisher: "publisher@localhost".into(),
            publish_period_ms: 5_000,
            topics: topics(&["news", "weather", "sports"]),
            subscribers: vec![
                SubscriberConfig {
                    address: "subscriber1@localhost".into(),
                    topics: topics(&["news", "weather"]),
                },
                SubscriberConfig {
                    address: "subscriber2@localhost".into(),
                    topics: topics(&["sports"]),
                },
            ],
        }
    }
}

impl PubSubConfig {
    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }
}

/// Forwarder, responders and aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub forwarder: Address,

    pub responders: Vec<Address>,

    pub aggregator: Address,

    /// Responses per flushed batch
    #[serde(rename = "batch-threshold")]
    pub batch_threshold: usize,

    /// Requests the client sends into the forwarder
    pub requests: usize,

    pub client: Address,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            forwarder: "forwarder@localhost".into(),
            responders: vec!["responder1@localhost".into(), "responder2@localhost".into()],
            aggregator: "aggregator@localhost".into(),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            requests: 10,
            client: "client@localhost".into(),
        }
    }
}

/// Coordinator handing one task to each worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub coordinator: Address,

    pub workers: Vec<Address>,

    pub task: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            coordinator: "coordinator@localhost".into(),
            workers: vec!["worker1@localhost".into(), "worker2@localhost".into()],
            task: "process_data".to_string(),
        }
    }
}
