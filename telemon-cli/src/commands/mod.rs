//! CLI command implementations

pub mod config;
pub mod health;
pub mod monitor;
pub mod publish;

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use telemon_core::Config;

/// Broker settings that override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct BrokerArgs {
    /// Broker hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Broker port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Topic carrying sensor readings
    #[arg(short, long)]
    pub topic: Option<String>,
}

impl BrokerArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(topic) = &self.topic {
            config.broker.topic = topic.clone();
        }
    }
}

/// Load the config file (or defaults) and apply command-line overrides.
pub fn load_config(path: Option<&Path>, broker: &BrokerArgs) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    broker.apply(&mut config);
    config.validate()?;
    Ok(config)
}
