use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod shutdown;

use commands::BrokerArgs;

#[derive(Parser)]
#[command(name = "telemon")]
#[command(about = "Live sensor metrics from an MQTT broker", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "TELEMON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe and render a live dashboard
    Monitor {
        #[command(flatten)]
        broker: BrokerArgs,

        /// Seconds between dashboard refreshes
        #[arg(short, long, default_value = "2")]
        refresh_secs: u64,

        /// Rows shown in the history table
        #[arg(long, default_value = "10")]
        history: usize,
    },

    /// Publish simulated sensor readings
    Publish {
        #[command(flatten)]
        broker: BrokerArgs,

        /// Seconds between readings
        #[arg(short, long, default_value = "2")]
        interval_secs: u64,

        /// Stop after this many readings
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Connect once and report subsystem health
    Health {
        #[command(flatten)]
        broker: BrokerArgs,

        /// Seconds to wait for the broker
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },

    /// Inspect or initialise the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Monitor { broker, refresh_secs, history } => {
            let config = commands::load_config(config_path, &broker)?;
            commands::monitor::run(config, Duration::from_secs(refresh_secs.max(1)), history)
                .await?;
        }

        Commands::Publish { broker, interval_secs, count } => {
            let config = commands::load_config(config_path, &broker)?;
            commands::publish::run(config, Duration::from_secs(interval_secs.max(1)), count)
                .await?;
        }

        Commands::Health { broker, timeout_secs } => {
            let config = commands::load_config(config_path, &broker)?;
            commands::health::run(config, Duration::from_secs(timeout_secs)).await?;
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => commands::config::show(config_path)?,
            ConfigCommands::Init { force } => commands::config::init(config_path, force)?,
            ConfigCommands::Path => commands::config::path(config_path),
        },
    }

    Ok(())
}
