//! Command-line interface for Aegis.
//!
//! The binary inspects and maintains the persisted error log and metric
//! store, or runs the maintenance loop headless until interrupted.

use crate::application::Application;
use crate::core::{AegisError, Config, ConfigBuilder, ErrorRecord, Result};
use crate::monitoring::HealthReport;
use crate::pipeline::ErrorStats;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Error pipeline and performance monitor.
#[derive(Parser, Debug)]
#[command(name = "aegis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/aegis/config.yaml)
    #[arg(short, long, env = "AEGIS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted error log and metrics
    #[arg(long, env = "AEGIS_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "AEGIS_DEBUG", global = true)]
    pub debug: bool,

    /// Log with targets and line numbers
    #[arg(long, env = "AEGIS_LOG_STRUCTURED", global = true)]
    pub structured: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate configuration and print it as YAML
    CheckConfig,
    /// Print error statistics and health as JSON
    Stats,
    /// List error records as JSON, newest first
    Errors {
        /// Maximum number of records
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only unresolved records
        #[arg(long)]
        unresolved: bool,
    },
    /// Print per-type metric summaries as JSON
    Metrics,
    /// Apply retention and capacity limits to the persisted data
    Prune,
    /// Mark an error record resolved
    Resolve {
        /// Record id
        id: String,
    },
    /// Run maintenance in the foreground until interrupted
    Run,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("aegis").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/aegis/config.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return self.build_config_from_args(builder);
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                tracing::info!("Loaded configuration from: {:?}", config_path);
            },
            Err(e) if self.config.is_some() => {
                return Err(AegisError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            Err(_) => {
                tracing::debug!("No config file found at {:?}, using defaults", config_path);
            },
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir.clone());
        }
        if self.structured {
            builder = builder.structured_logging(true);
        }
        builder.debug(self.debug).build()
    }

    /// Initialize logging from the loaded configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = log_level(config, std::env::var("AEGIS_LOG_LEVEL").ok());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| AegisError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Filter directive: debug mode wins, then `AEGIS_LOG_LEVEL`, then the config file.
fn log_level(config: &Config, env_level: Option<String>) -> String {
    if config.debug {
        return "debug".to_string();
    }
    env_level
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| config.logging.level.as_str().to_string())
}

#[derive(Serialize)]
struct StatsOutput {
    errors: ErrorStats,
    health: HealthReport,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn select_records(app: &Application, limit: usize, unresolved: bool) -> Vec<ErrorRecord> {
    if unresolved {
        let mut records = app.errors().unresolved();
        records.truncate(limit);
        records
    } else {
        app.errors().recent(limit)
    }
}

/// Execute the Aegis application.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;
    tracing::debug!(
        level = config.logging.level.as_str(),
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Command::CheckConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            println!("# Configuration is valid!");
            Ok(())
        },
        Command::Run => run_headless(&Application::new(config)?).await,
        command => {
            let app = Application::new(config)?;
            app.errors().load().await?;
            app.metrics().load().await?;
            run_offline(&app, command).await
        },
    }
}

async fn run_offline(app: &Application, command: Command) -> Result<()> {
    match command {
        Command::Stats => print_json(&StatsOutput {
            errors: app.errors().stats(),
            health: app.monitor().health_report(),
        }),
        Command::Errors { limit, unresolved } => print_json(&select_records(app, limit, unresolved)),
        Command::Metrics => print_json(&app.metrics().summary()),
        Command::Prune => {
            let dropped = app.monitor().sweep().await;
            app.errors().persist().await;
            app.metrics().persist().await;
            println!("Pruned {} entries", dropped);
            Ok(())
        },
        Command::Resolve { id } => {
            if app.errors().resolve(&id).await {
                println!("Resolved {}", id);
                Ok(())
            } else {
                Err(AegisError::not_found(format!("error record {}", id)))
            }
        },
        Command::CheckConfig | Command::Run => Ok(()),
    }
}

async fn run_headless(app: &Application) -> Result<()> {
    app.start().await?;
    tracing::info!(
        data_dir = %app.config().storage.data_dir.display(),
        "Aegis running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping...");

    app.shutdown().await;
    Ok(())
}
