//! Configuration management for Aegis.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::{AegisError, MetricType, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for Aegis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retry executor configuration
    pub retry: RetryConfig,
    /// Error store configuration
    pub errors: ErrorStoreConfig,
    /// Duplicate and burst suppression
    pub throttle: ThrottleConfig,
    /// Critical burst detection
    pub bursts: BurstConfig,
    /// Metric store and thresholds
    pub metrics: MetricsConfig,
    /// Background maintenance
    pub maintenance: MaintenanceConfig,
    /// Device snapshot overrides
    pub device: DeviceConfig,
    /// Persistence location
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// User-facing alert text overrides, keyed by code or message family
    pub messages: BTreeMap<String, String>,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay, doubled on each attempt
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`
    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

/// Error store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorStoreConfig {
    /// Maximum records kept
    pub max_records: usize,
    /// Records older than this are dropped unconditionally
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// HIGH/CRITICAL records younger than this are kept ahead of lower severities
    #[serde(with = "humantime_serde")]
    pub priority_retention: Duration,
}

/// Throttle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Repeats of a signature within this window are dropped
    #[serde(with = "humantime_serde")]
    pub duplicate_window: Duration,
    /// Sliding window for burst counting
    #[serde(with = "humantime_serde")]
    pub burst_window: Duration,
    /// Occurrences within `burst_window` that trigger suppression
    pub burst_limit: usize,
    /// Signature length in characters
    pub signature_length: usize,
}

/// Critical burst configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Rolling window for CRITICAL records
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Count that fires the aggregate alert
    pub threshold: usize,
}

/// Metric store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum samples kept
    pub max_samples: usize,
    /// Maximum performance alerts kept
    pub max_alerts: usize,
    /// Samples and alerts older than this are dropped
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Per-type thresholds (milliseconds, or MB for memory)
    pub thresholds: BTreeMap<MetricType, f64>,
}

/// Maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Interval between retention sweeps
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

/// Device snapshot overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Platform name, defaults to the host OS
    pub platform: Option<String>,
    /// App version, defaults to the crate version
    pub app_version: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed key-value store
    pub data_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            retry: RetryConfig::default(),
            errors: ErrorStoreConfig::default(),
            throttle: ThrottleConfig::default(),
            bursts: BurstConfig::default(),
            metrics: MetricsConfig::default(),
            maintenance: MaintenanceConfig::default(),
            device: DeviceConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            messages: BTreeMap::new(),
            debug: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl Default for ErrorStoreConfig {
    fn default() -> Self {
        ErrorStoreConfig {
            max_records: 500,
            retention: Duration::from_secs(7 * 24 * 3600),          // 7 days
            priority_retention: Duration::from_secs(7 * 24 * 3600), // 7 days
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            duplicate_window: Duration::from_secs(30),
            burst_window: Duration::from_secs(5),
            burst_limit: 3,
            signature_length: 100,
        }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        BurstConfig {
            window: Duration::from_secs(3600), // 1 hour
            threshold: 3,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            max_samples: 1000,
            max_alerts: 100,
            retention: Duration::from_secs(7 * 24 * 3600), // 7 days
            thresholds: default_thresholds(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        MaintenanceConfig {
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./aegis_data"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

/// Built-in thresholds per metric type.
pub fn default_thresholds() -> BTreeMap<MetricType, f64> {
    BTreeMap::from([
        (MetricType::LoadTime, 3000.0),
        (MetricType::RemoteCall, 5000.0),
        (MetricType::Render, 100.0),
        (MetricType::Memory, 100.0),
        (MetricType::NetworkLatency, 2000.0),
        (MetricType::Interaction, 500.0),
    ])
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Retry validation
        if self.retry.base_delay > self.retry.max_delay {
            return Err(AegisError::config(format!(
                "base_delay ({:?}) must not exceed max_delay ({:?})",
                self.retry.base_delay, self.retry.max_delay
            )));
        }

        // Store capacities
        if self.errors.max_records == 0 {
            return Err(AegisError::config("errors.max_records must be greater than 0"));
        }

        if self.metrics.max_samples == 0 {
            return Err(AegisError::config("metrics.max_samples must be greater than 0"));
        }

        // Throttle validation
        if self.throttle.burst_limit == 0 {
            return Err(AegisError::config("throttle.burst_limit must be greater than 0"));
        }

        if self.throttle.signature_length == 0 {
            return Err(AegisError::config("throttle.signature_length must be greater than 0"));
        }

        if self.bursts.threshold == 0 {
            return Err(AegisError::config("bursts.threshold must be greater than 0"));
        }

        for (metric, value) in &self.metrics.thresholds {
            if !value.is_finite() || *value <= 0.0 {
                return Err(AegisError::InvalidThreshold {
                    metric: metric.to_string(),
                    value: *value,
                });
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| AegisError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    /// Set base backoff delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set max error records
    pub fn max_records(mut self, count: usize) -> Self {
        self.config.errors.max_records = count;
        self
    }

    /// Set max metric samples
    pub fn max_samples(mut self, count: usize) -> Self {
        self.config.metrics.max_samples = count;
        self
    }

    /// Set critical burst threshold
    pub fn burst_threshold(mut self, threshold: usize) -> Self {
        self.config.bursts.threshold = threshold;
        self
    }

    /// Override one metric threshold
    pub fn threshold(mut self, metric: MetricType, value: f64) -> Self {
        self.config.metrics.thresholds.insert(metric, value);
        self
    }

    /// Set data directory
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.storage.data_dir = path;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Log with targets and line numbers
    pub fn structured_logging(mut self, structured: bool) -> Self {
        self.config.logging.structured = structured;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
