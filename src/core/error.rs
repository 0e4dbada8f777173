use thiserror::Error;

#[derive(Error, Debug)]
pub enum AegisError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid threshold for {metric}: {value}")]
    InvalidThreshold { metric: String, value: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for Aegis operations
pub type Result<T> = std::result::Result<T, AegisError>;

impl AegisError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage(_) | Self::Io(_) => "storage",
            Self::Config(_) | Self::Yaml(_) | Self::InvalidThreshold { .. } => "config",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
            Self::NotFound(_) => "not_found",
        }
    }
}
