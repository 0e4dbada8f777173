//! Domain records shared by the error pipeline and the metric store.

use crate::core::device::DeviceContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value context attached by callers.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * 60 * 1000;
/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Broad failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    RemoteService,
    Auth,
    Validation,
    Runtime,
    Security,
    Performance,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Network,
        ErrorKind::RemoteService,
        ErrorKind::Auth,
        ErrorKind::Validation,
        ErrorKind::Runtime,
        ErrorKind::Security,
        ErrorKind::Performance,
    ];

    /// Lowercase name used in telemetry and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::RemoteService => "remote_service",
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Security => "security",
            ErrorKind::Performance => "performance",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, ascending.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Lowercase name used in telemetry and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// HIGH and CRITICAL records are protected during trimming.
    pub fn is_priority(&self) -> bool {
        *self >= Severity::High
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, logged failure.
///
/// `kind` and `severity` never change after creation; only `resolved`
/// and `retry_count` are mutated by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub device: DeviceContext,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub retry_count: u32,
}

impl ErrorRecord {
    /// Look up a context value by key.
    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }

    /// Age relative to `now`, in milliseconds.
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Category of a performance sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    LoadTime,
    RemoteCall,
    Render,
    Memory,
    NetworkLatency,
    Interaction,
}

impl MetricType {
    /// All metric types.
    pub const ALL: [MetricType; 6] = [
        MetricType::LoadTime,
        MetricType::RemoteCall,
        MetricType::Render,
        MetricType::Memory,
        MetricType::NetworkLatency,
        MetricType::Interaction,
    ];

    /// Lowercase name used in config keys and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::LoadTime => "load_time",
            MetricType::RemoteCall => "remote_call",
            MetricType::Render => "render",
            MetricType::Memory => "memory",
            MetricType::NetworkLatency => "network_latency",
            MetricType::Interaction => "interaction",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded measurement. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub id: String,
    pub metric_type: MetricType,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    pub session_id: String,
}

/// Raised when a sample exceeds the threshold for its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub metric_type: MetricType,
    pub metric_name: String,
    pub threshold: f64,
    pub actual_value: f64,
    pub exceed_ratio: f64,
    pub severity: Severity,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::High.is_priority());
        assert!(!Severity::Medium.is_priority());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::RemoteService).unwrap(),
            "\"REMOTE_SERVICE\""
        );
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(
            serde_json::to_string(&MetricType::NetworkLatency).unwrap(),
            "\"NETWORK_LATENCY\""
        );
    }
}
