//! Durable key-value persistence for the error and metric stores.
//!
//! Collections are persisted as serialized JSON arrays under fixed keys.

pub mod backend;
pub mod file;

pub use backend::{KeyValueStore, MemoryStore};
pub use file::FileStore;

/// Key holding the serialized error records.
pub const ERROR_LOGS_KEY: &str = "error_logs";
/// Key holding the serialized performance samples.
pub const PERFORMANCE_METRICS_KEY: &str = "performance_metrics";
/// Key holding the serialized performance alerts.
pub const PERFORMANCE_ALERTS_KEY: &str = "performance_alerts";
