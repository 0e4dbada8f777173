//! Core domain types, configuration and shared plumbing for Aegis.
//!
//! This module holds the vocabulary the rest of the crate speaks: failures,
//! classified error records, performance samples, and the collaborators
//! (clock, connectivity, telemetry, identity) injected into the stores.

#![warn(missing_docs)]

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod device;
pub mod error;
pub mod failure;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use device::DeviceContext;
pub use error::{AegisError, Result};
pub use failure::{Failure, RemoteCode};
pub use types::{
    Context, ErrorKind, ErrorRecord, MetricType, PerformanceAlert, PerformanceSample, Severity,
    DAY_MS, HOUR_MS,
};
