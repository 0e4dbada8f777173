//! Aegis - error pipeline and performance monitor for client applications.
//!
//! Aegis wraps risky remote operations with retry and backoff, classifies
//! and throttles the failures that escape, keeps a bounded persistent error
//! log, raises an aggregate alert when critical errors cluster, and feeds
//! performance threshold breaches into the same log.
//!
//! # Architecture
//!
//! - `core`: domain types, failures, configuration and the retry executor
//! - `pipeline`: classification, throttling, burst detection, error store
//! - `metrics`: performance samples and threshold alerts
//! - `alert`: user-facing dialogs with retry
//! - `storage`: pluggable key-value persistence
//! - `monitoring`: scheduled retention sweeps and health
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use aegis_lib::core::{Config, Failure};
//! use aegis_lib::Application;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new(Config::default())?;
//!     app.start().await?;
//!
//!     let executor = app.retry();
//!     let saved = executor
//!         .run("save_profile", executor.options(), || async {
//!             Err::<(), _>(Failure::remote("unavailable", "backend down"))
//!         })
//!         .await;
//!     assert!(saved.is_err());
//!
//!     app.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod alert;
pub mod application;
pub mod cli;
pub mod core;
pub mod metrics;
pub mod monitoring;
pub mod pipeline;
pub mod storage;

// Re-export core types for convenience
pub use crate::application::Application;
pub use crate::core::{AegisError, Config, Result};
