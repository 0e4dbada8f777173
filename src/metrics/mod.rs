//! Performance samples and threshold alerting.
//!
//! Samples go into the [`MetricStore`]; the [`ThresholdMonitor`] turns
//! breaches into PERFORMANCE records in the error pipeline.

pub mod store;
pub mod threshold;

pub use store::{MetricStore, MetricSummary};
pub use threshold::{severity_for_ratio, ThresholdMonitor};
