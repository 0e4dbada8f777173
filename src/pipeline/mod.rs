//! Error pipeline: classification, throttling, burst detection and the store.
//!
//! A failure flows through [`classifier::classify`], is checked against the
//! [`Throttle`], lands in the [`ErrorStore`], and CRITICAL records are
//! counted by the [`CriticalBurstDetector`].

pub mod burst;
pub mod classifier;
pub mod store;
pub mod throttle;

pub use burst::{BurstAlert, BurstEntry, CriticalBurstDetector};
pub use classifier::{classify, is_benign_read_failure, Classification};
pub use store::{ErrorReport, ErrorStats, ErrorStore, WindowStats};
pub use throttle::{normalize, Suppression, Throttle, ThrottleWindow};
