//! Common test utilities and fixtures.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use aegis_lib::core::clock::{Clock, ManualClock};
use aegis_lib::core::collaborators::TelemetrySink;
use aegis_lib::core::{Config, ConfigBuilder};
use aegis_lib::metrics::MetricStore;
use aegis_lib::pipeline::ErrorStore;
use aegis_lib::storage::{KeyValueStore, MemoryStore};

/// Fixed start time for the manual clock (2023-11-14T22:13:20Z).
pub const START_MS: i64 = 1_700_000_000_000;

/// Telemetry sink that remembers every event.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|(name, _)| name == event).count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: &str, properties: serde_json::Value) {
        self.events.lock().push((event.to_string(), properties));
    }
}

/// Both stores over one in-memory backend and a manual clock.
pub struct Harness {
    pub config: Config,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<MemoryStore>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub errors: Arc<ErrorStore>,
    pub metrics: Arc<MetricStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new().build().unwrap())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_backend(config, Arc::new(MemoryStore::new()))
    }

    /// Fresh stores over an existing backend, as after a restart.
    pub fn with_backend(config: Config, backend: Arc<MemoryStore>) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let telemetry = Arc::new(RecordingTelemetry::default());
        let store = Arc::clone(&backend) as Arc<dyn KeyValueStore>;
        let shared = Arc::clone(&clock) as Arc<dyn Clock>;
        let sink = Arc::clone(&telemetry) as Arc<dyn TelemetrySink>;
        let errors = Arc::new(
            ErrorStore::new(&config, Arc::clone(&store), Arc::clone(&shared)).with_telemetry(Arc::clone(&sink)),
        );
        let metrics = Arc::new(
            MetricStore::new(&config, store, shared, Arc::clone(&errors)).with_telemetry(sink),
        );
        Self {
            config,
            clock,
            backend,
            telemetry,
            errors,
            metrics,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }
}
