//! Bounded, persisted store of performance samples and alerts.

use super::threshold::ThresholdMonitor;
use crate::core::clock::{duration_ms, Clock};
use crate::core::collaborators::{NoopTelemetry, TelemetrySink};
use crate::core::config::{Config, MetricsConfig};
use crate::core::{Context, MetricType, PerformanceAlert, PerformanceSample, Result};
use crate::pipeline::ErrorStore;
use crate::storage::{KeyValueStore, PERFORMANCE_ALERTS_KEY, PERFORMANCE_METRICS_KEY};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Aggregate over all stored samples of one metric type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
}

#[derive(Default)]
struct MetricState {
    // Both newest first.
    samples: Vec<PerformanceSample>,
    alerts: Vec<PerformanceAlert>,
}

/// Process-wide metric buffer.
pub struct MetricStore {
    config: MetricsConfig,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn KeyValueStore>,
    telemetry: Arc<dyn TelemetrySink>,
    monitor: ThresholdMonitor,
    session_id: String,
    state: Mutex<MetricState>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl MetricStore {
    /// Create an empty store whose breaches are logged to `errors`.
    pub fn new(
        config: &Config,
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        errors: Arc<ErrorStore>,
    ) -> Self {
        Self {
            config: config.metrics.clone(),
            clock,
            backend,
            telemetry: Arc::new(NoopTelemetry),
            monitor: ThresholdMonitor::new(&config.metrics.thresholds, errors),
            session_id: uuid::Uuid::new_v4().to_string(),
            state: Mutex::new(MetricState::default()),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Send events to a telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Session identifier stamped on every sample.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Threshold monitor used for breach detection.
    pub fn monitor(&self) -> &ThresholdMonitor {
        &self.monitor
    }

    /// Restore persisted samples and alerts. Returns `(samples, alerts)` kept.
    pub async fn load(&self) -> Result<(usize, usize)> {
        let samples: Vec<PerformanceSample> = self.load_key(PERFORMANCE_METRICS_KEY).await?;
        let alerts: Vec<PerformanceAlert> = self.load_key(PERFORMANCE_ALERTS_KEY).await?;

        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.samples = samples;
        state.alerts = alerts;
        self.trim(&mut state, now);

        tracing::debug!(
            "Loaded {} performance samples and {} alerts",
            state.samples.len(),
            state.alerts.len()
        );
        Ok((state.samples.len(), state.alerts.len()))
    }

    async fn load_key<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(payload) = self.backend.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&payload) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!("Ignoring corrupt {} payload: {}", key, e);
                Ok(Vec::new())
            },
        }
    }

    /// Record a sample, check it against its threshold, and persist.
    ///
    /// Returns the sample id, or `None` when `value` is NaN or infinite.
    pub async fn record_sample(
        &self,
        metric_type: MetricType,
        name: &str,
        value: f64,
        unit: &str,
        context: Option<Context>,
    ) -> Option<String> {
        if !value.is_finite() {
            tracing::warn!(metric = %metric_type, name, "Dropping non-finite sample: {}", value);
            return None;
        }

        let now = self.clock.now_ms();
        let sample = PerformanceSample {
            id: uuid::Uuid::new_v4().to_string(),
            metric_type,
            name: name.to_string(),
            value,
            unit: unit.to_string(),
            timestamp: now,
            context,
            session_id: self.session_id.clone(),
        };

        let alert = self.monitor.check(&sample);

        {
            let mut state = self.state.lock();
            state.samples.insert(0, sample.clone());
            if let Some(alert) = &alert {
                state.alerts.insert(0, alert.clone());
            }
            self.trim(&mut state, now);
        }

        self.telemetry.emit(
            "performance_metric",
            serde_json::json!({
                "metric_type": metric_type.as_str(),
                "name": name,
                "value": value,
                "unit": unit,
            }),
        );

        if let Some(alert) = alert {
            tracing::warn!(
                metric = %alert.metric_type,
                name = %alert.metric_name,
                value = alert.actual_value,
                threshold = alert.threshold,
                "Performance threshold exceeded"
            );
            self.monitor.report(&alert, unit).await;
        }

        self.persist().await;
        Some(sample.id)
    }

    /// Time `operation`, record the elapsed milliseconds, and return its result.
    ///
    /// The sample is recorded on failure too, with `success: false`.
    pub async fn measure<Fut, T, E>(
        &self,
        name: &str,
        metric_type: MetricType,
        context: Option<Context>,
        operation: Fut,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let started = tokio::time::Instant::now();
        let result = operation.await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut context = context.unwrap_or_default();
        context.insert("success".to_string(), result.is_ok().into());
        if let Err(e) = &result {
            context.insert("error".to_string(), e.to_string().into());
        }

        self.record_sample(metric_type, name, elapsed_ms, "ms", Some(context))
            .await;
        result
    }

    /// Most recent samples, newest first.
    pub fn samples(&self, limit: usize) -> Vec<PerformanceSample> {
        self.state.lock().samples.iter().take(limit).cloned().collect()
    }

    /// Most recent alerts, newest first.
    pub fn alerts(&self, limit: usize) -> Vec<PerformanceAlert> {
        self.state.lock().alerts.iter().take(limit).cloned().collect()
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    /// Whether no samples are held.
    pub fn is_empty(&self) -> bool {
        self.state.lock().samples.is_empty()
    }

    /// Per-type aggregates over the stored samples.
    pub fn summary(&self) -> BTreeMap<MetricType, MetricSummary> {
        let mut grouped: BTreeMap<MetricType, Vec<f64>> = BTreeMap::new();
        for sample in &self.state.lock().samples {
            grouped.entry(sample.metric_type).or_default().push(sample.value);
        }

        grouped
            .into_iter()
            .map(|(metric, mut values)| {
                values.sort_by(f64::total_cmp);
                let count = values.len();
                let sum: f64 = values.iter().sum();
                // Nearest-rank p95.
                let rank = ((count as f64) * 0.95).ceil() as usize;
                let p95 = values[rank.clamp(1, count) - 1];
                let summary = MetricSummary {
                    count,
                    average: sum / count as f64,
                    min: values[0],
                    max: values[count - 1],
                    p95,
                };
                (metric, summary)
            })
            .collect()
    }

    /// Drop all samples and alerts.
    pub async fn clear(&self) {
        *self.state.lock() = MetricState::default();
        self.persist().await;
    }

    /// Apply retention and capacity limits. Returns the number dropped.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let dropped = {
            let mut state = self.state.lock();
            let before = state.samples.len() + state.alerts.len();
            self.trim(&mut state, now);
            before - (state.samples.len() + state.alerts.len())
        };
        if dropped > 0 {
            tracing::debug!("Retention sweep dropped {} performance entries", dropped);
            self.persist().await;
        }
        dropped
    }

    /// Write samples and alerts. Failures are logged, never returned.
    pub async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;

        let payloads = {
            let now = self.clock.now_ms();
            let mut state = self.state.lock();
            self.trim(&mut state, now);
            serde_json::to_string(&state.samples)
                .and_then(|samples| serde_json::to_string(&state.alerts).map(|alerts| (samples, alerts)))
        };

        let (samples, alerts) = match payloads {
            Ok(payloads) => payloads,
            Err(e) => {
                tracing::warn!("Failed to serialize performance data: {}", e);
                return;
            },
        };

        if let Err(e) = self.backend.set(PERFORMANCE_METRICS_KEY, samples).await {
            tracing::warn!("Failed to persist performance samples: {}", e);
        }
        if let Err(e) = self.backend.set(PERFORMANCE_ALERTS_KEY, alerts).await {
            tracing::warn!("Failed to persist performance alerts: {}", e);
        }
    }

    fn trim(&self, state: &mut MetricState, now: i64) {
        let retention_ms = duration_ms(self.config.retention);
        state
            .samples
            .retain(|s| now.saturating_sub(s.timestamp) < retention_ms);
        state.samples.truncate(self.config.max_samples);
        state
            .alerts
            .retain(|a| now.saturating_sub(a.timestamp) < retention_ms);
        state.alerts.truncate(self.config.max_alerts);
    }
}
