//! Scheduled maintenance and health reporting for Aegis.
//!
//! The [`Monitor`] owns the background sweep that keeps the error log and
//! the metric store inside their retention and capacity limits, and derives
//! an overall [`SystemHealth`] from the error log.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::clock::Clock;
use crate::core::{Config, Severity, DAY_MS};
use crate::metrics::MetricStore;
use crate::pipeline::ErrorStore;

/// System health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    /// No recent HIGH or CRITICAL errors.
    Healthy,
    /// HIGH errors in the last 24 hours.
    Degraded,
    /// Unresolved CRITICAL errors in the last 24 hours.
    Unhealthy,
    /// A critical burst is active.
    Critical,
}

impl SystemHealth {
    /// Get severity score (0-100).
    pub fn severity(&self) -> u8 {
        match self {
            SystemHealth::Healthy => 0,
            SystemHealth::Degraded => 25,
            SystemHealth::Unhealthy => 75,
            SystemHealth::Critical => 100,
        }
    }
}

/// Health snapshot with the counts it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Overall status.
    pub health: SystemHealth,
    /// Score from [`SystemHealth::severity`].
    pub score: u8,
    /// CRITICAL records inside the burst window.
    pub critical_burst_count: usize,
    /// Unresolved CRITICAL records in the last 24 hours.
    pub unresolved_critical_24h: usize,
    /// HIGH records in the last 24 hours.
    pub high_24h: usize,
}

/// Background maintenance task.
pub struct Monitor {
    errors: Arc<ErrorStore>,
    metrics: Arc<MetricStore>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    burst_threshold: usize,
    /// Shutdown signal.
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    /// Create a monitor over both stores.
    pub fn new(
        config: &Config,
        errors: Arc<ErrorStore>,
        metrics: Arc<MetricStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            errors,
            metrics,
            clock,
            sweep_interval: config.maintenance.sweep_interval,
            burst_threshold: config.bursts.threshold,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the sweep loop in the background. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        self.shutdown.store(false, Ordering::Relaxed);
        let errors = Arc::clone(&self.errors);
        let metrics = Arc::clone(&self.metrics);
        let shutdown = Arc::clone(&self.shutdown);
        let period = self.sweep_interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                Self::sweep_once(&errors, &metrics).await;
            }
            tracing::debug!("Maintenance loop stopped");
        }));

        tracing::info!("Maintenance started, sweeping every {:?}", period);
    }

    /// Stop the sweep loop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    /// Whether the sweep loop is running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run one sweep over both stores now. Returns the number of entries dropped.
    pub async fn sweep(&self) -> usize {
        Self::sweep_once(&self.errors, &self.metrics).await
    }

    async fn sweep_once(errors: &ErrorStore, metrics: &MetricStore) -> usize {
        let dropped_errors = errors.sweep().await;
        let dropped_metrics = metrics.sweep().await;
        let dropped = dropped_errors + dropped_metrics;
        if dropped > 0 {
            tracing::info!(
                errors = dropped_errors,
                metrics = dropped_metrics,
                "Retention sweep dropped {} entries",
                dropped
            );
        }
        dropped
    }

    /// Current overall health.
    pub fn health(&self) -> SystemHealth {
        self.health_report().health
    }

    /// Health with the counts behind it.
    pub fn health_report(&self) -> HealthReport {
        let now = self.clock.now_ms();
        let critical_burst_count = self.errors.critical_burst_count();

        let mut unresolved_critical_24h = 0;
        let mut high_24h = 0;
        for record in self.errors.records() {
            if record.age_ms(now) >= DAY_MS {
                continue;
            }
            match record.severity {
                Severity::Critical if !record.resolved => unresolved_critical_24h += 1,
                Severity::High => high_24h += 1,
                _ => {},
            }
        }

        let health = if critical_burst_count >= self.burst_threshold {
            SystemHealth::Critical
        } else if unresolved_critical_24h > 0 {
            SystemHealth::Unhealthy
        } else if high_24h > 0 {
            SystemHealth::Degraded
        } else {
            SystemHealth::Healthy
        };

        HealthReport {
            health,
            score: health.severity(),
            critical_burst_count,
            unresolved_critical_24h,
            high_24h,
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
