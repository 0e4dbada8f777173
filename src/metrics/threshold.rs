//! Per-type performance thresholds and breach evaluation.

use crate::core::config::default_thresholds;
use crate::core::{AegisError, Context, ErrorKind, MetricType, PerformanceAlert, PerformanceSample, Result, Severity};
use crate::pipeline::{ErrorReport, ErrorStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity for a given `value / threshold` ratio.
pub fn severity_for_ratio(ratio: f64) -> Severity {
    if ratio > 3.0 {
        Severity::Critical
    } else if ratio > 2.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Compares samples against thresholds and forwards breaches to the error store.
pub struct ThresholdMonitor {
    thresholds: RwLock<BTreeMap<MetricType, f64>>,
    errors: Arc<ErrorStore>,
}

impl ThresholdMonitor {
    /// Built-in thresholds overlaid with `overrides`.
    pub fn new(overrides: &BTreeMap<MetricType, f64>, errors: Arc<ErrorStore>) -> Self {
        let mut thresholds = default_thresholds();
        thresholds.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        Self {
            thresholds: RwLock::new(thresholds),
            errors,
        }
    }

    /// Threshold for a metric type.
    pub fn threshold(&self, metric: MetricType) -> Option<f64> {
        self.thresholds.read().get(&metric).copied()
    }

    /// Change one threshold.
    pub fn set_threshold(&self, metric: MetricType, value: f64) -> Result<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(AegisError::InvalidThreshold {
                metric: metric.to_string(),
                value,
            });
        }
        self.thresholds.write().insert(metric, value);
        Ok(())
    }

    /// Evaluate a sample. Returns an alert when it exceeds its threshold.
    ///
    /// NaN and infinite values never breach.
    pub fn check(&self, sample: &PerformanceSample) -> Option<PerformanceAlert> {
        let threshold = self.threshold(sample.metric_type)?;
        if !sample.value.is_finite() || sample.value <= threshold {
            return None;
        }

        let ratio = sample.value / threshold;
        Some(PerformanceAlert {
            metric_type: sample.metric_type,
            metric_name: sample.name.clone(),
            threshold,
            actual_value: sample.value,
            exceed_ratio: ratio,
            severity: severity_for_ratio(ratio),
            timestamp: sample.timestamp,
            context: sample.context.clone(),
        })
    }

    /// Log an alert as a PERFORMANCE error record.
    pub async fn report(&self, alert: &PerformanceAlert, unit: &str) -> Option<String> {
        let mut context = Context::new();
        context.insert("metric_type".to_string(), alert.metric_type.as_str().into());
        context.insert("metric_name".to_string(), alert.metric_name.as_str().into());
        context.insert("value".to_string(), alert.actual_value.into());
        context.insert("threshold".to_string(), alert.threshold.into());
        context.insert("exceed_ratio".to_string(), alert.exceed_ratio.into());
        if let Some(extra) = &alert.context {
            context.extend(extra.clone());
        }

        let message = format!(
            "Performance threshold exceeded: {} took {:.1}{} (threshold {:.1}{})",
            alert.metric_name, alert.actual_value, unit, alert.threshold, unit
        );

        self.errors
            .record(
                ErrorReport::new(message)
                    .kind(ErrorKind::Performance)
                    .severity(alert.severity)
                    .with_context(context),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::Config;
    use crate::storage::MemoryStore;

    fn monitor() -> (ThresholdMonitor, Arc<ErrorStore>) {
        let errors = Arc::new(ErrorStore::new(
            &Config::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        ));
        (ThresholdMonitor::new(&BTreeMap::new(), Arc::clone(&errors)), errors)
    }

    fn sample(metric_type: MetricType, value: f64) -> PerformanceSample {
        PerformanceSample {
            id: "s".to_string(),
            metric_type,
            name: "feed".to_string(),
            value,
            unit: "ms".to_string(),
            timestamp: 0,
            context: None,
            session_id: "session".to_string(),
        }
    }

    #[test]
    fn test_ratio_severity() {
        assert_eq!(severity_for_ratio(3.5), Severity::Critical);
        assert_eq!(severity_for_ratio(3.0), Severity::High);
        assert_eq!(severity_for_ratio(2.5), Severity::High);
        assert_eq!(severity_for_ratio(2.0), Severity::Medium);
        assert_eq!(severity_for_ratio(1.5), Severity::Medium);
    }

    #[test]
    fn test_render_thresholds() {
        let (monitor, _) = monitor();

        let alert = monitor.check(&sample(MetricType::Render, 350.0)).unwrap();
        assert!((alert.exceed_ratio - 3.5).abs() < f64::EPSILON);
        assert_eq!(alert.severity, Severity::Critical);

        let alert = monitor.check(&sample(MetricType::Render, 150.0)).unwrap();
        assert!((alert.exceed_ratio - 1.5).abs() < f64::EPSILON);
        assert_eq!(alert.severity, Severity::Medium);

        assert!(monitor.check(&sample(MetricType::Render, 100.0)).is_none());
    }

    #[test]
    fn test_non_finite_never_breaches() {
        let (monitor, _) = monitor();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(monitor.check(&sample(MetricType::Render, value)).is_none(), "{}", value);
        }
    }

    #[test]
    fn test_overrides_keep_other_defaults() {
        let errors = Arc::new(ErrorStore::new(
            &Config::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        ));
        let overrides = BTreeMap::from([(MetricType::Render, 16.0)]);
        let monitor = ThresholdMonitor::new(&overrides, errors);

        assert_eq!(monitor.threshold(MetricType::Render), Some(16.0));
        assert_eq!(monitor.threshold(MetricType::LoadTime), Some(3000.0));
        assert!(monitor.set_threshold(MetricType::Memory, -1.0).is_err());
        monitor.set_threshold(MetricType::Memory, 256.0).unwrap();
        assert_eq!(monitor.threshold(MetricType::Memory), Some(256.0));
    }

    #[tokio::test]
    async fn test_report_creates_performance_record() {
        let (monitor, errors) = monitor();
        let alert = monitor.check(&sample(MetricType::LoadTime, 7500.0)).unwrap();

        let id = monitor.report(&alert, "ms").await.unwrap();
        let record = errors.get(&id).unwrap();

        assert_eq!(record.kind, ErrorKind::Performance);
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.context_value("threshold"), Some(&serde_json::json!(3000.0)));
        assert_eq!(record.context_value("exceed_ratio"), Some(&serde_json::json!(2.5)));
    }
}
