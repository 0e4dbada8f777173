//! Bounded, persisted store of classified error records.
//!
//! Records are kept newest first. Every accepted record passes the
//! [`Throttle`], CRITICAL records feed the [`CriticalBurstDetector`], and
//! the collection is trimmed and written to the [`KeyValueStore`] after
//! every mutation. Writes are serialized so a slow write can never
//! overwrite a newer snapshot.

use super::burst::{BurstAlert, CriticalBurstDetector};
use super::classifier::classify;
use super::throttle::Throttle;
use crate::core::clock::{duration_ms, Clock};
use crate::core::collaborators::{IdentityProvider, NoopTelemetry, TelemetrySink};
use crate::core::config::{Config, ErrorStoreConfig};
use crate::core::{
    Context, DeviceContext, ErrorKind, ErrorRecord, Failure, Result, Severity, DAY_MS,
};
use crate::storage::{KeyValueStore, ERROR_LOGS_KEY};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A failure to be logged, with optional caller overrides.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub failure: Failure,
    pub kind: Option<ErrorKind>,
    pub severity: Option<Severity>,
    pub context: Option<Context>,
    pub user_id: Option<String>,
}

impl ErrorReport {
    /// Report a failure with no overrides.
    pub fn new<F: Into<Failure>>(failure: F) -> Self {
        Self {
            failure: failure.into(),
            kind: None,
            severity: None,
            context: None,
            user_id: None,
        }
    }

    /// Force the kind instead of classifying.
    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Force the severity instead of classifying.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Add one context entry.
    pub fn context<K: Into<String>, V: Into<serde_json::Value>>(mut self, key: K, value: V) -> Self {
        self.context
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }

    /// Merge a whole context map.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context.get_or_insert_with(Context::new).extend(context);
        self
    }

    /// Attach an explicit user id.
    pub fn user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl From<Failure> for ErrorReport {
    fn from(failure: Failure) -> Self {
        Self::new(failure)
    }
}

/// Counts over one time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowStats {
    pub total: usize,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl WindowStats {
    fn add(&mut self, record: &ErrorRecord) {
        self.total += 1;
        *self.by_kind.entry(record.kind).or_default() += 1;
        *self.by_severity.entry(record.severity).or_default() += 1;
    }
}

/// Summary returned by [`ErrorStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub unresolved: usize,
    pub last_24h: WindowStats,
    pub last_7d: WindowStats,
    pub critical_burst_count: usize,
}

struct StoreState {
    records: Vec<ErrorRecord>,
    throttle: Throttle,
    bursts: CriticalBurstDetector,
}

/// Process-wide error log.
pub struct ErrorStore {
    config: ErrorStoreConfig,
    clock: Arc<dyn Clock>,
    device: DeviceContext,
    backend: Arc<dyn KeyValueStore>,
    telemetry: Arc<dyn TelemetrySink>,
    identity: Option<Arc<dyn IdentityProvider>>,
    state: Mutex<StoreState>,
    persist_lock: tokio::sync::Mutex<()>,
    bursts_tx: broadcast::Sender<BurstAlert>,
}

impl ErrorStore {
    /// Create an empty store. Call [`ErrorStore::load`] to restore persisted records.
    pub fn new(config: &Config, backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let (bursts_tx, _) = broadcast::channel(16);
        Self {
            config: config.errors.clone(),
            clock,
            device: DeviceContext::detect(),
            backend,
            telemetry: Arc::new(NoopTelemetry),
            identity: None,
            state: Mutex::new(StoreState {
                records: Vec::new(),
                throttle: Throttle::new(config.throttle.clone()),
                bursts: CriticalBurstDetector::new(&config.bursts),
            }),
            persist_lock: tokio::sync::Mutex::new(()),
            bursts_tx,
        }
    }

    /// Use a specific device snapshot.
    pub fn with_device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }

    /// Send events to a telemetry sink.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Attach user ids from an identity provider.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Restore persisted records. Returns the number kept.
    pub async fn load(&self) -> Result<usize> {
        let Some(payload) = self.backend.get(ERROR_LOGS_KEY).await? else {
            return Ok(0);
        };

        let mut records: Vec<ErrorRecord> = match serde_json::from_str(&payload) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Ignoring corrupt error log payload: {}", e);
                return Ok(0);
            },
        };

        let now = self.clock.now_ms();
        enforce_limits(&mut records, now, &self.config);
        let count = records.len();

        let in_burst = {
            let mut state = self.state.lock();
            let critical = records.iter().rev().filter(|r| r.severity == Severity::Critical);
            state.bursts.replay(critical, now);
            state.records = records;
            state.bursts.current_count(now)
        };

        tracing::debug!(in_burst, "Loaded {} error records", count);
        Ok(count)
    }

    /// Log a failure, classifying it unless overridden.
    ///
    /// Returns `None` when the throttle suppressed the occurrence.
    pub async fn record(&self, report: ErrorReport) -> Option<String> {
        let now = self.clock.now_ms();
        let classification = classify(&report.failure, report.severity);
        let kind = report.kind.unwrap_or(classification.kind);
        let severity = report.severity.unwrap_or(classification.severity);
        let message = report.failure.text().to_string();

        let mut context = report.context;
        if let Some(code) = report.failure.code() {
            context
                .get_or_insert_with(Context::new)
                .insert("code".to_string(), code.as_str().into());
        }

        let user_id = report
            .user_id
            .or_else(|| self.identity.as_ref().and_then(|id| id.current_user_id()));

        let record = ErrorRecord {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            kind,
            severity,
            message,
            stack_trace: report.failure.stack_trace().map(str::to_string),
            context,
            user_id,
            device: self.device.clone(),
            resolved: false,
            retry_count: 0,
        };

        let burst = {
            let mut state = self.state.lock();
            let signature = state.throttle.signature(&record.message);
            if let Some(reason) = state.throttle.check(&signature, now) {
                tracing::trace!(?reason, signature = %signature, "Suppressed repeated error");
                return None;
            }

            let burst = if severity == Severity::Critical {
                state.bursts.observe(&record, now)
            } else {
                None
            };

            state.records.insert(0, record.clone());
            enforce_limits(&mut state.records, now, &self.config);
            burst
        };

        log_record(&record);
        self.telemetry.emit(
            "error_logged",
            serde_json::json!({
                "id": record.id,
                "kind": record.kind.as_str(),
                "severity": record.severity.as_str(),
                "message": record.message,
                "context": record.context,
            }),
        );

        if let Some(alert) = burst {
            tracing::error!(
                count = alert.count,
                window_ms = alert.window_ms,
                "Critical error burst detected"
            );
            self.telemetry.emit(
                "critical_error_burst",
                serde_json::json!({
                    "count": alert.count,
                    "window_ms": alert.window_ms,
                    "record_ids": alert.records.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
                }),
            );
            // No subscribers is fine.
            let _ = self.bursts_tx.send(alert);
        }

        self.persist().await;
        Some(record.id)
    }

    /// Shorthand for recording a failure without overrides.
    pub async fn record_failure(&self, failure: Failure) -> Option<String> {
        self.record(ErrorReport::new(failure)).await
    }

    /// Mark a record resolved. Returns false if no such record exists.
    pub async fn resolve(&self, id: &str) -> bool {
        let found = self.mutate(id, |record| record.resolved = true);
        if found {
            self.persist().await;
        }
        found
    }

    /// Bump the retry counter of a record. Returns false if no such record exists.
    pub async fn increment_retry(&self, id: &str) -> bool {
        let found = self.mutate(id, |record| record.retry_count += 1);
        if found {
            self.persist().await;
        }
        found
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<ErrorRecord> {
        self.state.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
        self.state.lock().records.iter().take(limit).cloned().collect()
    }

    /// Unresolved records, newest first.
    pub fn unresolved(&self) -> Vec<ErrorRecord> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| !r.resolved)
            .cloned()
            .collect()
    }

    /// Snapshot of every record, newest first.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.state.lock().records.clone()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Counts by kind and severity plus burst state.
    pub fn stats(&self) -> ErrorStats {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let mut stats = ErrorStats {
            total: state.records.len(),
            critical_burst_count: state.bursts.current_count(now),
            ..ErrorStats::default()
        };

        for record in &state.records {
            if !record.resolved {
                stats.unresolved += 1;
            }
            let age = record.age_ms(now);
            if age < DAY_MS {
                stats.last_24h.add(record);
            }
            if age < 7 * DAY_MS {
                stats.last_7d.add(record);
            }
        }

        stats
    }

    /// CRITICAL records inside the burst window.
    pub fn critical_burst_count(&self) -> usize {
        let now = self.clock.now_ms();
        self.state.lock().bursts.current_count(now)
    }

    /// Whether an aggregate burst alert covers the current window.
    ///
    /// While this holds, individual CRITICAL records are left to the burst alert.
    pub fn burst_active(&self) -> bool {
        let now = self.clock.now_ms();
        self.state.lock().bursts.is_active(now)
    }

    /// Receive aggregate alerts for critical bursts.
    pub fn subscribe_bursts(&self) -> broadcast::Receiver<BurstAlert> {
        self.bursts_tx.subscribe()
    }

    /// Drop every record and all throttle and burst state.
    pub async fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.records.clear();
            state.throttle.reset();
            state.bursts.reset();
        }
        self.persist().await;
    }

    /// Apply retention and capacity limits. Returns the number dropped.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let dropped = enforce_limits(&mut self.state.lock().records, now, &self.config);
        if dropped > 0 {
            tracing::debug!("Retention sweep dropped {} error records", dropped);
            self.persist().await;
        }
        dropped
    }

    /// Write the current collection. Failures are logged, never returned.
    pub async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;

        let payload = {
            let now = self.clock.now_ms();
            let mut state = self.state.lock();
            enforce_limits(&mut state.records, now, &self.config);
            serde_json::to_string(&state.records)
        };

        match payload {
            Ok(payload) => {
                if let Err(e) = self.backend.set(ERROR_LOGS_KEY, payload).await {
                    tracing::warn!("Failed to persist error log: {}", e);
                }
            },
            Err(e) => tracing::warn!("Failed to serialize error log: {}", e),
        }
    }

    fn mutate<F: FnOnce(&mut ErrorRecord)>(&self, id: &str, f: F) -> bool {
        let mut state = self.state.lock();
        match state.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                f(record);
                true
            },
            None => false,
        }
    }
}

/// Drop expired records, then trim to capacity keeping recent HIGH/CRITICAL
/// records ahead of lower severities. `records` must be newest first.
pub(crate) fn enforce_limits(records: &mut Vec<ErrorRecord>, now: i64, config: &ErrorStoreConfig) -> usize {
    let before = records.len();
    let retention_ms = duration_ms(config.retention);
    let priority_ms = duration_ms(config.priority_retention);

    records.retain(|r| r.age_ms(now) < retention_ms);

    if records.len() > config.max_records {
        let is_protected = |r: &ErrorRecord| r.severity.is_priority() && r.age_ms(now) < priority_ms;
        let protected = records.iter().filter(|r| is_protected(r)).count();
        let mut protected_budget = protected.min(config.max_records);
        let mut other_budget = config.max_records - protected_budget;

        records.retain(|r| {
            let budget = if is_protected(r) {
                &mut protected_budget
            } else {
                &mut other_budget
            };
            if *budget > 0 {
                *budget -= 1;
                true
            } else {
                false
            }
        });
    }

    before - records.len()
}

fn log_record(record: &ErrorRecord) {
    let kind = record.kind.as_str();
    match record.severity {
        Severity::Low => tracing::debug!(kind, id = %record.id, "{}", record.message),
        Severity::Medium => tracing::info!(kind, id = %record.id, "{}", record.message),
        Severity::High => tracing::warn!(kind, id = %record.id, "{}", record.message),
        Severity::Critical => tracing::error!(kind, id = %record.id, "{}", record.message),
    }
}
