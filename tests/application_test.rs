//! End-to-end wiring: file persistence, alert presentation, burst listener.

mod common;

use common::{RecordingTelemetry, START_MS};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use aegis_lib::alert::{AlertDialog, AlertSurface, HandleOptions, PresentOptions, PresentOutcome};
use aegis_lib::core::clock::{Clock, ManualClock};
use aegis_lib::core::collaborators::{IdentityProvider, SessionIdentity, TelemetrySink};
use aegis_lib::core::{ConfigBuilder, Failure, Severity};
use aegis_lib::pipeline::ErrorReport;
use aegis_lib::Application;

/// Presses the last action on every dialog.
#[derive(Default)]
struct PressLast {
    shown: Mutex<Vec<AlertDialog>>,
}

#[async_trait::async_trait]
impl AlertSurface for PressLast {
    async fn show(&self, dialog: AlertDialog) -> Option<usize> {
        let last = dialog.actions.len().checked_sub(1);
        self.shown.lock().push(dialog);
        last
    }
}

#[tokio::test]
async fn test_file_backed_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new().data_dir(dir.path().to_path_buf()).build().unwrap();

    let identity = Arc::new(SessionIdentity::new());
    identity.sign_in("user-42");

    let app = Application::builder()
        .clock(Arc::new(ManualClock::new(START_MS)))
        .identity(Arc::clone(&identity) as Arc<dyn IdentityProvider>)
        .build(config.clone())
        .unwrap();
    app.start().await.unwrap();
    let id = app
        .errors()
        .record_failure(Failure::remote("unavailable", "backend down"))
        .await
        .unwrap();
    app.shutdown().await;

    assert!(dir.path().join("error_logs.json").exists());
    assert!(dir.path().join("performance_metrics.json").exists());

    let restarted = Application::builder()
        .clock(Arc::new(ManualClock::new(START_MS)))
        .build(config)
        .unwrap();
    restarted.start().await.unwrap();

    let record = restarted.errors().get(&id).unwrap();
    assert_eq!(record.user_id.as_deref(), Some("user-42"));
    assert_eq!(record.severity, Severity::High);
    restarted.shutdown().await;
}

#[tokio::test]
async fn test_handle_with_retry_resolves() {
    let surface = Arc::new(PressLast::default());
    let app = Application::builder()
        .backend(Arc::new(aegis_lib::storage::MemoryStore::new()))
        .clock(Arc::new(ManualClock::new(START_MS)))
        .surface(Arc::clone(&surface) as Arc<dyn AlertSurface>)
        .build(ConfigBuilder::new().build().unwrap())
        .unwrap();

    let outcome = app
        .presenter()
        .handle(
            Failure::remote("deadline-exceeded", "slow"),
            HandleOptions {
                show_alert: true,
                present: PresentOptions::with_retry(|| async { Ok(()) }),
                ..HandleOptions::default()
            },
        )
        .await;

    assert_eq!(
        outcome.presented,
        Some(PresentOutcome::Retried {
            resolved: true,
            new_record: None
        })
    );
    let record = app.errors().get(&outcome.record_id.unwrap()).unwrap();
    assert!(record.resolved);
    assert_eq!(record.retry_count, 1);

    let shown = surface.shown.lock();
    assert_eq!(shown[0].message, "The request took too long. Please try again.");
}

#[tokio::test]
async fn test_burst_replaces_individual_critical_dialogs() {
    let surface = Arc::new(PressLast::default());
    let clock = Arc::new(ManualClock::new(START_MS));
    let app = Application::builder()
        .backend(Arc::new(aegis_lib::storage::MemoryStore::new()))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .surface(Arc::clone(&surface) as Arc<dyn AlertSurface>)
        .build(ConfigBuilder::new().build().unwrap())
        .unwrap();

    let mut presented = Vec::new();
    for _ in 0..5 {
        let outcome = app
            .presenter()
            .handle(
                Failure::remote("permission-denied", "Missing or insufficient permissions"),
                HandleOptions {
                    show_alert: true,
                    ..HandleOptions::default()
                },
            )
            .await;
        assert!(outcome.record_id.is_some());
        presented.push(outcome.presented.is_some());
        clock.advance(Duration::from_secs(40));
    }

    assert_eq!(presented, vec![true, true, false, false, false]);
    assert_eq!(surface.shown.lock().len(), 2);
    assert_eq!(app.errors().critical_burst_count(), 5);
    assert!(app.errors().burst_active());
}

#[tokio::test]
async fn test_burst_listener_shows_one_dialog() {
    let surface = Arc::new(PressLast::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let clock = Arc::new(ManualClock::new(START_MS));
    let app = Application::builder()
        .backend(Arc::new(aegis_lib::storage::MemoryStore::new()))
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .surface(Arc::clone(&surface) as Arc<dyn AlertSurface>)
        .telemetry(Arc::clone(&telemetry) as Arc<dyn TelemetrySink>)
        .build(ConfigBuilder::new().build().unwrap())
        .unwrap();
    app.start().await.unwrap();

    for text in ["ledger broken", "vault sealed", "keys missing", "audit failed"] {
        app.errors()
            .record(ErrorReport::new(text).severity(Severity::Critical))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(10));
    }

    // Let the listener task drain the channel.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let shown = surface.shown.lock().clone();
    assert_eq!(shown.len(), 1);
    assert!(shown[0].message.contains("3 critical errors"));
    assert_eq!(telemetry.count("critical_error_burst"), 1);
    app.shutdown().await;
}
