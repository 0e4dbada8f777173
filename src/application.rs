//! Application wiring for Aegis.
//!
//! Every component is constructed exactly once here and shared as an
//! [`Arc`]; nothing in the crate reaches for a global.

use crate::alert::{AlertPresenter, AlertSurface, LogSurface, MessageCatalog};
use crate::core::clock::{Clock, SystemClock};
use crate::core::collaborators::{ConnectivityProbe, IdentityProvider, TelemetrySink, TracingTelemetry};
use crate::core::retry::RetryExecutor;
use crate::core::{Config, DeviceContext, Result};
use crate::metrics::MetricStore;
use crate::monitoring::Monitor;
use crate::pipeline::ErrorStore;
use crate::storage::{FileStore, KeyValueStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Main application struct that coordinates all components of Aegis.
pub struct Application {
    config: Config,
    clock: Arc<dyn Clock>,
    errors: Arc<ErrorStore>,
    metrics: Arc<MetricStore>,
    retry: Arc<RetryExecutor>,
    presenter: Arc<AlertPresenter>,
    monitor: Arc<Monitor>,
    burst_listener: Mutex<Option<JoinHandle<()>>>,
}

/// Overrides for the collaborators [`Application::new`] would pick.
#[derive(Default)]
pub struct ApplicationBuilder {
    backend: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    surface: Option<Arc<dyn AlertSurface>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl ApplicationBuilder {
    /// Persist through `backend` instead of the file store.
    pub fn backend(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Read time from `clock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Show dialogs on `surface`.
    pub fn surface(mut self, surface: Arc<dyn AlertSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Send analytics events to `telemetry`.
    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Stamp records with the user from `identity`.
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Check connectivity before retried operations.
    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Validate `config` and wire every component.
    pub fn build(self, config: Config) -> Result<Application> {
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(FileStore::new(config.storage.data_dir.clone())));
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(TracingTelemetry));
        let surface = self.surface.unwrap_or_else(|| Arc::new(LogSurface));

        let mut errors = ErrorStore::new(&config, Arc::clone(&backend), Arc::clone(&clock))
            .with_device(device_from(&config))
            .with_telemetry(Arc::clone(&telemetry));
        if let Some(identity) = self.identity {
            errors = errors.with_identity(identity);
        }
        let errors = Arc::new(errors);

        let metrics = Arc::new(
            MetricStore::new(&config, backend, Arc::clone(&clock), Arc::clone(&errors))
                .with_telemetry(telemetry),
        );

        let mut retry = RetryExecutor::new(config.retry.clone(), Arc::clone(&errors));
        if let Some(probe) = self.probe {
            retry = retry.with_probe(probe);
        }
        let retry = Arc::new(retry);

        let presenter = Arc::new(
            AlertPresenter::new(
                surface,
                Arc::clone(&errors),
                MessageCatalog::with_overrides(&config.messages),
            )
            .with_executor(Arc::clone(&retry)),
        );
        let monitor = Arc::new(Monitor::new(
            &config,
            Arc::clone(&errors),
            Arc::clone(&metrics),
            Arc::clone(&clock),
        ));

        Ok(Application {
            config,
            clock,
            errors,
            metrics,
            retry,
            presenter,
            monitor,
            burst_listener: Mutex::new(None),
        })
    }
}

fn device_from(config: &Config) -> DeviceContext {
    let mut device = DeviceContext::detect();
    if let Some(platform) = &config.device.platform {
        device.platform.clone_from(platform);
    }
    if let Some(version) = &config.device.app_version {
        device.app_version.clone_from(version);
    }
    device
}

impl Application {
    /// Create an application persisting to `config.storage.data_dir`.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder().build(config)
    }

    /// Start from the default collaborators and override some of them.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    /// Restore persisted state, then start maintenance and burst alerting.
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Starting Aegis");

        let records = self.errors.load().await?;
        let (samples, alerts) = self.metrics.load().await?;
        tracing::info!(records, samples, alerts, "Restored persisted state");

        self.monitor.start();

        let mut listener = self.burst_listener.lock();
        if listener.is_none() {
            *listener = Some(Arc::clone(&self.presenter).spawn_burst_listener());
        }
        Ok(())
    }

    /// Stop background work and flush both stores.
    pub async fn shutdown(&self) {
        self.monitor.stop();
        if let Some(listener) = self.burst_listener.lock().take() {
            listener.abort();
        }
        self.errors.persist().await;
        self.metrics.persist().await;
        tracing::info!("Aegis stopped");
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get a reference to the error store.
    pub fn errors(&self) -> &Arc<ErrorStore> {
        &self.errors
    }

    /// Get a reference to the metric store.
    pub fn metrics(&self) -> &Arc<MetricStore> {
        &self.metrics
    }

    /// Get a reference to the retry executor.
    pub fn retry(&self) -> &Arc<RetryExecutor> {
        &self.retry
    }

    /// Get a reference to the alert presenter.
    pub fn presenter(&self) -> &Arc<AlertPresenter> {
        &self.presenter
    }

    /// Get a reference to the maintenance monitor.
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }
}
