//! Turns error records into user-facing dialogs with an optional retry.

use super::messages::{MessageCatalog, CRITICAL_BURST};
use super::surface::{ActionRole, AlertAction, AlertDialog, AlertSurface};
use crate::core::config::RetryConfig;
use crate::core::retry::RetryExecutor;
use crate::core::{Context, ErrorRecord, Failure, Severity};
use crate::pipeline::{BurstAlert, ErrorReport, ErrorStore};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Callback re-running the failed operation.
pub type RetryCallback = Box<dyn FnMut() -> BoxFuture<'static, Result<(), Failure>> + Send>;

/// Options for [`AlertPresenter::present`].
#[derive(Default)]
pub struct PresentOptions {
    pub enable_retry: bool,
    pub retry: Option<RetryCallback>,
}

impl PresentOptions {
    /// Offer a retry action backed by `callback`.
    pub fn with_retry<F, Fut>(mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        Self {
            enable_retry: true,
            retry: Some(Box::new(move || callback().boxed())),
        }
    }
}

/// Options for [`AlertPresenter::handle`].
#[derive(Default)]
pub struct HandleOptions {
    /// Interrupt the user with a dialog.
    pub show_alert: bool,
    /// Extra context for the error record.
    pub context: Option<Context>,
    /// Dialog options, used only when `show_alert` is set.
    pub present: PresentOptions,
}

/// What happened to a presented dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Closed without action.
    Dismissed,
    /// The user pressed OK.
    Acknowledged,
    /// The retry callback ran.
    Retried {
        /// The callback succeeded and the record was resolved.
        resolved: bool,
        /// Id of the record logged for the failed retry, if any.
        new_record: Option<String>,
    },
}

/// Result of [`AlertPresenter::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleOutcome {
    /// Logged record, `None` if throttled.
    pub record_id: Option<String>,
    /// Dialog outcome, `None` if no dialog was shown.
    pub presented: Option<PresentOutcome>,
}

/// The only component allowed to interrupt the user.
pub struct AlertPresenter {
    surface: Arc<dyn AlertSurface>,
    errors: Arc<ErrorStore>,
    retry: Arc<RetryExecutor>,
    catalog: MessageCatalog,
}

impl AlertPresenter {
    /// Create a presenter over a platform surface.
    pub fn new(surface: Arc<dyn AlertSurface>, errors: Arc<ErrorStore>, catalog: MessageCatalog) -> Self {
        let retry = Arc::new(RetryExecutor::new(RetryConfig::default(), Arc::clone(&errors)));
        Self {
            surface,
            errors,
            retry,
            catalog,
        }
    }

    /// Run user-requested retries through a shared executor.
    pub fn with_executor(mut self, retry: Arc<RetryExecutor>) -> Self {
        self.retry = retry;
        self
    }

    /// Dialog that would be shown for `record`.
    pub fn dialog_for(&self, record: &ErrorRecord, offer_retry: bool) -> AlertDialog {
        let actions = if offer_retry {
            vec![
                AlertAction::new("Cancel", ActionRole::Cancel),
                AlertAction::new("Retry", ActionRole::Retry),
            ]
        } else {
            vec![AlertAction::new("OK", ActionRole::Acknowledge)]
        };

        AlertDialog {
            title: self.catalog.title(record.severity).to_string(),
            message: self.catalog.message_for(record).to_string(),
            actions,
        }
    }

    /// Show a dialog for `record` and run the retry if the user asks for it.
    pub async fn present(&self, record: &ErrorRecord, options: PresentOptions) -> PresentOutcome {
        let retry = options.retry.filter(|_| options.enable_retry);
        let dialog = self.dialog_for(record, retry.is_some());
        let roles: Vec<ActionRole> = dialog.actions.iter().map(|a| a.role).collect();

        let choice = self.surface.show(dialog).await;
        let role = choice.and_then(|index| roles.get(index).copied());

        match (role, retry) {
            (Some(ActionRole::Retry), Some(callback)) => self.retry(record, callback).await,
            (Some(ActionRole::Acknowledge), _) => PresentOutcome::Acknowledged,
            _ => PresentOutcome::Dismissed,
        }
    }

    /// One attempt, after reconnecting if needed. The failure is re-reported here
    /// so it can be linked to the original record.
    async fn retry(&self, record: &ErrorRecord, mut callback: RetryCallback) -> PresentOutcome {
        self.errors.increment_retry(&record.id).await;

        let options = self.retry.options().max_retries(0).unreported();
        match self.retry.run("alert.retry", options, || callback()).await {
            Ok(()) => {
                let resolved = self.errors.resolve(&record.id).await;
                tracing::info!(id = %record.id, "Retry succeeded");
                PresentOutcome::Retried {
                    resolved,
                    new_record: None,
                }
            },
            Err(failure) => {
                tracing::warn!(id = %record.id, "Retry failed: {}", failure);
                let new_record = self
                    .errors
                    .record(ErrorReport::new(failure).context("retry_of", record.id.as_str()))
                    .await;
                PresentOutcome::Retried {
                    resolved: false,
                    new_record,
                }
            },
        }
    }

    /// Show one aggregate dialog for a critical burst.
    pub async fn present_burst(&self, alert: &BurstAlert) -> PresentOutcome {
        let minutes = alert.window_ms / 60_000;
        let message = format!(
            "{} ({} critical errors in the last {} minutes)",
            self.catalog.get(CRITICAL_BURST).unwrap_or("Repeated critical errors."),
            alert.count,
            minutes
        );
        let dialog = AlertDialog {
            title: self.catalog.title(Severity::Critical).to_string(),
            message,
            actions: vec![AlertAction::new("OK", ActionRole::Acknowledge)],
        };

        match self.surface.show(dialog).await {
            Some(_) => PresentOutcome::Acknowledged,
            None => PresentOutcome::Dismissed,
        }
    }

    /// Log a failure and, if requested, show it to the user.
    ///
    /// Throttled failures are never shown. CRITICAL failures inside an active
    /// burst are left to the aggregate burst dialog.
    pub async fn handle(&self, failure: Failure, options: HandleOptions) -> HandleOutcome {
        let mut report = ErrorReport::new(failure);
        if let Some(context) = options.context {
            report = report.with_context(context);
        }
        let record_id = self.errors.record(report).await;

        let record = match (&record_id, options.show_alert) {
            (Some(id), true) => self.errors.get(id),
            _ => None,
        };

        let presented = match record {
            Some(record) if record.severity == Severity::Critical && self.errors.burst_active() => {
                tracing::debug!(id = %record.id, "Critical burst active, skipping individual alert");
                None
            },
            Some(record) => Some(self.present(&record, options.present).await),
            None => None,
        };

        HandleOutcome {
            record_id,
            presented,
        }
    }

    /// Present every critical burst raised by the error store until it closes.
    pub fn spawn_burst_listener(self: Arc<Self>) -> JoinHandle<()> {
        let mut bursts = self.errors.subscribe_bursts();
        tokio::spawn(async move {
            loop {
                match bursts.recv().await {
                    Ok(alert) => {
                        self.present_burst(&alert).await;
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Skipped {} burst alerts", skipped);
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
