//! Retry executor for remote operations.
//!
//! Attempts are strictly sequential. Between attempts the executor sleeps for
//! `min(base * 2^attempt + jitter, max_delay)`. Before each attempt a
//! disconnected client is reconnected through the [`ConnectivityProbe`].
//! Terminal failures are logged to the [`ErrorStore`] and returned unchanged.

use crate::core::collaborators::ConnectivityProbe;
use crate::core::config::RetryConfig;
use crate::core::{Context, Failure, RemoteCode};
use crate::pipeline::{is_benign_read_failure, ErrorReport, ErrorStore};
use futures::FutureExt;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Whether the wrapped operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    /// Offline and installation-token failures become an empty result.
    Read,
    /// Every terminal failure is returned to the caller.
    #[default]
    Write,
}

/// Per-call retry options
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay, doubled on each attempt
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter
    pub max_jitter: Duration,
    /// Read or write semantics
    pub mode: OperationMode,
    /// Extra context attached to the terminal error record
    pub context: Option<Context>,
    /// Log the terminal failure to the error store
    pub report: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            max_jitter: config.max_jitter,
            mode: OperationMode::Write,
            context: None,
            report: true,
        }
    }
}

impl RetryOptions {
    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Use read semantics
    pub fn read(mut self) -> Self {
        self.mode = OperationMode::Read;
        self
    }

    /// Leave the terminal failure for the caller to log
    pub fn unreported(mut self) -> Self {
        self.report = false;
        self
    }

    /// Add a context entry for the terminal error record
    pub fn context<K: Into<String>, V: Into<serde_json::Value>>(mut self, key: K, value: V) -> Self {
        self.context
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Retry bookkeeping for one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub operation_key: String,
    pub attempts_made: u32,
    pub next_delay_ms: u64,
}

impl RetryState {
    fn new(operation_key: &str) -> Self {
        Self {
            operation_key: operation_key.to_string(),
            attempts_made: 0,
            next_delay_ms: 0,
        }
    }
}

/// Retry policy for determining if a failure is retryable
pub trait RetryPolicy: Send + Sync {
    /// Check if the failure should trigger a retry
    fn should_retry(&self, failure: &Failure) -> bool;
}

/// Retries everything except a fixed set of permanent remote codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, failure: &Failure) -> bool {
        !matches!(
            failure.code(),
            Some(
                RemoteCode::PermissionDenied
                    | RemoteCode::Unauthenticated
                    | RemoteCode::NotFound
                    | RemoteCode::AlreadyExists
                    | RemoteCode::InvalidArgument
            )
        )
    }
}

/// Deterministic part of the delay: `min(base * 2^attempt, max)`.
pub fn base_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Full delay for `attempt` with the given jitter: `min(base * 2^attempt + jitter, max)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: Duration) -> Duration {
    base_backoff(attempt, base, max)
        .saturating_add(jitter)
        .min(max)
}

fn random_jitter(max_jitter: Duration) -> Duration {
    let bound = u64::try_from(max_jitter.as_millis()).unwrap_or(u64::MAX);
    if bound == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..bound))
}

/// Wraps remote operations with backoff, reconnection and error logging.
pub struct RetryExecutor {
    defaults: RetryConfig,
    errors: Arc<ErrorStore>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    policy: Arc<dyn RetryPolicy>,
}

impl RetryExecutor {
    /// Create an executor that logs terminal failures to `errors`.
    pub fn new(defaults: RetryConfig, errors: Arc<ErrorStore>) -> Self {
        Self {
            defaults,
            errors,
            probe: None,
            policy: Arc::new(DefaultRetryPolicy),
        }
    }

    /// Check connectivity before each attempt.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Replace the retryability predicate.
    pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Options built from the configured defaults.
    pub fn options(&self) -> RetryOptions {
        RetryOptions::from(&self.defaults)
    }

    /// Run a write-style operation. The terminal failure is always returned.
    pub async fn run<F, Fut, T>(
        &self,
        operation_key: &str,
        options: RetryOptions,
        operation: F,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let options = RetryOptions {
            mode: OperationMode::Write,
            ..options
        };
        self.execute(operation_key, options, operation, None).await
    }

    /// Run a read-style operation. Offline and token-read failures yield `Ok(None)`.
    pub async fn run_read<F, Fut, T>(
        &self,
        operation_key: &str,
        options: RetryOptions,
        mut operation: F,
    ) -> Result<Option<T>, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let read = move || operation().map(|result| result.map(Some));
        self.execute(operation_key, options.read(), read, Some(None)).await
    }

    /// `empty` is the value handed back for a benign read failure; writes pass `None`.
    async fn execute<F, Fut, T>(
        &self,
        operation_key: &str,
        options: RetryOptions,
        mut operation: F,
        mut empty: Option<T>,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut state = RetryState::new(operation_key);

        loop {
            self.ensure_connected(operation_key).await;

            let failure = match operation().await {
                Ok(value) => {
                    if state.attempts_made > 0 {
                        tracing::info!(
                            operation = operation_key,
                            attempts = state.attempts_made + 1,
                            "Operation recovered after retry"
                        );
                    }
                    return Ok(value);
                },
                Err(failure) => failure,
            };

            state.attempts_made += 1;

            if options.mode == OperationMode::Read && is_benign_read_failure(&failure) {
                if let Some(value) = empty.take() {
                    tracing::debug!(
                        operation = operation_key,
                        "Treating read failure as empty result: {}",
                        failure
                    );
                    return Ok(value);
                }
            }

            if !self.policy.should_retry(&failure) || state.attempts_made > options.max_retries {
                tracing::error!(
                    operation = operation_key,
                    attempts = state.attempts_made,
                    "Operation failed: {}",
                    failure
                );
                if options.report {
                    self.report(&state, &options, &failure).await;
                }
                return Err(failure);
            }

            let delay = backoff_delay(
                state.attempts_made - 1,
                options.base_delay,
                options.max_delay,
                random_jitter(options.max_jitter),
            );
            state.next_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

            tracing::warn!(
                operation = operation_key,
                attempt = state.attempts_made,
                delay_ms = state.next_delay_ms,
                "Attempt failed: {}. Retrying...",
                failure
            );

            sleep(delay).await;
        }
    }

    async fn ensure_connected(&self, operation_key: &str) {
        let Some(probe) = &self.probe else {
            return;
        };
        if probe.is_connected() {
            return;
        }

        tracing::info!(operation = operation_key, "Client disconnected, reconnecting");
        if let Err(e) = probe.reconnect().await {
            tracing::warn!(operation = operation_key, "Reconnect failed: {}", e);
        }
    }

    async fn report(&self, state: &RetryState, options: &RetryOptions, failure: &Failure) {
        let mut report = ErrorReport::new(failure.clone())
            .context("operation", state.operation_key.as_str())
            .context("attempts", state.attempts_made);
        if let Some(context) = &options.context {
            report = report.with_context(context.clone());
        }
        self.errors.record(report).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::Config;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn executor() -> (RetryExecutor, Arc<ErrorStore>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let errors = Arc::new(ErrorStore::new(
            &Config::default(),
            Arc::new(MemoryStore::new()),
            clock,
        ));
        (RetryExecutor::new(RetryConfig::default(), Arc::clone(&errors)), errors)
    }

    #[test]
    fn test_backoff_schedule() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_millis(10_000);

        assert_eq!(base_backoff(0, base, max), Duration::from_millis(1000));
        assert_eq!(base_backoff(1, base, max), Duration::from_millis(2000));
        assert_eq!(base_backoff(2, base, max), Duration::from_millis(4000));
        assert_eq!(base_backoff(3, base, max), Duration::from_millis(8000));
        assert_eq!(base_backoff(4, base, max), max);
        assert_eq!(base_backoff(64, base, max), max);
    }

    #[test]
    fn test_backoff_is_bounded_and_monotonic() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_millis(10_000);
        let mean_jitter = Duration::from_millis(500);

        for n in 0..40 {
            let current = backoff_delay(n, base, max, mean_jitter);
            let next = backoff_delay(n + 1, base, max, mean_jitter);
            assert!(current <= next, "attempt {}", n);
            assert!(backoff_delay(n, base, max, Duration::from_millis(999)) <= max);
        }
    }

    #[test]
    fn test_jitter_range() {
        for _ in 0..100 {
            assert!(random_jitter(Duration::from_millis(1000)) < Duration::from_millis(1000));
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_default_policy() {
        let policy = DefaultRetryPolicy;
        for code in ["permission-denied", "unauthenticated", "not-found", "already-exists", "invalid-argument"] {
            assert!(!policy.should_retry(&Failure::remote(code, "x")), "{}", code);
        }
        for code in ["unavailable", "deadline-exceeded", "resource-exhausted", "aborted", "internal", "failed-precondition"] {
            assert!(policy.should_retry(&Failure::remote(code, "x")), "{}", code);
        }
        assert!(policy.should_retry(&Failure::message("Network request failed")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success() {
        let (executor, errors) = executor();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result = executor
            .run("profile.save", RetryOptions::default(), move || {
                let counter = Arc::clone(&counter);
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(Failure::remote("unavailable", "temporary failure"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let (executor, errors) = executor();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let started = tokio::time::Instant::now();

        let result: Result<(), Failure> = executor
            .run("profile.save", RetryOptions::default(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::remote("permission-denied", "denied")) }
            })
            .await;

        assert_eq!(result, Err(Failure::remote("permission-denied", "denied")));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let (executor, errors) = executor();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), Failure> = executor
            .run("feed.load", RetryOptions::default().max_retries(3), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::remote("unavailable", "service down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        let record = &errors.records()[0];
        assert_eq!(record.context_value("operation"), Some(&serde_json::json!("feed.load")));
        assert_eq!(record.context_value("attempts"), Some(&serde_json::json!(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_offline_returns_none() {
        let (executor, errors) = executor();

        let result: Result<Option<u32>, Failure> = executor
            .run_read("profile.get", RetryOptions::default(), || async {
                Err(Failure::message("Failed to get document because the client is offline."))
            })
            .await;

        assert_eq!(result, Ok(None));
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_wraps_value_and_returns_real_failures() {
        let (executor, errors) = executor();

        let found = executor
            .run_read("profile.get", RetryOptions::default(), || async { Ok(7) })
            .await;
        assert_eq!(found, Ok(Some(7)));

        let denied: Result<Option<u32>, Failure> = executor
            .run_read("profile.get", RetryOptions::default(), || async {
                Err(Failure::remote("permission-denied", "denied"))
            })
            .await;
        assert_eq!(denied, Err(Failure::remote("permission-denied", "denied")));
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreported_failure_is_left_to_caller() {
        let (executor, errors) = executor();

        let result: Result<(), Failure> = executor
            .run("alert.retry", RetryOptions::default().max_retries(0).unreported(), || async {
                Err(Failure::remote("unavailable", "down"))
            })
            .await;

        assert!(result.is_err());
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_offline_is_returned() {
        let (executor, _) = executor();

        let result: Result<(), Failure> = executor
            .run("profile.save", RetryOptions::default().max_retries(1), || async {
                Err(Failure::message("Failed to write because the client is offline."))
            })
            .await;

        assert!(result.is_err());
    }

    struct FlakyProbe {
        connected: AtomicBool,
        reconnects: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ConnectivityProbe for FlakyProbe {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn reconnect(&self) -> Result<(), Failure> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_before_attempt() {
        let (executor, _) = executor();
        let probe = Arc::new(FlakyProbe {
            connected: AtomicBool::new(false),
            reconnects: AtomicU32::new(0),
        });
        let executor = executor.with_probe(Arc::clone(&probe) as Arc<dyn ConnectivityProbe>);

        let result = executor
            .run("ping", RetryOptions::default(), || async { Ok("pong") })
            .await;

        assert_eq!(result, Ok("pong"));
        assert_eq!(probe.reconnects.load(Ordering::SeqCst), 1);
    }
}
