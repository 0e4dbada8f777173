//! Boundary traits for collaborators the core consumes but does not own.

use crate::core::Failure;
use parking_lot::RwLock;

/// Connection manager for the remote document service.
#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the client currently believes it is connected.
    fn is_connected(&self) -> bool;

    /// Re-establish the connection.
    async fn reconnect(&self) -> std::result::Result<(), Failure>;
}

/// Fire-and-forget analytics sink.
pub trait TelemetrySink: Send + Sync {
    /// Emit one event. Must not block.
    fn emit(&self, event: &str, properties: serde_json::Value);
}

/// Accessor for the signed-in identity.
pub trait IdentityProvider: Send + Sync {
    /// Current user id, if anyone is signed in.
    fn current_user_id(&self) -> Option<String>;
}

/// Telemetry sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: &str, _properties: serde_json::Value) {}
}

/// Telemetry sink that writes events to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: &str, properties: serde_json::Value) {
        tracing::debug!(target: "aegis::telemetry", event, %properties, "telemetry event");
    }
}

/// Identity holder updated by the host application on sign-in/out.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user_id: RwLock<Option<String>>,
}

impl SessionIdentity {
    /// Create an identity with no signed-in user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sign-in.
    pub fn sign_in<S: Into<String>>(&self, user_id: S) {
        *self.user_id.write() = Some(user_id.into());
    }

    /// Record a sign-out.
    pub fn sign_out(&self) {
        *self.user_id.write() = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }
}
