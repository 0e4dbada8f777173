//! Interruptive UI surface used by the presenter.

/// What an action does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRole {
    /// Close the dialog.
    Cancel,
    /// Close the dialog and acknowledge the message.
    Acknowledge,
    /// Run the retry callback.
    Retry,
}

/// One button on a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertAction {
    pub label: String,
    pub role: ActionRole,
}

impl AlertAction {
    /// Create an action.
    pub fn new<S: Into<String>>(label: S, role: ActionRole) -> Self {
        Self {
            label: label.into(),
            role,
        }
    }
}

/// A modal dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDialog {
    pub title: String,
    pub message: String,
    pub actions: Vec<AlertAction>,
}

/// Platform dialog primitive.
#[async_trait::async_trait]
pub trait AlertSurface: Send + Sync {
    /// Show a dialog. Resolves to the index of the pressed action, or
    /// `None` if it was dismissed without pressing one.
    async fn show(&self, dialog: AlertDialog) -> Option<usize>;
}

/// Surface for headless hosts: logs the dialog and dismisses it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSurface;

#[async_trait::async_trait]
impl AlertSurface for LogSurface {
    async fn show(&self, dialog: AlertDialog) -> Option<usize> {
        tracing::info!(title = %dialog.title, "Alert: {}", dialog.message);
        None
    }
}
