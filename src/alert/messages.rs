//! User-facing strings for classified errors.

use crate::core::{ErrorKind, ErrorRecord, Severity};
use std::collections::BTreeMap;

/// Key of the generic fallback message.
pub const UNEXPECTED: &str = "unexpected";
/// Key of the aggregate critical-burst message.
pub const CRITICAL_BURST: &str = "critical_burst";

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("permission-denied", "You don't have permission to do that."),
    ("unauthenticated", "Your session has expired. Please sign in again."),
    ("unavailable", "The service is temporarily unavailable. Please try again shortly."),
    ("deadline-exceeded", "The request took too long. Please try again."),
    ("resource-exhausted", "Too many requests right now. Please wait a moment and try again."),
    ("not-found", "We couldn't find what you were looking for."),
    ("already-exists", "This item already exists."),
    ("network", "Please check your internet connection and try again."),
    ("validation", "Some of the information entered isn't valid. Please review it and try again."),
    ("performance", "The app is running slower than usual."),
    (CRITICAL_BURST, "We're seeing repeated problems. Some features may be unavailable for a while."),
    (UNEXPECTED, "An unexpected error occurred. Please try again."),
    ("title.low", "Notice"),
    ("title.medium", "Something went wrong"),
    ("title.high", "Error"),
    ("title.critical", "Critical error"),
];

/// Static message table with optional per-deployment overrides.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    messages: BTreeMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            messages: DEFAULT_MESSAGES
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl MessageCatalog {
    /// Default strings overlaid with `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut catalog = Self::default();
        catalog
            .messages
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        catalog
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    /// Dialog title for a severity.
    pub fn title(&self, severity: Severity) -> &str {
        let key = format!("title.{}", severity.as_str());
        self.get(&key).unwrap_or("Error")
    }

    /// Message for a record: remote code first, then a known signature in
    /// the message, then the record kind, then the generic fallback.
    pub fn message_for(&self, record: &ErrorRecord) -> &str {
        if let Some(text) = record
            .context_value("code")
            .and_then(|code| code.as_str())
            .and_then(|code| self.get(code))
        {
            return text;
        }

        let lowered = record.message.to_lowercase();
        if let Some(text) = self
            .messages
            .iter()
            .filter(|(key, _)| !key.starts_with("title.") && key.as_str() != UNEXPECTED)
            .find(|(key, _)| lowered.contains(key.as_str()))
            .map(|(_, text)| text.as_str())
        {
            return text;
        }

        let kind_key = match record.kind {
            ErrorKind::Network => Some("network"),
            ErrorKind::Validation => Some("validation"),
            ErrorKind::Performance => Some("performance"),
            ErrorKind::Auth => Some("unauthenticated"),
            _ => None,
        };
        kind_key
            .and_then(|key| self.get(key))
            .or_else(|| self.get(UNEXPECTED))
            .unwrap_or("An unexpected error occurred.")
    }
}
