//! Failure shapes raised by wrapped remote operations.
//!
//! A failure is either a bare message, a structured exception with an
//! optional stack trace, or a remote-service error carrying a status code.
//! The classifier and retry policy pattern-match on this type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status codes reported by the remote document service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
    /// A code this crate does not recognise, kept verbatim.
    Other(String),
}

impl RemoteCode {
    /// Parse a code such as `permission-denied` or `firestore/permission-denied`.
    pub fn parse(raw: &str) -> Self {
        let code = raw.rsplit('/').next().unwrap_or(raw).trim().to_ascii_lowercase();
        match code.replace('_', "-").as_str() {
            "cancelled" => Self::Cancelled,
            "unknown" => Self::Unknown,
            "invalid-argument" => Self::InvalidArgument,
            "deadline-exceeded" => Self::DeadlineExceeded,
            "not-found" => Self::NotFound,
            "already-exists" => Self::AlreadyExists,
            "permission-denied" => Self::PermissionDenied,
            "resource-exhausted" => Self::ResourceExhausted,
            "failed-precondition" => Self::FailedPrecondition,
            "aborted" => Self::Aborted,
            "out-of-range" => Self::OutOfRange,
            "unimplemented" => Self::Unimplemented,
            "internal" => Self::Internal,
            "unavailable" => Self::Unavailable,
            "data-loss" => Self::DataLoss,
            "unauthenticated" => Self::Unauthenticated,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Canonical wire form of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid-argument",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::PermissionDenied => "permission-denied",
            Self::ResourceExhausted => "resource-exhausted",
            Self::FailedPrecondition => "failed-precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out-of-range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data-loss",
            Self::Unauthenticated => "unauthenticated",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this is one of the codes the crate knows about.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for RemoteCode {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<RemoteCode> for String {
    fn from(code: RemoteCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for RemoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by an operation wrapped in the resilience core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Failure {
    /// Plain message with no structure.
    Message(String),
    /// Structured exception.
    Exception {
        name: String,
        message: String,
        stack: Option<String>,
    },
    /// Error returned by the remote document service.
    Remote { code: RemoteCode, message: String },
}

impl Failure {
    /// Creates a plain message failure
    pub fn message<S: Into<String>>(msg: S) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a structured exception failure
    pub fn exception<N: Into<String>, S: Into<String>>(name: N, msg: S) -> Self {
        Self::Exception {
            name: name.into(),
            message: msg.into(),
            stack: None,
        }
    }

    /// Creates a remote-service failure from a raw code string
    pub fn remote<C: AsRef<str>, S: Into<String>>(code: C, msg: S) -> Self {
        Self::Remote {
            code: RemoteCode::parse(code.as_ref()),
            message: msg.into(),
        }
    }

    /// Attach a stack trace. No-op for non-exception failures.
    pub fn with_stack<S: Into<String>>(mut self, trace: S) -> Self {
        if let Self::Exception { stack, .. } = &mut self {
            *stack = Some(trace.into());
        }
        self
    }

    /// Human-readable message.
    pub fn text(&self) -> &str {
        match self {
            Self::Message(msg) => msg,
            Self::Exception { message, .. } | Self::Remote { message, .. } => message,
        }
    }

    /// Remote-service code, if any.
    pub fn code(&self) -> Option<&RemoteCode> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Stack trace, present only for structured exceptions.
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Self::Exception { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(msg) => f.write_str(msg),
            Self::Exception { name, message, .. } => write!(f, "{}: {}", name, message),
            Self::Remote { code, message } => write!(f, "[{}] {}", code, message),
        }
    }
}

impl std::error::Error for Failure {}

impl From<&str> for Failure {
    fn from(msg: &str) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

impl From<crate::core::AegisError> for Failure {
    fn from(err: crate::core::AegisError) -> Self {
        Self::exception("AegisError", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_parsing() {
        assert_eq!(RemoteCode::parse("permission-denied"), RemoteCode::PermissionDenied);
        assert_eq!(RemoteCode::parse("firestore/unavailable"), RemoteCode::Unavailable);
        assert_eq!(RemoteCode::parse("DEADLINE_EXCEEDED"), RemoteCode::DeadlineExceeded);
        assert_eq!(RemoteCode::parse("teapot"), RemoteCode::Other("teapot".to_string()));
        assert!(!RemoteCode::parse("teapot").is_recognized());
    }

    #[test]
    fn test_failure_accessors() {
        let failure = Failure::remote("not-found", "doc missing");
        assert_eq!(failure.code(), Some(&RemoteCode::NotFound));
        assert_eq!(failure.text(), "doc missing");
        assert_eq!(failure.to_string(), "[not-found] doc missing");

        let failure = Failure::exception("TypeError", "x is undefined").with_stack("at main");
        assert_eq!(failure.stack_trace(), Some("at main"));
        assert!(failure.code().is_none());
    }

    #[test]
    fn test_failure_serde() {
        let failure = Failure::remote("unavailable", "backend down");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"code\":\"unavailable\""));
        let back: Failure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failure);
    }
}
