//! Maps a raw failure to an `(ErrorKind, Severity)` pair.

use crate::core::{ErrorKind, Failure, RemoteCode, Severity};

/// Substrings that mark a failure as connectivity related.
const NETWORK_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "offline",
    "abort",
    "econnreset",
    "econnrefused",
    "socket hang up",
];

/// Substrings that mark a failure as a validation complaint.
const VALIDATION_MARKERS: &[&str] = &["validation", "invalid", "is required", "must be"];

/// Read-path conditions that are reported as an empty result, not a failure.
const BENIGN_READ_MARKERS: &[&str] = &["reading 'token'", "client is offline"];

/// Result of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: Severity,
}

/// Classify a failure.
///
/// Remote codes take precedence over message heuristics. `severity_hint`
/// only applies to failures that fall through to `Runtime`.
pub fn classify(failure: &Failure, severity_hint: Option<Severity>) -> Classification {
    if let Some(code) = failure.code() {
        return Classification {
            kind: kind_for_code(code),
            severity: severity_for_code(code),
        };
    }

    let text = failure.text().to_lowercase();
    if contains_any(&text, NETWORK_MARKERS) {
        return Classification {
            kind: ErrorKind::Network,
            severity: Severity::Medium,
        };
    }
    if contains_any(&text, VALIDATION_MARKERS) {
        return Classification {
            kind: ErrorKind::Validation,
            severity: Severity::Low,
        };
    }

    Classification {
        kind: ErrorKind::Runtime,
        severity: severity_hint.unwrap_or(Severity::Medium),
    }
}

/// Severity assigned to a remote-service code.
pub fn severity_for_code(code: &RemoteCode) -> Severity {
    match code {
        RemoteCode::PermissionDenied | RemoteCode::Unauthenticated | RemoteCode::DataLoss => {
            Severity::Critical
        },
        RemoteCode::Unavailable | RemoteCode::DeadlineExceeded | RemoteCode::ResourceExhausted => {
            Severity::High
        },
        RemoteCode::NotFound | RemoteCode::AlreadyExists | RemoteCode::FailedPrecondition => {
            Severity::Medium
        },
        RemoteCode::Other(_) => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Kind assigned to a remote-service code.
pub fn kind_for_code(code: &RemoteCode) -> ErrorKind {
    match code {
        RemoteCode::PermissionDenied | RemoteCode::Unauthenticated => ErrorKind::Auth,
        _ => ErrorKind::RemoteService,
    }
}

/// Whether a read-path failure should become an empty result.
pub fn is_benign_read_failure(failure: &Failure) -> bool {
    let text = failure.text().to_lowercase();
    contains_any(&text, BENIGN_READ_MARKERS)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_code_severity() {
        let cases = [
            ("permission-denied", ErrorKind::Auth, Severity::Critical),
            ("unauthenticated", ErrorKind::Auth, Severity::Critical),
            ("data-loss", ErrorKind::RemoteService, Severity::Critical),
            ("unavailable", ErrorKind::RemoteService, Severity::High),
            ("deadline-exceeded", ErrorKind::RemoteService, Severity::High),
            ("resource-exhausted", ErrorKind::RemoteService, Severity::High),
            ("not-found", ErrorKind::RemoteService, Severity::Medium),
            ("already-exists", ErrorKind::RemoteService, Severity::Medium),
            ("failed-precondition", ErrorKind::RemoteService, Severity::Medium),
            ("cancelled", ErrorKind::RemoteService, Severity::Low),
            ("internal", ErrorKind::RemoteService, Severity::Low),
            ("something-new", ErrorKind::RemoteService, Severity::Medium),
        ];

        for (code, kind, severity) in cases {
            let result = classify(&Failure::remote(code, "boom"), None);
            assert_eq!(result, Classification { kind, severity }, "code {}", code);
        }
    }

    #[test]
    fn test_code_wins_over_message() {
        let result = classify(&Failure::remote("not-found", "network glitch"), None);
        assert_eq!(result.kind, ErrorKind::RemoteService);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn test_network_heuristics() {
        for msg in ["Network request failed", "Request timeout", "AbortError: aborted", "device offline"] {
            let result = classify(&Failure::message(msg), Some(Severity::Critical));
            assert_eq!(result.kind, ErrorKind::Network, "{}", msg);
            assert_eq!(result.severity, Severity::Medium);
        }
    }

    #[test]
    fn test_validation_heuristics() {
        let result = classify(&Failure::exception("Error", "Invalid email address"), None);
        assert_eq!(result.kind, ErrorKind::Validation);
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn test_runtime_fallback() {
        let failure = Failure::exception("TypeError", "cannot read property of undefined");
        assert_eq!(classify(&failure, None).severity, Severity::Medium);
        assert_eq!(classify(&failure, Some(Severity::High)).severity, Severity::High);
        assert_eq!(classify(&failure, None).kind, ErrorKind::Runtime);
    }

    #[test]
    fn test_benign_read_failures() {
        assert!(is_benign_read_failure(&Failure::message(
            "Cannot read properties of undefined (reading 'token')"
        )));
        assert!(is_benign_read_failure(&Failure::remote(
            "unavailable",
            "Failed to get document because the client is offline."
        )));
        assert!(!is_benign_read_failure(&Failure::message("disk full")));
    }
}
