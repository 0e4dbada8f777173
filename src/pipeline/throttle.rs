//! Duplicate and burst suppression keyed by error signature.
//!
//! Two independent rules apply to each signature:
//! - a repeat within `duplicate_window` of the last accepted occurrence is dropped;
//! - once `burst_limit` accepted occurrences fall inside the sliding
//!   `burst_window`, further occurrences are dropped until the window rolls on.

use crate::core::clock::duration_ms;
use crate::core::config::ThrottleConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, VecDeque};

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("valid digit regex"));

/// Placeholder substituted for each run of digits.
pub const DIGIT_PLACEHOLDER: &str = "#";

/// Normalize a message into a grouping signature.
pub fn normalize(message: &str, max_len: usize) -> String {
    let lowered = message.to_lowercase();
    let collapsed = DIGIT_RUNS.replace_all(&lowered, DIGIT_PLACEHOLDER);
    collapsed.chars().take(max_len).collect()
}

/// Recent occurrences of one signature.
#[derive(Debug, Clone, Default)]
pub struct ThrottleWindow {
    /// Accepted occurrence instants inside the burst window, oldest first.
    pub occurrences: VecDeque<i64>,
    /// Instant of the last accepted occurrence.
    pub last_seen: i64,
}

/// Why an occurrence was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    Duplicate,
    Burst,
}

/// Per-signature throttle state.
#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    windows: HashMap<String, ThrottleWindow>,
}

impl Throttle {
    /// Create an empty throttle.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// Normalize with the configured signature length.
    pub fn signature(&self, message: &str) -> String {
        normalize(message, self.config.signature_length)
    }

    /// Check a signature at `now`; records the occurrence when allowed.
    pub fn should_suppress(&mut self, signature: &str, now: i64) -> bool {
        self.check(signature, now).is_some()
    }

    /// Like [`Throttle::should_suppress`] but reports which rule fired.
    pub fn check(&mut self, signature: &str, now: i64) -> Option<Suppression> {
        let duplicate_ms = duration_ms(self.config.duplicate_window);
        let burst_ms = duration_ms(self.config.burst_window);

        self.evict_idle(now, duplicate_ms.max(burst_ms));

        if let Some(window) = self.windows.get_mut(signature) {
            while window
                .occurrences
                .front()
                .is_some_and(|&ts| now.saturating_sub(ts) >= burst_ms)
            {
                window.occurrences.pop_front();
            }

            if now.saturating_sub(window.last_seen) < duplicate_ms {
                return Some(Suppression::Duplicate);
            }
            if window.occurrences.len() >= self.config.burst_limit {
                return Some(Suppression::Burst);
            }

            window.last_seen = now;
            window.occurrences.push_back(now);
            return None;
        }

        let mut window = ThrottleWindow {
            occurrences: VecDeque::new(),
            last_seen: now,
        };
        window.occurrences.push_back(now);
        self.windows.insert(signature.to_string(), window);
        None
    }

    /// Number of tracked signatures.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Forget all state.
    pub fn reset(&mut self) {
        self.windows.clear();
    }

    fn evict_idle(&mut self, now: i64, horizon_ms: i64) {
        self.windows
            .retain(|_, window| now.saturating_sub(window.last_seen) < horizon_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn burst_only() -> ThrottleConfig {
        ThrottleConfig {
            duplicate_window: Duration::ZERO,
            ..ThrottleConfig::default()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("User 12345 not FOUND", 100), "user # not found");
        assert_eq!(normalize("retry 1 of 3", 100), "retry # of #");
        assert_eq!(normalize(&"x".repeat(300), 100).len(), 100);
        assert_eq!(normalize("Order 7 failed", 100), normalize("order 99 failed", 100));
    }

    #[test]
    fn test_duplicate_window() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let sig = throttle.signature("boom");

        assert!(!throttle.should_suppress(&sig, 0));
        assert_eq!(throttle.check(&sig, 10_000), Some(Suppression::Duplicate));
        assert_eq!(throttle.check(&sig, 29_999), Some(Suppression::Duplicate));
        assert!(!throttle.should_suppress(&sig, 31_000));
    }

    #[test]
    fn test_burst_window() {
        let mut throttle = Throttle::new(burst_only());

        assert!(!throttle.should_suppress("sig", 0));
        assert!(!throttle.should_suppress("sig", 100));
        assert!(!throttle.should_suppress("sig", 200));
        assert_eq!(throttle.check("sig", 300), Some(Suppression::Burst));
        assert_eq!(throttle.check("sig", 4_999), Some(Suppression::Burst));

        // First occurrence has rolled out of the 5s window.
        assert!(!throttle.should_suppress("sig", 5_000));
        assert_eq!(throttle.check("sig", 5_050), Some(Suppression::Burst));
    }

    #[test]
    fn test_signatures_are_independent() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        assert!(!throttle.should_suppress("a", 0));
        assert!(!throttle.should_suppress("b", 0));
        assert_eq!(throttle.tracked(), 2);
    }

    #[test]
    fn test_idle_signatures_are_evicted() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        assert!(!throttle.should_suppress("a", 0));
        assert!(!throttle.should_suppress("b", 60_000));
        assert_eq!(throttle.tracked(), 1);
    }
}
