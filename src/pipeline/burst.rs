//! Critical burst detection.
//!
//! Keeps the CRITICAL records seen in the rolling window and fires one
//! aggregate alert when the count reaches the threshold. The detector stays
//! latched until the window drops back below the threshold.

use crate::core::clock::duration_ms;
use crate::core::config::BurstConfig;
use crate::core::ErrorRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Aggregate alert for repeated CRITICAL records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstAlert {
    /// CRITICAL records in the window when the alert fired.
    pub count: usize,
    /// Window length in milliseconds.
    pub window_ms: i64,
    /// Oldest contributing record timestamp.
    pub first_at: i64,
    /// Newest contributing record timestamp.
    pub last_at: i64,
    /// Contributing records, oldest first.
    pub records: Vec<BurstEntry>,
}

/// One contributing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstEntry {
    pub id: String,
    pub timestamp: i64,
    pub message: String,
}

/// Rolling-window CRITICAL counter.
#[derive(Debug)]
pub struct CriticalBurstDetector {
    window_ms: i64,
    threshold: usize,
    entries: VecDeque<BurstEntry>,
    latched: bool,
}

impl CriticalBurstDetector {
    /// Create a detector from config.
    pub fn new(config: &BurstConfig) -> Self {
        Self {
            window_ms: duration_ms(config.window),
            threshold: config.threshold,
            entries: VecDeque::new(),
            latched: false,
        }
    }

    /// Observe an accepted CRITICAL record. Returns an alert on the rising edge.
    pub fn observe(&mut self, record: &ErrorRecord, now: i64) -> Option<BurstAlert> {
        self.expire(now);

        self.entries.push_back(BurstEntry {
            id: record.id.clone(),
            timestamp: record.timestamp,
            message: record.message.clone(),
        });

        if self.entries.len() < self.threshold || self.latched {
            return None;
        }

        self.latched = true;
        let first_at = self.entries.front().map_or(now, |e| e.timestamp);
        let last_at = self.entries.back().map_or(now, |e| e.timestamp);
        Some(BurstAlert {
            count: self.entries.len(),
            window_ms: self.window_ms,
            first_at,
            last_at,
            records: self.entries.iter().cloned().collect(),
        })
    }

    /// Rebuild the window from already persisted CRITICAL records, oldest first.
    ///
    /// Never fires. A replayed window that already meets the threshold comes
    /// back latched so the burst is not announced twice.
    pub fn replay<'a, I>(&mut self, records: I, now: i64)
    where
        I: IntoIterator<Item = &'a ErrorRecord>,
    {
        self.reset();
        for record in records {
            if now.saturating_sub(record.timestamp) < self.window_ms {
                self.entries.push_back(BurstEntry {
                    id: record.id.clone(),
                    timestamp: record.timestamp,
                    message: record.message.clone(),
                });
            }
        }
        self.latched = self.entries.len() >= self.threshold;
    }

    /// Whether a burst alert is outstanding for the current window.
    pub fn is_active(&mut self, now: i64) -> bool {
        self.expire(now);
        self.latched
    }

    /// CRITICAL records currently inside the window.
    pub fn current_count(&mut self, now: i64) -> usize {
        self.expire(now);
        self.entries.len()
    }

    /// Whether an alert has fired for the current accumulation.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Forget all state.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.latched = false;
    }

    fn expire(&mut self, now: i64) {
        while self
            .entries
            .front()
            .is_some_and(|e| now.saturating_sub(e.timestamp) >= self.window_ms)
        {
            self.entries.pop_front();
        }
        if self.entries.len() < self.threshold {
            self.latched = false;
        }
    }
}
