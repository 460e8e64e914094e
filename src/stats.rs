//! Periodic throughput summary

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::aircraft::{AircraftStore, TableCounters};
use crate::decoder::Timestamp;

pub const DEFAULT_STATS_INTERVAL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    /// Feed time of the report
    pub timestamp: Timestamp,
    /// Seconds covered
    pub interval: i64,
    pub messages: u64,
    pub peak_tracks: usize,
    pub new_tracks: u64,
}

impl StatsSummary {
    fn new(timestamp: Timestamp, interval: i64, counters: TableCounters) -> Self {
        Self {
            timestamp,
            interval,
            messages: counters.messages,
            peak_tracks: counters.peak_tracks,
            new_tracks: counters.new_tracks,
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages, {} aircraft peak, {} new aircraft in {} s",
            self.messages, self.peak_tracks, self.new_tracks, self.interval
        )
    }
}

/// Emits a summary every `interval` seconds of feed time and resets the
/// table counters.
pub struct StatsReporter {
    interval: i64,
    next_report: Option<Timestamp>,
}

impl StatsReporter {
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval: interval_secs,
            next_report: None,
        }
    }

    pub fn tick(&mut self, now: Timestamp, store: &mut AircraftStore) -> Option<StatsSummary> {
        let deadline = *self.next_report.get_or_insert(now + self.interval);
        if now < deadline {
            return None;
        }

        let summary = StatsSummary::new(now, self.interval, store.take_counters());
        info!("{}, {} tracked now", summary, store.len());
        self.next_report = Some(now + self.interval);
        Some(summary)
    }
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_INTERVAL_SECS)
    }
}
