// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection transfer statistics.
//!
//! Counters are cumulative; rates are computed over the last
//! [`STATISTICS_WINDOW`] pushes. A stream's counters are kept until its
//! end-of-stream, then folded into the link totals.

use crate::config::STATISTICS_WINDOW;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// Cumulative counters for one stream on one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub elements: u64,
    pub bytes: u64,
    pub pushes: u64,
    pub eos_count: u64,
}

impl StreamCounters {
    fn add(&mut self, other: &StreamCounters) {
        self.elements += other.elements;
        self.bytes += other.bytes;
        self.pushes += other.pushes;
        self.eos_count += other.eos_count;
    }
}

/// Snapshot returned by [`LinkStatistics::retrieve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortStatistics {
    pub elements_per_second: f64,
    pub bits_per_second: f64,
    pub calls_per_second: f64,
    /// Seconds since the most recent push; 0 if there was none.
    pub time_since_last_call: f64,
    /// Streams that have carried data and not yet ended.
    pub stream_ids: Vec<String>,
    pub total_elements: u64,
    pub total_bytes: u64,
    pub pushes: u64,
    pub connection_errors: u64,
}

#[derive(Debug, Clone, Copy)]
struct WindowPoint {
    elements: usize,
    bytes: usize,
    at: Instant,
}

/// Statistics collector owned by one link.
#[derive(Debug, Clone, Default)]
pub struct LinkStatistics {
    window: VecDeque<WindowPoint>,
    streams: BTreeMap<String, StreamCounters>,
    /// Totals of streams that have ended.
    ended: StreamCounters,
    active: Vec<String>,
    last_push: Option<Instant>,
    connection_errors: u64,
}

impl LinkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one push of `elements` elements (`bytes` on the wire).
    pub fn update(&mut self, elements: usize, bytes: usize, eos: bool, stream_id: &str) {
        self.update_at(elements, bytes, eos, stream_id, Instant::now());
    }

    fn update_at(&mut self, elements: usize, bytes: usize, eos: bool, stream_id: &str, at: Instant) {
        if self.window.len() == STATISTICS_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(WindowPoint {
            elements,
            bytes,
            at,
        });
        self.last_push = Some(at);

        let counters = self.streams.entry(stream_id.to_string()).or_default();
        counters.elements += elements as u64;
        counters.bytes += bytes as u64;
        counters.pushes += 1;

        if eos {
            counters.eos_count += 1;
            if let Some(done) = self.streams.remove(stream_id) {
                self.ended.add(&done);
            }
            self.active.retain(|id| id != stream_id);
        } else if !self.active.iter().any(|id| id == stream_id) {
            self.active.push(stream_id.to_string());
        }
    }

    pub fn record_error(&mut self) {
        self.connection_errors += 1;
    }

    pub fn connection_errors(&self) -> u64 {
        self.connection_errors
    }

    /// Counters of a stream that has not ended yet.
    pub fn stream(&self, stream_id: &str) -> Option<StreamCounters> {
        self.streams.get(stream_id).copied()
    }

    /// Totals over every stream that has ended on this link.
    pub fn ended(&self) -> StreamCounters {
        self.ended
    }

    /// Number of streams with live per-stream counters.
    pub fn tracked_streams(&self) -> usize {
        self.streams.len()
    }

    pub fn retrieve(&self) -> PortStatistics {
        self.retrieve_at(Instant::now())
    }

    fn retrieve_at(&self, now: Instant) -> PortStatistics {
        let totals = self.streams.values().fold(self.ended, |mut acc, c| {
            acc.add(c);
            acc
        });

        let mut stats = PortStatistics {
            stream_ids: self.active.clone(),
            total_elements: totals.elements,
            total_bytes: totals.bytes,
            pushes: totals.pushes,
            connection_errors: self.connection_errors,
            time_since_last_call: self
                .last_push
                .map(|at| now.saturating_duration_since(at).as_secs_f64())
                .unwrap_or(0.0),
            ..PortStatistics::default()
        };

        if let Some(first) = self.window.front() {
            let span = now.saturating_duration_since(first.at).max(Duration::from_micros(1));
            let secs = span.as_secs_f64();
            let elements: usize = self.window.iter().map(|p| p.elements).sum();
            let bytes: usize = self.window.iter().map(|p| p.bytes).sum();
            stats.elements_per_second = elements as f64 / secs;
            stats.bits_per_second = (bytes * 8) as f64 / secs;
            stats.calls_per_second = self.window.len() as f64 / secs;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_active_streams() {
        let mut stats = LinkStatistics::new();
        stats.update(100, 400, false, "a");
        stats.update(50, 200, false, "b");
        stats.update(0, 0, true, "a");

        let snapshot = stats.retrieve();
        assert_eq!(snapshot.total_elements, 150);
        assert_eq!(snapshot.total_bytes, 600);
        assert_eq!(snapshot.pushes, 3);
        assert_eq!(snapshot.stream_ids, vec!["b".to_string()]);
        assert_eq!(stats.stream("a"), None);
        assert_eq!(stats.ended().eos_count, 1);
        assert_eq!(stats.ended().elements, 100);
    }

    #[test]
    fn test_ended_streams_are_folded() {
        let mut stats = LinkStatistics::new();
        for i in 0..1_000 {
            let id = format!("burst_{}", i);
            stats.update(8, 32, false, &id);
            stats.update(0, 0, true, &id);
        }
        stats.update(4, 16, false, "live");

        assert_eq!(stats.tracked_streams(), 1);
        let snapshot = stats.retrieve();
        assert_eq!(snapshot.total_elements, 8_004);
        assert_eq!(snapshot.pushes, 2_001);
        assert_eq!(snapshot.stream_ids, vec!["live".to_string()]);
        assert_eq!(stats.ended().eos_count, 1_000);
    }

    #[test]
    fn test_window_rates() {
        let mut stats = LinkStatistics::new();
        let start = Instant::now();
        for i in 0..20u64 {
            stats.update_at(10, 40, false, "s", start + Duration::from_millis(100 * i));
        }
        // Only the last 10 pushes count: 100 elements over 0.9 s + 0.1 s.
        let snapshot = stats.retrieve_at(start + Duration::from_millis(2000));
        assert!((snapshot.elements_per_second - 100.0).abs() < 1e-6);
        assert!((snapshot.bits_per_second - 3200.0).abs() < 1e-6);
        assert!((snapshot.calls_per_second - 10.0).abs() < 1e-6);
        assert!((snapshot.time_since_last_call - 0.1).abs() < 1e-6);
        assert_eq!(snapshot.total_elements, 200);
    }

    #[test]
    fn test_errors() {
        let mut stats = LinkStatistics::new();
        stats.record_error();
        stats.record_error();
        assert_eq!(stats.retrieve().connection_errors, 2);
        assert_eq!(stats.retrieve().elements_per_second, 0.0);
    }
}
