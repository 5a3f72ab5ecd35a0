//! Counters describing image preload behaviour.
//!
//! The preloader records every attempt, completion and failure here. Hosts can surface the
//! snapshot in a debug overlay or log it when a session closes.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

const SAMPLE_CAPACITY: usize = 120;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
}

impl SampleWindow {
    fn push(&mut self, value: f32) {
        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        sorted.get(rank.round() as usize).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    attempts: u64,
    retries: u64,
    loaded: u64,
    failed: u64,
    bytes: u64,
    in_flight: usize,
    latency_ms: SampleWindow,
}

/// Thread-safe preload counters shared between the preloader and its tasks.
#[derive(Debug, Default)]
pub struct PreloadStats {
    inner: parking_lot::Mutex<Counters>,
}

impl PreloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.inner.lock().in_flight += 1;
    }

    /// Record one network attempt; attempts after the first count as retries.
    pub fn record_attempt(&self, attempt: u32) {
        let mut guard = self.inner.lock();
        guard.attempts = guard.attempts.saturating_add(1);
        if attempt > 1 {
            guard.retries = guard.retries.saturating_add(1);
        }
    }

    pub fn record_loaded(&self, elapsed: Duration, bytes: u64) {
        let mut guard = self.inner.lock();
        guard.loaded = guard.loaded.saturating_add(1);
        guard.bytes = guard.bytes.saturating_add(bytes);
        guard.in_flight = guard.in_flight.saturating_sub(1);
        guard.latency_ms.push(elapsed.as_secs_f64() as f32 * 1_000.0);
    }

    pub fn record_failed(&self) {
        let mut guard = self.inner.lock();
        guard.failed = guard.failed.saturating_add(1);
        guard.in_flight = guard.in_flight.saturating_sub(1);
    }

    /// Forget in-flight work that was abandoned by a chapter change.
    pub fn record_abandoned(&self, count: usize) {
        let mut guard = self.inner.lock();
        guard.in_flight = guard.in_flight.saturating_sub(count);
    }

    pub fn snapshot(&self) -> PreloadSnapshot {
        let guard = self.inner.lock();
        PreloadSnapshot {
            attempts: guard.attempts,
            retries: guard.retries,
            loaded: guard.loaded,
            failed: guard.failed,
            bytes: guard.bytes,
            in_flight: guard.in_flight,
            latency_ms_p50: guard.latency_ms.percentile(0.50),
            latency_ms_p95: guard.latency_ms.percentile(0.95),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub loaded: u64,
    pub failed: u64,
    pub bytes: u64,
    pub in_flight: usize,
    pub latency_ms_p50: f32,
    pub latency_ms_p95: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_retries_and_in_flight() {
        let stats = PreloadStats::new();
        stats.record_started();
        stats.record_started();
        stats.record_attempt(1);
        stats.record_attempt(2);
        stats.record_loaded(Duration::from_millis(40), 2048);

        let snap = stats.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.in_flight, 1);
        assert_eq!(snap.bytes, 2048);
        assert!(snap.latency_ms_p50 >= 39.0);
    }

    #[test]
    fn abandoned_work_never_underflows() {
        let stats = PreloadStats::new();
        stats.record_started();
        stats.record_abandoned(5);
        stats.record_failed();
        let snap = stats.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.failed, 1);
    }
}
