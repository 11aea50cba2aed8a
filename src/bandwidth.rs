//! Sliding-window bandwidth estimation (component I, `NVRBandwidthMonitor`).
//!
//! A single process-wide instance is expected (§4.9): the download manager owns its
//! lifecycle, and every segment fetch reports a sample into it. The ring buffer holds
//! the most recent 100 samples; the estimate is their median, which is more robust to
//! one-off stalls than a mean would be.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::OnceLock;

const WINDOW: usize = 100;

static GLOBAL: OnceLock<BandwidthMonitor> = OnceLock::new();

/// The process-wide bandwidth monitor (§4.9, §9 "Global state": explicit singleton,
/// lazily initialised, with no teardown beyond process exit since the ring buffer
/// holds no external resources).
pub fn global() -> &'static BandwidthMonitor {
    GLOBAL.get_or_init(BandwidthMonitor::new)
}

/// One (bits-per-second, timestamp-ms) observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSample {
    pub bits_per_second: f64,
    pub timestamp_ms: u64,
}

/// Ring buffer of the last [`WINDOW`] throughput samples, guarded by a spinlock-style
/// mutex per the single-writer/single-reader handoff described in §5 of spec.md.
pub struct BandwidthMonitor {
    samples: Mutex<VecDeque<BandwidthSample>>,
}

impl BandwidthMonitor {
    pub fn new() -> Self {
        BandwidthMonitor { samples: Mutex::new(VecDeque::with_capacity(WINDOW)) }
    }

    /// Records a completed download: `bytes` transferred over `elapsed_ms`.
    /// A zero-duration download (cached response, tiny segment) is ignored rather
    /// than reported as infinite throughput.
    pub fn report(&self, bytes: u64, elapsed_ms: u64, now_ms: u64) {
        if elapsed_ms == 0 {
            return;
        }
        let bits_per_second = (bytes as f64 * 8.0) / (elapsed_ms as f64 / 1000.0);
        let mut samples = self.samples.lock();
        if samples.len() == WINDOW {
            samples.pop_front();
        }
        samples.push_back(BandwidthSample { bits_per_second, timestamp_ms: now_ms });
    }

    /// The instantaneous estimate: the median of the current window, or `None` if no
    /// samples have been recorded yet.
    pub fn estimate_bps(&self) -> Option<f64> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = samples.iter().map(|s| s.bits_per_second).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn reset(&self) {
        self.samples.lock().clear();
    }
}

impl Default for BandwidthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_has_no_estimate() {
        let m = BandwidthMonitor::new();
        assert_eq!(m.estimate_bps(), None);
    }

    #[test]
    fn median_of_three_samples() {
        let m = BandwidthMonitor::new();
        m.report(1_000_000, 1000, 1); // 8 Mbps
        m.report(2_000_000, 1000, 2); // 16 Mbps
        m.report(500_000, 1000, 3);   // 4 Mbps
        assert_eq!(m.estimate_bps(), Some(8_000_000.0));
    }

    #[test]
    fn zero_duration_sample_ignored() {
        let m = BandwidthMonitor::new();
        m.report(1_000_000, 0, 1);
        assert_eq!(m.estimate_bps(), None);
    }

    #[test]
    fn global_returns_the_same_instance() {
        global().report(1_000_000, 1000, 1);
        assert!(global().sample_count() >= 1);
    }

    #[test]
    fn window_evicts_oldest() {
        let m = BandwidthMonitor::new();
        for i in 0..WINDOW {
            m.report(1_000_000, 1000, i as u64);
        }
        assert_eq!(m.sample_count(), WINDOW);
        m.report(10_000_000, 1000, WINDOW as u64);
        assert_eq!(m.sample_count(), WINDOW);
    }
}
