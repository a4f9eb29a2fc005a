// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Rolling per-agent anomaly detection.
//!
//! Feeds only the observability surface: an anomalous signal is still
//! recorded into the EMA like any other. Anomaly detection never influences
//! the composite score directly.

use alloc::collections::VecDeque;
use serde::{Deserialize, Serialize};

/// Default window size in signal count.
pub const DEFAULT_WINDOW: usize = 1000;

/// A rolling mean/stddev baseline over an agent's recent signal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyBaseline {
    window: VecDeque<f64>,
    capacity: usize,
    pub anomaly_count: u32,
}

impl AnomalyBaseline {
    pub fn new(capacity: usize) -> Self {
        Self { window: VecDeque::with_capacity(capacity.min(64)), capacity, anomaly_count: 0 }
    }

    fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    fn stddev(&self, mean: f64) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }
        let variance =
            self.window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.window.len() as f64;
        variance.sqrt()
    }

    /// Classify `value` against the baseline accumulated *before* this
    /// call, then fold it into the window. Returns whether `value` was
    /// anomalous (> 2σ from the prior mean). Baselines with fewer than two
    /// prior samples never flag an anomaly — there is no spread yet.
    pub fn record(&mut self, value: f64) -> bool {
        let mean = self.mean();
        let stddev = self.stddev(mean);
        let anomalous = self.window.len() >= 2 && stddev > 0.0 && (value - mean).abs() > 2.0 * stddev;
        if anomalous {
            self.anomaly_count += 1;
        }

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);

        anomalous
    }
}

impl Default for AnomalyBaseline {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_signals_are_never_anomalous() {
        let mut baseline = AnomalyBaseline::new(100);
        for _ in 0..20 {
            assert!(!baseline.record(50.0));
        }
    }

    #[test]
    fn a_sharp_outlier_is_flagged() {
        let mut baseline = AnomalyBaseline::new(100);
        for _ in 0..20 {
            baseline.record(50.0);
        }
        assert!(baseline.record(-500.0));
        assert_eq!(baseline.anomaly_count, 1);
    }

    #[test]
    fn window_evicts_oldest_once_full() {
        let mut baseline = AnomalyBaseline::new(5);
        for i in 0..10 {
            baseline.record(i as f64);
        }
        assert_eq!(baseline.window.len(), 5);
    }
}
