//! The explicit, borrowed context threaded through the detector pipeline,
//! replacing the original's mutable global monitor object (spec.md §9).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::DetectorThresholds;
use crate::model::Measurement;
use crate::stats::StatsEngine;

use super::registry::TowerRegistry;

/// Borrowed view over everything a `Detector` may read. The orchestrator
/// pushes the current sample onto `buffer` *before* running detectors, so
/// `buffer.back()` is always the current sample and `previous()` gives the
/// prior one.
pub struct DetectorContext<'a> {
    pub registry: &'a TowerRegistry,
    pub stats: &'a StatsEngine,
    pub buffer: &'a VecDeque<Measurement>,
    pub config: &'a DetectorThresholds,
    pub now: DateTime<Utc>,
}

impl<'a> DetectorContext<'a> {
    /// The sample immediately preceding the current one, if any.
    pub fn previous(&self) -> Option<&Measurement> {
        self.buffer.iter().rev().nth(1)
    }

    /// Last `n` measurements, most-recent last (including the current one).
    pub fn last_n(&self, n: usize) -> Vec<&Measurement> {
        let take = n.min(self.buffer.len());
        self.buffer.iter().rev().take(take).rev().collect()
    }
}

/// Append-only bounded detection buffer (spec.md §3 "detection buffer size:
/// 1000 samples").
pub struct DetectionBuffer {
    capacity: usize,
    samples: VecDeque<Measurement>,
}

impl DetectionBuffer {
    pub fn new(capacity: usize) -> Self {
        DetectionBuffer { capacity, samples: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, measurement: Measurement) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(measurement);
    }

    pub fn as_deque(&self) -> &VecDeque<Measurement> {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
