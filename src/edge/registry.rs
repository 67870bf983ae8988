//! Tower registry (C2): deduplicates towers by `(cell_id, LAC)` and tracks
//! per-tower signal history plus a bounded observation log used for
//! tower-churn features. Owned exclusively by the edge orchestrator
//! (spec.md §3 Ownership); detectors only read it through `DetectorContext`,
//! so a plain `HashMap` is sufficient — no need for the server's `DashMap`
//! concurrency, since the edge loop is single-threaded (spec.md §5).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::error::EdgeError;
use crate::model::{CommonFields, TechTag, Tower, TowerId};

pub struct TowerRegistry {
    towers: HashMap<String, Tower>,
    /// Observation log `(timestamp, tower_id)`, bounded to `buffer_size`
    /// (the detection-buffer capacity from spec.md §3), used for D9's
    /// last-10-distinct-towers rule and the ML feature extractor's
    /// `tower_changes_1h`/`tower_changes_24h`.
    observations: VecDeque<(DateTime<Utc>, TowerId)>,
    buffer_capacity: usize,
}

impl TowerRegistry {
    pub fn new(buffer_capacity: usize) -> Self {
        TowerRegistry {
            towers: HashMap::new(),
            observations: VecDeque::with_capacity(buffer_capacity),
            buffer_capacity,
        }
    }

    /// Inserts or updates the tower implied by `common`, returning the
    /// current `Tower` state after the update. Fails with `InvalidTowerId`
    /// if `cell_id` is empty.
    pub fn observe(&mut self, common: &CommonFields) -> Result<&Tower, EdgeError> {
        if common.tower_id.cell_id.is_empty() {
            return Err(EdgeError::InvalidTowerId);
        }

        let key = common.tower_id.key();
        let now = common.timestamp;
        let entry = self.towers.entry(key.clone()).or_insert_with(|| {
            Tower::new(common.tower_id.clone(), common.technology, None, now)
        });
        entry.observe_signal(common.signal_strength_dbm, now);

        if self.observations.len() >= self.buffer_capacity {
            self.observations.pop_front();
        }
        self.observations.push_back((now, common.tower_id.clone()));

        Ok(self.towers.get(&key).expect("just inserted"))
    }

    pub fn get(&self, id: &TowerId) -> Option<&Tower> {
        self.towers.get(&id.key())
    }

    pub fn technology_of(&self, id: &TowerId) -> TechTag {
        self.get(id).map(|t| t.technology).unwrap_or(TechTag::Unknown)
    }

    /// Count of distinct tower ids among the last `n` observations
    /// (D9 / the ML feature extractor's windowed churn count).
    pub fn distinct_towers_in_last(&self, n: usize) -> usize {
        let mut seen = std::collections::HashSet::new();
        for (_, id) in self.observations.iter().rev().take(n) {
            seen.insert(id.key());
        }
        seen.len()
    }

    /// Count of distinct towers observed within `duration` of `now`.
    pub fn distinct_towers_since(&self, now: DateTime<Utc>, duration: Duration) -> usize {
        let cutoff = now - duration;
        let mut seen = std::collections::HashSet::new();
        for (ts, id) in self.observations.iter().rev() {
            if *ts < cutoff {
                break;
            }
            seen.insert(id.key());
        }
        seen.len()
    }

    pub fn len(&self) -> usize {
        self.towers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.towers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EncryptionTag, GeoPoint};

    fn sample(cell_id: &str, lac: u32, ts: DateTime<Utc>) -> CommonFields {
        CommonFields {
            timestamp: ts,
            tower_id: TowerId::new(cell_id, lac, 310, 260),
            technology: TechTag::FourG,
            signal_strength_dbm: -80,
            signal_quality: 20,
            encryption: EncryptionTag::A51,
            location: None::<GeoPoint>,
            neighbors: None,
        }
    }

    #[test]
    fn empty_cell_id_is_rejected() {
        let mut reg = TowerRegistry::new(1000);
        let bad = sample("", 1, Utc::now());
        assert!(matches!(reg.observe(&bad), Err(EdgeError::InvalidTowerId)));
    }

    #[test]
    fn last_seen_is_monotonic_non_decreasing() {
        let mut reg = TowerRegistry::new(1000);
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(5);
        reg.observe(&sample("100", 1, t0)).unwrap();
        let first_last_seen = reg.get(&TowerId::new("100", 1, 310, 260)).unwrap().last_seen;
        reg.observe(&sample("100", 1, t1)).unwrap();
        let second_last_seen = reg.get(&TowerId::new("100", 1, 310, 260)).unwrap().last_seen;
        assert!(second_last_seen >= first_last_seen);
    }

    #[test]
    fn distinct_towers_counts_unique_keys_only() {
        let mut reg = TowerRegistry::new(1000);
        let t0 = Utc::now();
        reg.observe(&sample("100", 1, t0)).unwrap();
        reg.observe(&sample("101", 1, t0)).unwrap();
        reg.observe(&sample("100", 1, t0)).unwrap();
        assert_eq!(reg.distinct_towers_in_last(10), 2);
    }
}
