//! Rolling pressure/humidity history per node.
//!
//! Each node keeps a bounded ring of the most recent samples, one per tick.
//! Deltas compare the newest sample with the one `slots` ticks earlier and
//! fall back to the oldest sample while the ring is still warming up.

use crate::model::RollingDeltas;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

pub const WINDOW_5MIN_SECS: u64 = 5 * 60;
pub const WINDOW_15MIN_SECS: u64 = 15 * 60;

/// Extra slots kept beyond the longest window.
const CAPACITY_SLACK: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Pressure,
    Humidity,
}

impl HistorySample {
    fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Pressure => self.pressure,
            Metric::Humidity => self.humidity,
        }
    }
}

/// Number of tick slots spanning `window_secs`. Never zero, so a window
/// shorter than the tick interval compares against the previous tick.
pub fn window_slots(window_secs: u64, interval_secs: u64) -> usize {
    (window_secs / interval_secs.max(1)).max(1) as usize
}

#[derive(Debug, Clone)]
pub struct RollingWindowStore {
    capacity: usize,
    slots_5min: usize,
    slots_15min: usize,
    histories: HashMap<String, VecDeque<HistorySample>>,
}

impl RollingWindowStore {
    /// Sizes the store for a tick interval: capacity is
    /// `ceil(15 min / interval) + 2`.
    pub fn new(interval_secs: u64) -> Self {
        let interval = interval_secs.max(1);
        let capacity = WINDOW_15MIN_SECS.div_ceil(interval) as usize + CAPACITY_SLACK;
        Self {
            capacity,
            slots_5min: window_slots(WINDOW_5MIN_SECS, interval),
            slots_15min: window_slots(WINDOW_15MIN_SECS, interval),
            histories: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self, node_id: &str) -> usize {
        self.histories.get(node_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, node_id: &str) -> bool {
        self.len(node_id) == 0
    }

    /// Appends a sample, evicting the oldest once the node is at capacity.
    pub fn update(&mut self, node_id: &str, timestamp: DateTime<Utc>, pressure: f64, humidity: f64) {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(node_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if history.len() == capacity {
            history.pop_front();
        }
        history.push_back(HistorySample {
            timestamp,
            pressure,
            humidity,
        });
    }

    /// `current - value slots ago`, or `current - oldest` when fewer than
    /// `slots + 1` samples exist. Zero for an unknown node.
    pub fn delta(&self, node_id: &str, slots: usize, metric: Metric) -> f64 {
        let Some(history) = self.histories.get(node_id) else {
            return 0.0;
        };
        let (Some(current), Some(oldest)) = (history.back(), history.front()) else {
            return 0.0;
        };
        let past = if history.len() > slots {
            &history[history.len() - 1 - slots]
        } else {
            oldest
        };
        current.value(metric) - past.value(metric)
    }

    /// The three deltas the trigger evaluator consumes.
    pub fn deltas(&self, node_id: &str) -> RollingDeltas {
        RollingDeltas {
            pressure_drop_5: self.delta(node_id, self.slots_5min, Metric::Pressure),
            pressure_drop_15: self.delta(node_id, self.slots_15min, Metric::Pressure),
            humidity_change_15: self.delta(node_id, self.slots_15min, Metric::Humidity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 14, 0, 0).unwrap()
    }

    fn fill(store: &mut RollingWindowStore, node: &str, pressures: &[f64]) {
        for (i, p) in pressures.iter().enumerate() {
            store.update(node, t0() + Duration::seconds(30 * i as i64), *p, 60.0 + i as f64);
        }
    }

    #[test]
    fn test_capacity_for_default_interval() {
        // 900 / 30 = 30 slots, plus slack.
        assert_eq!(RollingWindowStore::new(30).capacity(), 32);
        // Non-divisible interval rounds up.
        assert_eq!(RollingWindowStore::new(40).capacity(), 23 + 2);
    }

    #[test]
    fn test_window_slots_never_zero() {
        assert_eq!(window_slots(WINDOW_5MIN_SECS, 30), 10);
        assert_eq!(window_slots(WINDOW_15MIN_SECS, 30), 30);
        assert_eq!(window_slots(WINDOW_5MIN_SECS, 600), 1);
    }

    #[test]
    fn test_single_sample_delta_is_zero() {
        let mut store = RollingWindowStore::new(30);
        store.update("node1", t0(), 1005.3, 71.0);
        assert_eq!(store.delta("node1", 10, Metric::Pressure), 0.0);
        assert_eq!(store.deltas("node1"), RollingDeltas::default());
    }

    #[test]
    fn test_unknown_node_delta_is_zero() {
        let store = RollingWindowStore::new(30);
        assert_eq!(store.delta("ghost", 10, Metric::Humidity), 0.0);
        assert!(store.is_empty("ghost"));
    }

    #[test]
    fn test_warm_up_degrades_to_oldest_sample() {
        let mut store = RollingWindowStore::new(30);
        fill(&mut store, "node1", &[1010.0, 1009.0, 1007.5]);
        // Only 3 samples, 10-slot window: compare against the oldest.
        assert_eq!(store.delta("node1", 10, Metric::Pressure), 1007.5 - 1010.0);
        assert_eq!(store.delta("node1", 10, Metric::Humidity), 2.0);
    }

    #[test]
    fn test_full_window_uses_sample_slots_ago() {
        let mut store = RollingWindowStore::new(30);
        let pressures: Vec<f64> = (0..15).map(|i| 1010.0 - i as f64 * 0.5).collect();
        fill(&mut store, "node1", &pressures);
        // newest = index 14, ten slots earlier = index 4
        let expected = pressures[14] - pressures[4];
        assert_eq!(store.delta("node1", 10, Metric::Pressure), expected);
    }

    #[test]
    fn test_eviction_keeps_most_recent_samples() {
        let mut store = RollingWindowStore::new(30);
        let capacity = store.capacity();
        let pressures: Vec<f64> = (0..capacity + 5).map(|i| i as f64).collect();
        fill(&mut store, "node1", &pressures);
        assert_eq!(store.len("node1"), capacity);
        // Oldest surviving sample is #5; a window larger than the ring
        // compares against it.
        let newest = (capacity + 4) as f64;
        assert_eq!(store.delta("node1", 1_000, Metric::Pressure), newest - 5.0);
        assert_eq!(store.delta("node1", 1, Metric::Pressure), 1.0);
    }

    #[test]
    fn test_nodes_are_independent() {
        let mut store = RollingWindowStore::new(30);
        fill(&mut store, "a", &[1000.0, 990.0]);
        fill(&mut store, "b", &[1000.0]);
        assert_eq!(store.delta("a", 10, Metric::Pressure), -10.0);
        assert_eq!(store.delta("b", 10, Metric::Pressure), 0.0);
    }
}
