//! Bounded FIFO of computed waits used for pattern detection

use crate::timing::types::{TimingRecord, TimingStatistics};
use std::collections::VecDeque;

/// Ring buffer of timing records; oldest entries are evicted on overflow
#[derive(Debug, Clone)]
pub struct TimingMemory {
    records: VecDeque<TimingRecord>,
    capacity: usize,
}

impl TimingMemory {
    /// Create memory with a fixed capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest beyond capacity
    pub fn push(&mut self, record: TimingRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Final waits of the last `n` records, oldest first
    pub fn recent_finals(&self, n: usize) -> Vec<f64> {
        let start = self.records.len().saturating_sub(n);
        self.records
            .iter()
            .skip(start)
            .map(|r| r.final_secs)
            .collect()
    }

    pub fn latest(&self) -> Option<&TimingRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Mean, range and spread of stored final waits
    pub fn statistics(&self, pattern_interventions: u64) -> TimingStatistics {
        let samples = self.records.len();
        if samples == 0 {
            return TimingStatistics {
                samples: 0,
                mean_secs: 0.0,
                min_secs: 0.0,
                max_secs: 0.0,
                std_dev_secs: 0.0,
                pattern_interventions,
            };
        }

        let values: Vec<f64> = self.records.iter().map(|r| r.final_secs).collect();
        let mean = values.iter().sum::<f64>() / samples as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples as f64;

        TimingStatistics {
            samples,
            mean_secs: mean,
            min_secs: values.iter().copied().fold(f64::INFINITY, f64::min),
            max_secs: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev_secs: variance.sqrt(),
            pattern_interventions,
        }
    }
}
