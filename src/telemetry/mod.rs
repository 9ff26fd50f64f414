//! Telemetry for the pacing controller
//!
//! Collects controller events and aggregate statistics for observability
//! collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Default number of events retained
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CycleCompleted {
        success: bool,
        duration_ms: u64,
        timestamp: Instant,
    },
    WaitComputed {
        wait_secs: f64,
        phase: String,
        timestamp: Instant,
    },
    PatternAvoided {
        pattern: String,
        multiplier: f64,
        timestamp: Instant,
    },
    HealthChecked {
        status: String,
        score: f64,
        timestamp: Instant,
    },
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
    RecoveryAttempted {
        strategy: String,
        success: bool,
        duration_ms: u64,
        timestamp: Instant,
    },
    EmergencyRecovery {
        success: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub cycles_completed: usize,
    pub cycles_succeeded: usize,
    pub cycles_failed: usize,
    pub waits_computed: usize,
    pub total_wait_secs: f64,
    pub pattern_interventions: usize,
    pub health_checks: usize,
    pub state_transitions: usize,
    pub recovery_attempts: usize,
    pub recoveries_succeeded: usize,
    pub emergency_recoveries: usize,
}

impl TelemetryStats {
    pub fn mean_wait_secs(&self) -> f64 {
        if self.waits_computed == 0 {
            0.0
        } else {
            self.total_wait_secs / self.waits_computed as f64
        }
    }
}

/// Telemetry collector
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    capacity: usize,
    start_time: Instant,
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Collector retaining at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            capacity: capacity.max(1),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            match &event {
                TelemetryEvent::CycleCompleted { success, .. } => {
                    stats.cycles_completed += 1;
                    if *success {
                        stats.cycles_succeeded += 1;
                    } else {
                        stats.cycles_failed += 1;
                    }
                }
                TelemetryEvent::WaitComputed { wait_secs, .. } => {
                    stats.waits_computed += 1;
                    stats.total_wait_secs += wait_secs;
                }
                TelemetryEvent::PatternAvoided { .. } => {
                    stats.pattern_interventions += 1;
                }
                TelemetryEvent::HealthChecked { .. } => {
                    stats.health_checks += 1;
                }
                TelemetryEvent::StateTransition { .. } => {
                    stats.state_transitions += 1;
                }
                TelemetryEvent::RecoveryAttempted { success, .. } => {
                    stats.recovery_attempts += 1;
                    if *success {
                        stats.recoveries_succeeded += 1;
                    }
                }
                TelemetryEvent::EmergencyRecovery { .. } => {
                    stats.emergency_recoveries += 1;
                }
            }
        }

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get retained event count
    pub fn event_count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    /// Cycle success rate, 1.0 before any cycle
    pub fn cycle_success_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if stats.cycles_completed == 0 {
            1.0
        } else {
            stats.cycles_succeeded as f64 / stats.cycles_completed as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats().cycles_completed, 0);
        assert_eq!(collector.cycle_success_rate(), 1.0);
    }

    #[test]
    fn test_cycle_success_rate() {
        let collector = TelemetryCollector::new();
        for success in [true, true, false] {
            collector.record(TelemetryEvent::CycleCompleted {
                success,
                duration_ms: 100,
                timestamp: Instant::now(),
            });
        }

        let rate = collector.cycle_success_rate();
        assert!((rate - 0.666).abs() < 0.01);
        assert_eq!(collector.get_stats().cycles_failed, 1);
    }

    #[test]
    fn test_wait_statistics() {
        let collector = TelemetryCollector::new();
        for wait_secs in [60.0, 120.0] {
            collector.record(TelemetryEvent::WaitComputed {
                wait_secs,
                phase: "early".to_string(),
                timestamp: Instant::now(),
            });
        }
        collector.record(TelemetryEvent::PatternAvoided {
            pattern: "repetition".to_string(),
            multiplier: 1.3,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.waits_computed, 2);
        assert!((stats.mean_wait_secs() - 90.0).abs() < 1e-9);
        assert_eq!(stats.pattern_interventions, 1);
    }

    #[test]
    fn test_recovery_counters() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::RecoveryAttempted {
            strategy: "quick_restart".to_string(),
            success: false,
            duration_ms: 10,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::EmergencyRecovery {
            success: true,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.recovery_attempts, 1);
        assert_eq!(stats.recoveries_succeeded, 0);
        assert_eq!(stats.emergency_recoveries, 1);
    }

    #[test]
    fn test_events_are_bounded() {
        let collector = TelemetryCollector::with_capacity(5);
        for i in 0..10 {
            collector.record(TelemetryEvent::HealthChecked {
                status: "healthy".to_string(),
                score: i as f64,
                timestamp: Instant::now(),
            });
        }

        assert_eq!(collector.event_count(), 5);
        assert_eq!(collector.get_stats().health_checks, 10);
        let recent = collector.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert!(matches!(
            recent.last(),
            Some(TelemetryEvent::HealthChecked { score, .. }) if *score == 9.0
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();
        clone.record(TelemetryEvent::StateTransition {
            from: "idle".to_string(),
            to: "classifying".to_string(),
            timestamp: Instant::now(),
        });
        assert_eq!(collector.get_stats().state_transitions, 1);
    }
}
