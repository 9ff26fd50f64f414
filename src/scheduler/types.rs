//! Scheduler result types

use crate::recovery::RecoveryOutcome;
use crate::types::CycleOutcome;
use serde::Serialize;
use std::time::Duration;

/// What happened in one cycle
#[derive(Debug, Clone)]
pub struct CycleSummary {
    /// 1-based cycle number
    pub cycle: u64,
    pub outcome: CycleOutcome,
    pub recovery: Option<RecoveryOutcome>,

    /// Wait before the next cycle
    pub next_wait: Duration,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxCycles,
    Shutdown,
}

/// Totals over a scheduler run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
    pub recoveries: u64,
    pub skipped_recoveries: u64,
    pub total_wait_secs: f64,
    pub stop_reason: StopReason,
}

impl SchedulerSummary {
    pub(crate) fn new() -> Self {
        Self {
            cycles: 0,
            successes: 0,
            failures: 0,
            recoveries: 0,
            skipped_recoveries: 0,
            total_wait_secs: 0.0,
            stop_reason: StopReason::Shutdown,
        }
    }

    pub(crate) fn absorb(&mut self, cycle: &CycleSummary) {
        self.cycles += 1;
        if cycle.outcome.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        match &cycle.recovery {
            Some(RecoveryOutcome::Skipped { .. }) => self.skipped_recoveries += 1,
            Some(_) => self.recoveries += 1,
            None => {}
        }
        self.total_wait_secs += cycle.next_wait.as_secs_f64();
    }

    pub fn success_rate(&self) -> f64 {
        if self.cycles == 0 {
            1.0
        } else {
            self.successes as f64 / self.cycles as f64
        }
    }
}
