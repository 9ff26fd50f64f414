//! Cycle scheduler
//!
//! Ties the loop together: run the operation, report the outcome, recover on
//! failure, then sleep for the next computed wait. One cycle runs at a time
//! and every suspension point listens for shutdown.

pub mod types;

pub use types::{CycleSummary, SchedulerSummary, StopReason};

use crate::config::SchedulerConfig;
use crate::context::ControllerContext;
use crate::errors::{ControllerError, ErrorKind, OperationError, Result};
use crate::health::HealthReport;
use crate::recovery::{FailureStats, RecoveryCoordinator};
use crate::shutdown::Shutdown;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::timing::TimingController;
use crate::types::{CycleOutcome, CycleReport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// The externally risky operation run once per cycle
#[async_trait]
pub trait Operation: Send {
    fn name(&self) -> &str {
        "operation"
    }

    async fn execute(&mut self) -> std::result::Result<CycleReport, OperationError>;
}

/// Drives operation cycles with adaptive pacing and recovery
pub struct CycleScheduler<O: Operation> {
    operation: O,
    timing: TimingController,
    coordinator: Arc<RecoveryCoordinator>,
    failure_stats: FailureStats,
    health_feed: Option<watch::Receiver<HealthReport>>,
    latest_health: Option<HealthReport>,
    config: SchedulerConfig,
    telemetry: TelemetryCollector,
    shutdown: Shutdown,
    cycle: u64,
}

impl<O: Operation> CycleScheduler<O> {
    pub fn new(
        operation: O,
        timing: TimingController,
        coordinator: Arc<RecoveryCoordinator>,
        config: SchedulerConfig,
        failure_window: Duration,
        ctx: &ControllerContext,
    ) -> Self {
        Self {
            operation,
            timing,
            coordinator,
            failure_stats: FailureStats::new(failure_window),
            health_feed: None,
            latest_health: None,
            config,
            telemetry: ctx.telemetry.clone(),
            shutdown: ctx.shutdown.clone(),
            cycle: 0,
        }
    }

    /// Read health snapshots published by a periodic monitor
    pub fn with_health_feed(mut self, feed: watch::Receiver<HealthReport>) -> Self {
        self.health_feed = Some(feed);
        self
    }

    /// Run one cycle and compute the wait before the next one.
    ///
    /// Errors only with `Cancelled` or `RecoveryExhausted`.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        self.pull_health();
        // manual recoveries are kept out until the operation has finished
        let coordinator = self.coordinator.clone();
        let idle = coordinator.hold_idle().await;

        self.cycle += 1;
        let cycle = self.cycle;
        debug!(cycle, operation = self.operation.name(), "Starting cycle");

        let started = Instant::now();
        let result = self.execute_operation().await?;
        drop(idle);
        let outcome = CycleOutcome::from_result(result, started.elapsed().as_millis() as u64);

        // adaptation must see this outcome before the next wait is computed
        self.timing.record_outcome(&outcome);
        self.telemetry.record(TelemetryEvent::CycleCompleted {
            success: outcome.success,
            duration_ms: outcome.duration_ms,
            timestamp: Instant::now(),
        });

        let recovery = match &outcome.error {
            None => {
                self.coordinator.record_success();
                info!(cycle, duration_ms = outcome.duration_ms, "Cycle succeeded");
                None
            }
            Some(err) => {
                warn!(cycle, error = %err, "Cycle failed");
                self.failure_stats.record_failure(err);
                let metrics = self.failure_stats.snapshot(self.latest_health.as_ref());
                match self.coordinator.handle_failure(err, &metrics).await {
                    Ok(recovery) => Some(recovery),
                    Err(e) => {
                        if e.is_fatal() {
                            error!(
                                cycle,
                                error = %e,
                                "Recovery exhausted, operator intervention required"
                            );
                        }
                        return Err(e);
                    }
                }
            }
        };

        let next_wait = self.timing.compute_next_wait();
        info!(
            cycle,
            wait_secs = format!("{:.1}", next_wait.as_secs_f64()),
            "Next cycle scheduled"
        );

        Ok(CycleSummary {
            cycle,
            outcome,
            recovery,
            next_wait,
        })
    }

    /// Loop until shutdown, `max_cycles`, or a fatal recovery failure
    pub async fn run(&mut self) -> Result<SchedulerSummary> {
        let mut summary = SchedulerSummary::new();

        loop {
            if let Some(max) = self.config.max_cycles {
                if summary.cycles >= max {
                    summary.stop_reason = StopReason::MaxCycles;
                    break;
                }
            }

            let cycle = match self.run_cycle().await {
                Ok(cycle) => cycle,
                Err(ControllerError::Cancelled) => break,
                Err(e) => return Err(e),
            };
            summary.absorb(&cycle);

            let reached_max = self.config.max_cycles.is_some_and(|max| summary.cycles >= max);
            if reached_max {
                summary.stop_reason = StopReason::MaxCycles;
                break;
            }

            if let Err(ControllerError::Cancelled) = self.shutdown.sleep(cycle.next_wait).await {
                break;
            }
        }

        info!(
            cycles = summary.cycles,
            successes = summary.successes,
            failures = summary.failures,
            stop_reason = ?summary.stop_reason,
            "Scheduler stopped"
        );
        Ok(summary)
    }

    pub fn timing(&self) -> &TimingController {
        &self.timing
    }

    pub fn coordinator(&self) -> &Arc<RecoveryCoordinator> {
        &self.coordinator
    }

    pub fn latest_health(&self) -> Option<&HealthReport> {
        self.latest_health.as_ref()
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    async fn execute_operation(
        &mut self,
    ) -> Result<std::result::Result<CycleReport, OperationError>> {
        let limit = Duration::from_secs(self.config.operation_timeout_secs);
        let mut shutdown = self.shutdown.clone();

        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(ControllerError::Cancelled),
            result = tokio::time::timeout(limit, self.operation.execute()) => Ok(match result {
                Ok(result) => result,
                Err(_) => Err(OperationError::new(
                    ErrorKind::Unknown,
                    format!("operation timed out after {}s", limit.as_secs()),
                )),
            }),
        }
    }

    fn pull_health(&mut self) {
        let Some(feed) = self.health_feed.as_mut() else {
            return;
        };
        if !feed.has_changed().unwrap_or(false) {
            return;
        }

        let report = feed.borrow_and_update().clone();
        self.timing.update_health(&report);
        self.latest_health = Some(report);
    }
}
