//! Dry run of the pacing loop on a virtual clock

use crate::config::Config;
use crate::context::ControllerContext;
use crate::errors::{OperationError, Result};
use crate::recovery::{FailureClassifier, FailureStats, NoopTarget, RecoveryCoordinator};
use crate::shutdown::Shutdown;
use crate::timing::{Clock, ManualClock, PatternKind, Phase, TimingController};
use crate::types::CycleOutcome;
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One simulated cycle
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedCycle {
    pub cycle: u32,
    pub started_at: NaiveDateTime,
    pub success: bool,
    pub strategy: Option<String>,
    pub wait_secs: f64,
    pub phase: Phase,
    pub pattern: Option<PatternKind>,
    pub consecutive_failures: u32,
}

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub cycles: u32,
    pub failure_rate: f64,
    pub start: NaiveDateTime,
    pub seed: Option<u64>,
}

/// Run `params.cycles` cycles with random failures, advancing a manual
/// clock by each computed wait. Recovery runs against a no-op target with
/// settle and backoff pauses disabled.
pub async fn simulate(config: &Config, params: &SimulationParams) -> Result<Vec<SimulatedCycle>> {
    let clock = Arc::new(ManualClock::new(params.start));
    let ctx = ControllerContext::with_shutdown(Shutdown::never()).with_clock(clock.clone());

    let mut timing_config = config.timing.clone();
    if params.seed.is_some() {
        timing_config.seed = params.seed;
    }
    let mut timing = TimingController::new(timing_config, &ctx);

    let mut recovery_config = config.recovery.clone();
    recovery_config.settle_ms = 0;
    recovery_config.backoff_ms = 0;
    let coordinator = RecoveryCoordinator::new(
        recovery_config,
        FailureClassifier::with_rules(config.classifier.rules.clone()),
        Arc::new(NoopTarget),
        &ctx,
    );

    let mut stats = FailureStats::new(Duration::from_secs(config.recovery.failure_window_secs));
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let failure_rate = params.failure_rate.clamp(0.0, 1.0);

    let mut cycles = Vec::with_capacity(params.cycles as usize);
    for cycle in 1..=params.cycles {
        let started_at = clock.now();
        let success = !rng.gen_bool(failure_rate);

        let (outcome, strategy) = if success {
            coordinator.record_success();
            (CycleOutcome::success(), None)
        } else {
            let error = OperationError::unknown("simulated failure");
            stats.record_failure(&error);
            let recovery = coordinator.handle_failure(&error, &stats.snapshot(None)).await?;
            (
                CycleOutcome::failure(error),
                recovery.strategy().map(|s| s.to_string()),
            )
        };
        timing.record_outcome(&outcome);

        let record = timing.compute_next_record();
        clock.advance(Duration::from_secs_f64(record.final_secs));

        cycles.push(SimulatedCycle {
            cycle,
            started_at,
            success,
            strategy,
            wait_secs: record.final_secs,
            phase: record.phase,
            pattern: record.pattern,
            consecutive_failures: timing.consecutive_failures(),
        });
    }

    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn params(failure_rate: f64) -> SimulationParams {
        SimulationParams {
            cycles: 30,
            failure_rate,
            start: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            seed: Some(42),
        }
    }

    #[tokio::test]
    async fn test_simulation_respects_bounds() {
        let config = Config::default();
        let cycles = simulate(&config, &params(0.2)).await.unwrap();

        assert_eq!(cycles.len(), 30);
        let ceiling = config.timing.max_wait_secs * 1.5;
        for cycle in &cycles {
            assert!(cycle.wait_secs >= config.timing.min_wait_secs);
            assert!(cycle.wait_secs <= ceiling);
        }
        assert!(cycles.windows(2).all(|w| w[1].started_at > w[0].started_at));
    }

    #[tokio::test]
    async fn test_seeded_simulation_is_reproducible() {
        let config = Config::default();
        let a = simulate(&config, &params(0.3)).await.unwrap();
        let b = simulate(&config, &params(0.3)).await.unwrap();

        let waits_a: Vec<f64> = a.iter().map(|c| c.wait_secs).collect();
        let waits_b: Vec<f64> = b.iter().map(|c| c.wait_secs).collect();
        assert_eq!(waits_a, waits_b);
    }

    #[tokio::test]
    async fn test_no_failures_means_no_recovery() {
        let cycles = simulate(&Config::default(), &params(0.0)).await.unwrap();
        assert!(cycles.iter().all(|c| c.success && c.strategy.is_none()));
    }
}
