//! Adaptive wait computation
//!
//! Each wait is a uniform base draw scaled by adaptation factors (daily
//! phase, success rate, health, time of day), then by the recovery chain
//! (backoff, jitter, pattern avoidance, health escalation, target seeking),
//! and finally clamped to `[min_wait, max_wait * 1.5]`.

use crate::config::TimingConfig;
use crate::context::ControllerContext;
use crate::health::{HealthReport, OverallStatus};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::timing::clock::Clock;
use crate::timing::memory::TimingMemory;
use crate::timing::pattern::detect_pattern;
use crate::timing::types::{
    AdaptationState, PatternDetection, PatternKind, Phase, TimingFactors, TimingRecord,
    TimingStatistics,
};
use crate::types::CycleOutcome;
use chrono::{NaiveDate, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcomes inspected when deciding whether recent failures raise the floor
const RECENT_FAILURE_SPAN: usize = 5;

/// Upper bound of the safety clamp relative to `max_wait`
const CEILING_RATIO: f64 = 1.5;

/// Backoff never pushes a wait past this multiple of `max_wait`
const BACKOFF_CAP_RATIO: f64 = 2.0;

/// Success-rate adaptation multiplier
pub fn success_rate_factor(config: &TimingConfig, success_rate: f64) -> f64 {
    if success_rate < config.success_low_threshold {
        1.0 + (config.success_low_threshold - success_rate)
    } else if success_rate > config.success_high_threshold {
        (1.0 - (success_rate - config.success_high_threshold) * 0.5).max(0.8)
    } else {
        1.0
    }
}

/// Health adaptation multiplier for a `[0, 1]` health value
pub fn health_factor(config: &TimingConfig, health: f64) -> f64 {
    if health < config.health_threshold {
        1.0 + (config.health_threshold - health) * 0.5
    } else {
        1.0
    }
}

/// Peak-hour penalty or night discount for a local hour
pub fn time_of_day_factor(config: &TimingConfig, hour: u32) -> f64 {
    if config.peak_hours.contains(&hour) {
        config.peak_penalty
    } else if is_night(config, hour) {
        config.night_discount
    } else {
        1.0
    }
}

fn is_night(config: &TimingConfig, hour: u32) -> bool {
    let (start, end) = (config.night_start_hour, config.night_end_hour);
    if start > end {
        hour >= start || hour < end
    } else {
        hour >= start && hour < end
    }
}

fn phase_factor(config: &TimingConfig, phase: Phase) -> f64 {
    match phase {
        Phase::Early => config.early_multiplier,
        Phase::Mid => config.mid_multiplier,
        Phase::Late => config.late_multiplier,
    }
}

fn pattern_factor(config: &TimingConfig, kind: PatternKind) -> f64 {
    match kind {
        PatternKind::Repetition => config.repetition_multiplier,
        PatternKind::Sequence => config.sequence_multiplier,
        PatternKind::RegularSpacing => config.regular_spacing_multiplier,
    }
}

/// Computes the wait before each cycle from outcome and health feedback
pub struct TimingController {
    config: TimingConfig,
    state: AdaptationState,
    memory: TimingMemory,
    outcomes: VecDeque<bool>,
    consecutive_failures: u32,
    health_status: OverallStatus,
    rng: StdRng,
    day: NaiveDate,
    completed_today: u32,
    pattern_interventions: u64,
    telemetry: TelemetryCollector,
    clock: Arc<dyn Clock>,
}

impl TimingController {
    /// Create a controller; `config.seed` makes the wait sequence reproducible
    pub fn new(config: TimingConfig, ctx: &ControllerContext) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let day = ctx.clock.now().date();

        Self {
            memory: TimingMemory::new(config.history_capacity),
            outcomes: VecDeque::with_capacity(config.outcome_window.max(1)),
            state: AdaptationState::default(),
            consecutive_failures: 0,
            health_status: OverallStatus::Healthy,
            rng,
            day,
            completed_today: 0,
            pattern_interventions: 0,
            telemetry: ctx.telemetry.clone(),
            clock: ctx.clock.clone(),
            config,
        }
    }

    /// Next wait as a duration
    pub fn compute_next_wait(&mut self) -> Duration {
        let record = self.compute_next_record();
        Duration::from_secs_f64(record.final_secs)
    }

    /// Next wait with every intermediate value and factor
    pub fn compute_next_record(&mut self) -> TimingRecord {
        let now = self.clock.now();
        self.roll_day(now.date());

        let min = self.config.min_wait_secs;
        let max = self.config.max_wait_secs;
        let ceiling = max * CEILING_RATIO;
        let mut factors = TimingFactors::default();

        // base
        let base = self.rng.gen_range(min..=max);

        // adaptation
        let phase = Phase::from_progress(self.daily_progress());
        self.state.current_phase = phase;
        factors.phase = phase_factor(&self.config, phase);
        factors.success_rate = success_rate_factor(&self.config, self.state.success_rate);
        factors.health = health_factor(&self.config, self.state.system_health);
        factors.time_of_day = time_of_day_factor(&self.config, now.hour());
        let adapted =
            base * factors.phase * factors.success_rate * factors.health * factors.time_of_day;

        // recovery chain
        let mut wait = adapted;

        let backed_off = (wait * self.config.backoff_base.powi(self.consecutive_failures as i32))
            .min(max * BACKOFF_CAP_RATIO);
        factors.backoff = if wait > 0.0 { backed_off / wait } else { 1.0 };
        wait = backed_off;

        let jitter = self.config.jitter_ratio;
        factors.jitter = self.rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
        wait *= factors.jitter;

        let detection = self.detect_pattern();
        let pattern = match detection.kind {
            Some(kind) if detection.confidence >= self.config.pattern_confidence_floor => {
                factors.pattern = pattern_factor(&self.config, kind);
                wait *= factors.pattern;
                self.pattern_interventions += 1;
                debug!(pattern = %kind, multiplier = factors.pattern, "Timing pattern avoided");
                self.telemetry.record(TelemetryEvent::PatternAvoided {
                    pattern: kind.to_string(),
                    multiplier: factors.pattern,
                    timestamp: Instant::now(),
                });
                Some(kind)
            }
            _ => None,
        };

        factors.escalation = match self.health_status {
            OverallStatus::Unhealthy | OverallStatus::Emergency => self.config.unhealthy_multiplier,
            OverallStatus::Degraded => self.config.degraded_multiplier,
            OverallStatus::Healthy => 1.0,
        };
        wait *= factors.escalation;

        factors.target_seeking = (1.0
            + (self.config.target_success_rate - self.state.success_rate))
            .max(self.config.target_min_multiplier);
        wait *= factors.target_seeking;
        let recovered = wait;

        // safety clamp
        let mut floor = min;
        if self.state.success_rate < self.config.low_success_floor_rate
            || self.recent_failures() > self.config.recent_failure_limit
        {
            floor = (min * self.config.safety_floor_multiplier).min(ceiling);
        }
        let final_secs = if recovered.is_finite() {
            recovered.clamp(floor, ceiling)
        } else {
            ceiling
        };

        let record = TimingRecord {
            timestamp: now,
            base_secs: base,
            adapted_secs: adapted,
            recovered_secs: recovered,
            final_secs,
            factors,
            phase,
            pattern,
            consecutive_failures: self.consecutive_failures,
        };

        debug!(
            base = format!("{:.1}", base),
            adapted = format!("{:.1}", adapted),
            recovered = format!("{:.1}", recovered),
            final_secs = format!("{:.1}", final_secs),
            phase = ?phase,
            consecutive_failures = self.consecutive_failures,
            "Computed next wait"
        );
        self.telemetry.record(TelemetryEvent::WaitComputed {
            wait_secs: final_secs,
            phase: format!("{:?}", phase).to_lowercase(),
            timestamp: Instant::now(),
        });

        self.memory.push(record.clone());
        record
    }

    /// Apply one cycle's outcome before the next wait is computed
    pub fn record_outcome(&mut self, outcome: &CycleOutcome) {
        let now = self.clock.now();
        self.roll_day(now.date());

        let window = self.config.outcome_window.max(1);
        while self.outcomes.len() >= window {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome.success);

        let successes = self.outcomes.iter().filter(|s| **s).count();
        self.state.success_rate = successes as f64 / self.outcomes.len() as f64;

        let alpha = self.config.performance_smoothing;
        let observed = outcome.performance_observation();
        self.state.performance_score =
            ((1.0 - alpha) * self.state.performance_score + alpha * observed).clamp(0.0, 1.0);

        if outcome.success {
            self.consecutive_failures = 0;
            self.completed_today = self.completed_today.saturating_add(1);
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }

        self.state.current_phase = Phase::from_progress(self.daily_progress());
        self.state.last_adjustment = Some(now);
        self.state.adjustment_count += 1;

        debug!(
            success = outcome.success,
            success_rate = format!("{:.2}", self.state.success_rate),
            performance = format!("{:.2}", self.state.performance_score),
            consecutive_failures = self.consecutive_failures,
            "Recorded cycle outcome"
        );
    }

    /// Feed a health snapshot taken elsewhere
    pub fn update_health(&mut self, report: &HealthReport) {
        self.state.system_health = report.normalized_score();
        if report.overall_status != self.health_status {
            info!(
                from = %self.health_status,
                to = %report.overall_status,
                "Timing controller health status changed"
            );
        }
        self.health_status = report.overall_status;
    }

    /// Pattern check over the most recent waits
    pub fn detect_pattern(&self) -> PatternDetection {
        let waits = self.memory.recent_finals(self.config.pattern_window);
        detect_pattern(&waits, self.config.regular_spacing_variance)
    }

    pub fn state(&self) -> &AdaptationState {
        &self.state
    }

    pub fn memory(&self) -> &TimingMemory {
        &self.memory
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn health_status(&self) -> OverallStatus {
        self.health_status
    }

    pub fn completed_today(&self) -> u32 {
        self.completed_today
    }

    /// Successful cycles today over the daily target
    pub fn daily_progress(&self) -> f64 {
        self.completed_today as f64 / self.config.daily_target.max(1) as f64
    }

    pub fn statistics(&self) -> TimingStatistics {
        self.memory.statistics(self.pattern_interventions)
    }

    fn recent_failures(&self) -> usize {
        self.outcomes
            .iter()
            .rev()
            .take(RECENT_FAILURE_SPAN)
            .filter(|s| !**s)
            .count()
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.day {
            info!(completed = self.completed_today, "New day, resetting daily progress");
            self.day = today;
            self.completed_today = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OperationError;
    use crate::timing::clock::ManualClock;
    use chrono::NaiveDateTime;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn controller_at(hour: u32) -> (TimingController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(hour)));
        let ctx = ControllerContext::default().with_clock(clock.clone());
        let config = TimingConfig {
            seed: Some(7),
            ..TimingConfig::default()
        };
        (TimingController::new(config, &ctx), clock)
    }

    #[test]
    fn test_success_rate_factor_bands() {
        let config = TimingConfig::default();
        let low = success_rate_factor(&config, 0.5);
        assert!(low > 1.0 && low <= 1.3);
        let high = success_rate_factor(&config, 0.95);
        assert!((0.95..1.0).contains(&high));
        assert_eq!(success_rate_factor(&config, 0.8), 1.0);
        assert!((success_rate_factor(&config, 1.0) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_health_factor() {
        let config = TimingConfig::default();
        assert_eq!(health_factor(&config, 0.9), 1.0);
        assert!((health_factor(&config, 0.5) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_time_of_day_factor() {
        let config = TimingConfig::default();
        assert_eq!(time_of_day_factor(&config, 10), config.peak_penalty);
        assert_eq!(time_of_day_factor(&config, 23), config.night_discount);
        assert_eq!(time_of_day_factor(&config, 3), config.night_discount);
        assert_eq!(time_of_day_factor(&config, 6), 1.0);
        assert_eq!(time_of_day_factor(&config, 20), 1.0);
    }

    #[test]
    fn test_wait_within_bounds() {
        let (mut controller, _clock) = controller_at(12);
        for i in 0..200 {
            if i % 3 == 0 {
                controller.record_outcome(&CycleOutcome::failure(OperationError::unknown("boom")));
            }
            let wait = controller.compute_next_wait().as_secs_f64();
            assert!(wait >= 60.0 - 1e-9, "wait {} below min", wait);
            assert!(wait <= 270.0 + 1e-9, "wait {} above ceiling", wait);
        }
    }

    #[test]
    fn test_records_land_in_memory() {
        let (mut controller, _clock) = controller_at(20);
        for _ in 0..5 {
            controller.compute_next_wait();
        }
        assert_eq!(controller.memory().len(), 5);
        assert_eq!(controller.statistics().samples, 5);
    }

    #[test]
    fn test_failures_raise_floor() {
        let (mut controller, _clock) = controller_at(20);
        for _ in 0..4 {
            controller.record_outcome(&CycleOutcome::failure(OperationError::unknown("boom")));
        }
        let record = controller.compute_next_record();
        assert!(record.final_secs >= 60.0 * 1.5 - 1e-9);
        assert_eq!(record.consecutive_failures, 4);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (mut controller, _clock) = controller_at(20);
        for _ in 0..3 {
            controller.record_outcome(&CycleOutcome::failure(OperationError::unknown("boom")));
        }
        assert_eq!(controller.consecutive_failures(), 3);
        controller.record_outcome(&CycleOutcome::success());
        assert_eq!(controller.consecutive_failures(), 0);
        assert!((controller.state().success_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_daily_progress_rolls_over() {
        let (mut controller, clock) = controller_at(22);
        for _ in 0..12 {
            controller.record_outcome(&CycleOutcome::success());
        }
        assert!((controller.daily_progress() - 0.3).abs() < 1e-9);
        assert_eq!(controller.state().current_phase, Phase::Mid);

        clock.advance(Duration::from_secs(3 * 3600));
        controller.compute_next_wait();
        assert_eq!(controller.completed_today(), 0);
        assert_eq!(controller.state().current_phase, Phase::Early);
    }

    #[test]
    fn test_unhealthy_report_escalates() {
        let (mut controller, _clock) = controller_at(20);
        controller.update_health(&HealthReport::emergency("probe deadline"));
        let record = controller.compute_next_record();
        assert_eq!(record.factors.escalation, 1.5);
        assert_eq!(controller.state().system_health, 0.0);
    }

    #[test]
    fn test_performance_is_smoothed() {
        let (mut controller, _clock) = controller_at(20);
        controller.record_outcome(&CycleOutcome::failure(OperationError::unknown("x")));
        let score = controller.state().performance_score;
        assert!((score - 0.8).abs() < 1e-9);
        assert_eq!(controller.state().adjustment_count, 1);
        assert!(controller.state().last_adjustment.is_some());
    }
}
