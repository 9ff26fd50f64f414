//! Recovery coordinator
//!
//! Per failure event: `Idle -> Classifying -> StrategySelected -> Executing -> Idle`.
//! Execution is mutually exclusive; a trigger arriving while a strategy runs
//! is dropped and reported as `RecoveryOutcome::Skipped`. A recovery future
//! dropped mid-strategy puts the coordinator back in `Idle`.

use crate::config::RecoveryConfig;
use crate::context::ControllerContext;
use crate::errors::{ControllerError, OperationError, Result};
use crate::recovery::classifier::FailureClassifier;
use crate::recovery::ladder::EscalationLadder;
use crate::recovery::target::OperationalTarget;
use crate::recovery::types::{
    CoordinatorEvent, CoordinatorState, FailureAnalysis, FailureCause, RecoveryAttempt,
    RecoveryOutcome, RecoveryStep, RecoveryStrategy, RecoveryTrigger, SystemMetrics,
};
use crate::shutdown::Shutdown;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Point-in-time view of coordinator state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,
    pub consecutive_failures: u32,
    pub ladder_index: usize,
    pub ladder_exhausted: bool,
    pub attempts: usize,
}

struct CoordinatorInner {
    state: CoordinatorState,
    ladder: EscalationLadder,
    consecutive_failures: u32,

    /// Attempts since the last reset
    attempt_number: u32,
    history: VecDeque<RecoveryAttempt>,
    last_analysis: Option<FailureAnalysis>,
}

/// Selects and executes recovery strategies against an operational target
pub struct RecoveryCoordinator {
    config: RecoveryConfig,
    classifier: FailureClassifier,
    target: Arc<dyn OperationalTarget>,
    inner: Mutex<CoordinatorInner>,
    execution: tokio::sync::Mutex<()>,
    telemetry: TelemetryCollector,
    shutdown: Shutdown,
}

impl RecoveryCoordinator {
    pub fn new(
        config: RecoveryConfig,
        classifier: FailureClassifier,
        target: Arc<dyn OperationalTarget>,
        ctx: &ControllerContext,
    ) -> Self {
        let inner = CoordinatorInner {
            state: CoordinatorState::Idle,
            ladder: EscalationLadder::new(config.ladder.clone()),
            consecutive_failures: 0,
            attempt_number: 0,
            history: VecDeque::with_capacity(config.history_size.max(1)),
            last_analysis: None,
        };

        Self {
            classifier,
            target,
            inner: Mutex::new(inner),
            execution: tokio::sync::Mutex::new(()),
            telemetry: ctx.telemetry.clone(),
            shutdown: ctx.shutdown.clone(),
            config,
        }
    }

    /// Handle one failed cycle: classify, select a strategy and execute it.
    ///
    /// Returns `RecoveryExhausted` only when emergency recovery itself fails.
    pub async fn handle_failure(
        &self,
        error: &OperationError,
        metrics: &SystemMetrics,
    ) -> Result<RecoveryOutcome> {
        let Ok(_exclusive) = self.execution.try_lock() else {
            debug!(error = %error, "Recovery already in progress, dropping trigger");
            return Ok(RecoveryOutcome::Skipped {
                reason: "recovery already in progress".to_string(),
            });
        };
        let _idle = IdleOnDrop { coordinator: self };

        self.advance(CoordinatorEvent::Trigger)?;
        let consecutive_failures = {
            let mut inner = self.lock_inner();
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            inner.consecutive_failures
        };

        let analysis = self.classifier.classify(error, metrics);
        let (strategy, trigger) = self.select_strategy(&analysis, consecutive_failures);
        self.lock_inner().last_analysis = Some(analysis.clone());
        self.advance(CoordinatorEvent::Selected)?;

        info!(
            strategy = %strategy,
            trigger = ?trigger,
            cause = %analysis.primary_cause,
            confidence = analysis.confidence,
            consecutive_failures,
            "Recovery strategy selected"
        );

        self.run_strategy(strategy, trigger).await
    }

    /// Run a named strategy on operator request
    pub async fn trigger_manual(&self, strategy: RecoveryStrategy) -> Result<RecoveryOutcome> {
        let Ok(_exclusive) = self.execution.try_lock() else {
            return Ok(RecoveryOutcome::Skipped {
                reason: "recovery already in progress".to_string(),
            });
        };
        let _idle = IdleOnDrop { coordinator: self };

        self.advance(CoordinatorEvent::Trigger)?;
        self.advance(CoordinatorEvent::Selected)?;
        info!(strategy = %strategy, "Manual recovery requested");

        self.run_strategy(strategy, RecoveryTrigger::Manual).await
    }

    /// A cycle succeeded: clear the failure streak and return to rung 0
    pub fn record_success(&self) {
        let mut inner = self.lock_inner();
        if inner.consecutive_failures > 0
            || inner.ladder.index() > 0
            || inner.ladder.is_exhausted()
        {
            debug!(
                consecutive_failures = inner.consecutive_failures,
                ladder_index = inner.ladder.index(),
                "Cycle succeeded, resetting escalation"
            );
        }
        reset_escalation(&mut inner);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock_inner().consecutive_failures
    }

    pub fn ladder_index(&self) -> usize {
        self.lock_inner().ladder.index()
    }

    pub fn state(&self) -> CoordinatorState {
        self.lock_inner().state
    }

    /// Whether a strategy is executing right now
    pub fn is_recovering(&self) -> bool {
        self.execution.try_lock().is_err()
    }

    /// Wait until no strategy is executing and keep new ones out until the
    /// returned guard drops
    pub async fn hold_idle(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.execution.lock().await
    }

    pub fn last_analysis(&self) -> Option<FailureAnalysis> {
        self.lock_inner().last_analysis.clone()
    }

    /// Retained attempts, oldest first
    pub fn history(&self) -> Vec<RecoveryAttempt> {
        self.lock_inner().history.iter().cloned().collect()
    }

    /// Success rate of a strategy over retained history
    pub fn success_rate(&self, strategy: RecoveryStrategy) -> Option<f64> {
        let inner = self.lock_inner();
        let (total, succeeded) = inner
            .history
            .iter()
            .filter(|a| a.strategy == strategy)
            .fold((0usize, 0usize), |(t, s), a| (t + 1, s + usize::from(a.success)));

        if total == 0 {
            None
        } else {
            Some(succeeded as f64 / total as f64)
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let inner = self.lock_inner();
        CoordinatorSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            ladder_index: inner.ladder.index(),
            ladder_exhausted: inner.ladder.is_exhausted(),
            attempts: inner.history.len(),
        }
    }

    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    fn select_strategy(
        &self,
        analysis: &FailureAnalysis,
        consecutive_failures: u32,
    ) -> (RecoveryStrategy, RecoveryTrigger) {
        if consecutive_failures > self.config.emergency_ceiling {
            warn!(
                consecutive_failures,
                ceiling = self.config.emergency_ceiling,
                "Failure ceiling exceeded"
            );
            return (RecoveryStrategy::EmergencyRecovery, RecoveryTrigger::Emergency);
        }

        if analysis.confidence >= self.config.confidence_floor
            && analysis.primary_cause != FailureCause::Unknown
            && consecutive_failures <= self.config.cause_based_tolerance
        {
            if let Some(strategy) = RecoveryStrategy::for_cause(analysis.primary_cause) {
                return (
                    strategy,
                    RecoveryTrigger::Cause {
                        cause: analysis.primary_cause,
                    },
                );
            }
        }

        match self.lock_inner().ladder.escalate() {
            Some((rung, strategy)) => (strategy, RecoveryTrigger::Escalation { rung }),
            None => {
                warn!(consecutive_failures, "Escalation ladder exhausted");
                (RecoveryStrategy::EmergencyRecovery, RecoveryTrigger::Emergency)
            }
        }
    }

    async fn run_strategy(
        &self,
        strategy: RecoveryStrategy,
        trigger: RecoveryTrigger,
    ) -> Result<RecoveryOutcome> {
        self.advance(CoordinatorEvent::Execute)?;

        let started = Instant::now();
        let result = self.execute_steps(strategy).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Err(ControllerError::Cancelled) = result {
            self.advance(CoordinatorEvent::Abort)?;
            info!(strategy = %strategy, "Recovery aborted by shutdown");
            return Err(ControllerError::Cancelled);
        }

        let attempt = {
            let mut inner = self.lock_inner();
            inner.attempt_number = inner.attempt_number.saturating_add(1);
            let attempt = RecoveryAttempt {
                id: Uuid::new_v4(),
                strategy,
                trigger,
                attempt_number: inner.attempt_number,
                success: result.is_ok(),
                duration_ms,
                error: result.as_ref().err().map(|e| e.to_string()),
                timestamp: Utc::now(),
            };

            let capacity = self.config.history_size.max(1);
            while inner.history.len() >= capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(attempt.clone());
            attempt
        };
        self.advance(CoordinatorEvent::Complete)?;

        self.telemetry.record(TelemetryEvent::RecoveryAttempted {
            strategy: strategy.to_string(),
            success: attempt.success,
            duration_ms,
            timestamp: Instant::now(),
        });

        match &result {
            Ok(()) => info!(strategy = %strategy, duration_ms, "Recovery strategy succeeded"),
            Err(e) => warn!(strategy = %strategy, error = %e, "Recovery strategy failed"),
        }

        if trigger == RecoveryTrigger::Emergency {
            self.telemetry.record(TelemetryEvent::EmergencyRecovery {
                success: attempt.success,
                timestamp: Instant::now(),
            });

            if attempt.success {
                info!("Emergency recovery succeeded, counters reset");
                reset_escalation(&mut self.lock_inner());
            } else {
                let consecutive_failures = self.consecutive_failures();
                error!(consecutive_failures, "Emergency recovery failed");
                return Err(ControllerError::RecoveryExhausted {
                    consecutive_failures,
                    reason: attempt
                        .error
                        .unwrap_or_else(|| "emergency recovery failed".to_string()),
                });
            }
        }

        Ok(if attempt.success {
            RecoveryOutcome::Recovered(attempt)
        } else {
            RecoveryOutcome::Failed(attempt)
        })
    }

    async fn execute_steps(&self, strategy: RecoveryStrategy) -> Result<()> {
        let settle = Duration::from_millis(self.config.settle_ms);
        let backoff = Duration::from_millis(self.config.backoff_ms);

        for step in strategy.steps() {
            if self.shutdown.is_triggered() {
                return Err(ControllerError::Cancelled);
            }
            debug!(strategy = %strategy, step = step.name(), "Executing recovery step");

            match step {
                RecoveryStep::RestartSession => {
                    self.cancellable(self.target.restart_session()).await
                }
                RecoveryStep::ClearCache => self.cancellable(self.target.clear_cache()).await,
                RecoveryStep::ResetNetwork => self.cancellable(self.target.reset_network()).await,
                RecoveryStep::KillStrayProcesses => {
                    self.cancellable(self.target.kill_stray_processes()).await
                }
                RecoveryStep::FullReset => self.cancellable(self.target.full_reset()).await,
                RecoveryStep::Validate => self.cancellable(self.target.validate()).await,
                RecoveryStep::Settle => self.shutdown.sleep(settle).await,
                RecoveryStep::Backoff => self.shutdown.sleep(backoff).await,
            }?;
        }

        Ok(())
    }

    async fn cancellable<F>(&self, action: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            result = action => result,
            _ = shutdown.wait() => Err(ControllerError::Cancelled),
        }
    }

    fn advance(&self, event: CoordinatorEvent) -> Result<()> {
        let (from, to) = {
            let mut inner = self.lock_inner();
            let from = inner.state;
            let to = from.transition(event)?;
            inner.state = to;
            (from, to)
        };

        if from != to {
            debug!(from = ?from, to = ?to, "Coordinator state transition");
            self.telemetry.record(TelemetryEvent::StateTransition {
                from: format!("{:?}", from),
                to: format!("{:?}", to),
                timestamp: Instant::now(),
            });
        }
        Ok(())
    }

    fn lock_inner(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the coordinator to `Idle` if a recovery future is dropped mid-flight.
/// Declared after the execution guard so it runs while exclusion is still held.
struct IdleOnDrop<'a> {
    coordinator: &'a RecoveryCoordinator,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        if self.coordinator.state().is_busy() {
            warn!("Recovery interrupted, returning to idle");
            let _ = self.coordinator.advance(CoordinatorEvent::Abort);
        }
    }
}

fn reset_escalation(inner: &mut CoordinatorInner) {
    inner.consecutive_failures = 0;
    inner.attempt_number = 0;
    inner.ladder.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::recovery::target::NoopTarget;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator_with(target: Arc<dyn OperationalTarget>) -> RecoveryCoordinator {
        let config = RecoveryConfig {
            settle_ms: 0,
            backoff_ms: 0,
            ..RecoveryConfig::default()
        };
        RecoveryCoordinator::new(
            config,
            FailureClassifier::new(),
            target,
            &ControllerContext::default(),
        )
    }

    fn unknown_error() -> OperationError {
        OperationError::unknown("element not found")
    }

    /// Target whose full reset always fails
    struct BrokenTarget {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OperationalTarget for BrokenTarget {
        async fn restart_session(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clear_cache(&self) -> Result<()> {
            Ok(())
        }

        async fn reset_network(&self) -> Result<()> {
            Ok(())
        }

        async fn kill_stray_processes(&self) -> Result<()> {
            Ok(())
        }

        async fn full_reset(&self) -> Result<()> {
            Err(ControllerError::TargetAction {
                action: "full_reset".to_string(),
                reason: "browser binary missing".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_unknown_failure_climbs_ladder() {
        let coordinator = coordinator_with(Arc::new(NoopTarget));
        let metrics = SystemMetrics::default();

        let outcome = coordinator.handle_failure(&unknown_error(), &metrics).await.unwrap();
        assert_eq!(outcome.strategy(), Some(RecoveryStrategy::QuickRestart));
        assert!(matches!(outcome, RecoveryOutcome::Recovered(_)));
        assert_eq!(coordinator.ladder_index(), 1);
        assert_eq!(coordinator.consecutive_failures(), 1);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_confident_cause_bypasses_ladder() {
        let coordinator = coordinator_with(Arc::new(NoopTarget));
        let metrics = SystemMetrics {
            browser_crashes: 1,
            ..SystemMetrics::default()
        };
        let error = OperationError::new(ErrorKind::Browser, "tab crashed");

        let outcome = coordinator.handle_failure(&error, &metrics).await.unwrap();
        assert_eq!(outcome.strategy(), Some(RecoveryStrategy::BrowserRestart));
        assert_eq!(coordinator.ladder_index(), 0);
        let analysis = coordinator.last_analysis().unwrap();
        assert_eq!(analysis.primary_cause, FailureCause::BrowserCrash);
    }

    #[tokio::test]
    async fn test_success_resets_escalation() {
        let coordinator = coordinator_with(Arc::new(NoopTarget));
        for _ in 0..3 {
            coordinator
                .handle_failure(&unknown_error(), &SystemMetrics::default())
                .await
                .unwrap();
        }
        assert_eq!(coordinator.ladder_index(), 3);

        coordinator.record_success();
        assert_eq!(coordinator.consecutive_failures(), 0);
        assert_eq!(coordinator.ladder_index(), 0);
    }

    #[tokio::test]
    async fn test_failed_emergency_is_fatal() {
        let target = Arc::new(BrokenTarget {
            calls: AtomicUsize::new(0),
        });
        let coordinator = coordinator_with(target.clone());

        let mut last = None;
        for _ in 0..6 {
            last = Some(
                coordinator
                    .handle_failure(&unknown_error(), &SystemMetrics::default())
                    .await,
            );
        }

        match last {
            Some(Err(ControllerError::RecoveryExhausted {
                consecutive_failures,
                ..
            })) => assert_eq!(consecutive_failures, 6),
            other => panic!("expected RecoveryExhausted, got {:?}", other),
        }
        assert!(target.calls.load(Ordering::SeqCst) > 0);
        assert_eq!(coordinator.success_rate(RecoveryStrategy::FullRestart), Some(0.0));
    }

    #[tokio::test]
    async fn test_manual_trigger() {
        let coordinator = coordinator_with(Arc::new(NoopTarget));
        let outcome = coordinator
            .trigger_manual(RecoveryStrategy::ResourceCleanup)
            .await
            .unwrap();

        let attempt = outcome.attempt().unwrap();
        assert_eq!(attempt.trigger, RecoveryTrigger::Manual);
        assert_eq!(coordinator.consecutive_failures(), 0);
        assert_eq!(coordinator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let config = RecoveryConfig {
            settle_ms: 0,
            backoff_ms: 0,
            history_size: 3,
            ..RecoveryConfig::default()
        };
        let coordinator = RecoveryCoordinator::new(
            config,
            FailureClassifier::new(),
            Arc::new(NoopTarget),
            &ControllerContext::default(),
        );

        for _ in 0..5 {
            coordinator
                .trigger_manual(RecoveryStrategy::QuickRestart)
                .await
                .unwrap();
        }
        assert_eq!(coordinator.history().len(), 3);
        assert_eq!(coordinator.success_rate(RecoveryStrategy::QuickRestart), Some(1.0));
        assert_eq!(coordinator.success_rate(RecoveryStrategy::FullRestart), None);
    }
}
