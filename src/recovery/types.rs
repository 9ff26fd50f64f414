//! Recovery system type definitions

use crate::errors::{ControllerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Probable cause of a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    BrowserCrash,
    NetworkIssue,
    ServiceUnavailable,
    ResourceExhaustion,
    Unknown,
}

impl FailureCause {
    /// Get cause name
    pub fn name(&self) -> &'static str {
        match self {
            FailureCause::BrowserCrash => "browser_crash",
            FailureCause::NetworkIssue => "network_issue",
            FailureCause::ServiceUnavailable => "service_unavailable",
            FailureCause::ResourceExhaustion => "resource_exhaustion",
            FailureCause::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// System metrics consulted by the failure classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Memory usage percentage (0-100)
    pub memory_percent: f64,

    /// CPU usage percentage (0-100)
    pub cpu_percent: f64,

    /// Network failures inside the recent failure window
    pub network_failures: u32,

    /// Crashes of the driven subsystem inside the recent failure window
    pub browser_crashes: u32,

    /// Service-unavailable responses inside the recent failure window
    pub service_errors: u32,
}

/// One cause the classifier considered plausible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossibleCause {
    pub cause: FailureCause,
    pub confidence: f64,
    pub rule: String,
}

/// Result of classifying one failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub primary_cause: FailureCause,
    pub confidence: f64,
    pub possible_causes: Vec<PossibleCause>,
}

impl FailureAnalysis {
    /// Analysis used when no rule matched
    pub fn unknown() -> Self {
        Self {
            primary_cause: FailureCause::Unknown,
            confidence: 0.0,
            possible_causes: Vec::new(),
        }
    }
}

/// Recovery strategies, from least to most invasive for the ladder rungs,
/// followed by the cause-specific and out-of-band strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    QuickRestart,
    ComponentReset,
    CleanupResources,
    AlternativeMethods,
    FullRestart,
    BrowserRestart,
    NetworkReset,
    ResourceCleanup,
    WaitAndRetry,
    EmergencyRecovery,
}

impl RecoveryStrategy {
    /// Default escalation order
    pub fn ladder_order() -> Vec<RecoveryStrategy> {
        vec![
            RecoveryStrategy::QuickRestart,
            RecoveryStrategy::ComponentReset,
            RecoveryStrategy::CleanupResources,
            RecoveryStrategy::AlternativeMethods,
            RecoveryStrategy::FullRestart,
        ]
    }

    /// Strategy mapped directly from a confidently classified cause
    pub fn for_cause(cause: FailureCause) -> Option<RecoveryStrategy> {
        match cause {
            FailureCause::BrowserCrash => Some(RecoveryStrategy::BrowserRestart),
            FailureCause::NetworkIssue => Some(RecoveryStrategy::NetworkReset),
            FailureCause::ResourceExhaustion => Some(RecoveryStrategy::ResourceCleanup),
            FailureCause::ServiceUnavailable => Some(RecoveryStrategy::WaitAndRetry),
            FailureCause::Unknown => None,
        }
    }

    /// Ordered steps this strategy executes against the operational target
    pub fn steps(&self) -> Vec<RecoveryStep> {
        use RecoveryStep::*;

        match self {
            RecoveryStrategy::QuickRestart => vec![RestartSession, Settle],
            RecoveryStrategy::ComponentReset => vec![ClearCache, RestartSession, Settle],
            RecoveryStrategy::CleanupResources => vec![KillStrayProcesses, ClearCache, Settle],
            RecoveryStrategy::AlternativeMethods => {
                vec![ResetNetwork, ClearCache, RestartSession, Settle]
            }
            RecoveryStrategy::FullRestart => vec![FullReset, Settle, Validate],
            RecoveryStrategy::BrowserRestart => vec![KillStrayProcesses, RestartSession, Settle],
            RecoveryStrategy::NetworkReset => vec![ResetNetwork, Settle, Validate],
            RecoveryStrategy::ResourceCleanup => vec![ClearCache, KillStrayProcesses, Settle],
            RecoveryStrategy::WaitAndRetry => vec![Backoff],
            RecoveryStrategy::EmergencyRecovery => vec![
                KillStrayProcesses,
                ClearCache,
                FullReset,
                Settle,
                Validate,
            ],
        }
    }

    /// Get strategy name
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryStrategy::QuickRestart => "quick_restart",
            RecoveryStrategy::ComponentReset => "component_reset",
            RecoveryStrategy::CleanupResources => "cleanup_resources",
            RecoveryStrategy::AlternativeMethods => "alternative_methods",
            RecoveryStrategy::FullRestart => "full_restart",
            RecoveryStrategy::BrowserRestart => "browser_restart",
            RecoveryStrategy::NetworkReset => "network_reset",
            RecoveryStrategy::ResourceCleanup => "resource_cleanup",
            RecoveryStrategy::WaitAndRetry => "wait_and_retry",
            RecoveryStrategy::EmergencyRecovery => "emergency_recovery",
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single action inside a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    RestartSession,
    ClearCache,
    ResetNetwork,
    KillStrayProcesses,
    FullReset,
    /// Short pause letting the target settle
    Settle,
    /// Long pause before retrying a refusing service
    Backoff,
    /// Ask the target whether it is usable again
    Validate,
}

impl RecoveryStep {
    /// Action name as reported in errors
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryStep::RestartSession => "restart_session",
            RecoveryStep::ClearCache => "clear_cache",
            RecoveryStep::ResetNetwork => "reset_network",
            RecoveryStep::KillStrayProcesses => "kill_stray_processes",
            RecoveryStep::FullReset => "full_reset",
            RecoveryStep::Settle => "settle",
            RecoveryStep::Backoff => "backoff",
            RecoveryStep::Validate => "validate",
        }
    }
}

/// What caused a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RecoveryTrigger {
    /// Confident classification mapped straight to a strategy
    Cause { cause: FailureCause },
    /// Escalation ladder rung
    Escalation { rung: usize },
    /// Operator request
    Manual,
    /// Ladder exhausted or failure ceiling exceeded
    Emergency,
}

/// Record of one executed recovery strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub id: Uuid,
    pub strategy: RecoveryStrategy,
    pub trigger: RecoveryTrigger,
    pub attempt_number: u32,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of handing one failure event to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Strategy ran and every step succeeded
    Recovered(RecoveryAttempt),
    /// Strategy ran but a step failed; the next failure escalates
    Failed(RecoveryAttempt),
    /// Another recovery held the lock; this trigger was dropped
    Skipped { reason: String },
}

impl RecoveryOutcome {
    /// Attempt record, when a strategy actually ran
    pub fn attempt(&self) -> Option<&RecoveryAttempt> {
        match self {
            RecoveryOutcome::Recovered(attempt) | RecoveryOutcome::Failed(attempt) => Some(attempt),
            RecoveryOutcome::Skipped { .. } => None,
        }
    }

    /// Strategy that ran, if any
    pub fn strategy(&self) -> Option<RecoveryStrategy> {
        self.attempt().map(|a| a.strategy)
    }
}

/// Coordinator states per failure event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinatorState {
    Idle,
    Classifying,
    StrategySelected,
    Executing,
}

/// Events driving coordinator transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Failure or manual trigger accepted
    Trigger,
    /// Classification finished and a strategy was picked
    Selected,
    /// Strategy execution started
    Execute,
    /// Execution finished (success or failure)
    Complete,
    /// Execution interrupted by shutdown
    Abort,
}

impl CoordinatorState {
    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    /// ```text
    /// 1. Idle             -> Classifying      (on: Trigger)
    /// 2. Classifying      -> StrategySelected (on: Selected)
    /// 3. StrategySelected -> Executing        (on: Execute)
    /// 4. Executing        -> Idle             (on: Complete)
    /// 5. *                -> Idle             (on: Abort)
    /// ```
    pub fn transition(&self, event: CoordinatorEvent) -> Result<CoordinatorState> {
        use CoordinatorEvent::*;
        use CoordinatorState::*;

        if event == Abort {
            return Ok(Idle);
        }

        let next_state = match (self, event) {
            (Idle, Trigger) => Classifying,
            (Classifying, Selected) => StrategySelected,
            (StrategySelected, Execute) => Executing,
            (Executing, Complete) => Idle,
            (from, event) => {
                return Err(ControllerError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Whether a recovery is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, CoordinatorState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order() {
        let ladder = RecoveryStrategy::ladder_order();
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder[0], RecoveryStrategy::QuickRestart);
        assert_eq!(ladder[4], RecoveryStrategy::FullRestart);
    }

    #[test]
    fn test_cause_mapping() {
        assert_eq!(
            RecoveryStrategy::for_cause(FailureCause::NetworkIssue),
            Some(RecoveryStrategy::NetworkReset)
        );
        assert_eq!(
            RecoveryStrategy::for_cause(FailureCause::ServiceUnavailable),
            Some(RecoveryStrategy::WaitAndRetry)
        );
        assert_eq!(RecoveryStrategy::for_cause(FailureCause::Unknown), None);
    }

    #[test]
    fn test_emergency_steps_end_with_validation() {
        let steps = RecoveryStrategy::EmergencyRecovery.steps();
        assert_eq!(steps.first(), Some(&RecoveryStep::KillStrayProcesses));
        assert_eq!(steps.last(), Some(&RecoveryStep::Validate));
        assert!(steps.contains(&RecoveryStep::FullReset));
    }

    #[test]
    fn test_valid_transitions() {
        let state = CoordinatorState::Idle;
        let state = state.transition(CoordinatorEvent::Trigger).unwrap();
        assert_eq!(state, CoordinatorState::Classifying);
        let state = state.transition(CoordinatorEvent::Selected).unwrap();
        assert_eq!(state, CoordinatorState::StrategySelected);
        let state = state.transition(CoordinatorEvent::Execute).unwrap();
        assert_eq!(state, CoordinatorState::Executing);
        let state = state.transition(CoordinatorEvent::Complete).unwrap();
        assert_eq!(state, CoordinatorState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(CoordinatorState::Idle
            .transition(CoordinatorEvent::Execute)
            .is_err());
        assert!(CoordinatorState::Executing
            .transition(CoordinatorEvent::Trigger)
            .is_err());
    }

    #[test]
    fn test_abort_from_any_state() {
        for state in [
            CoordinatorState::Idle,
            CoordinatorState::Classifying,
            CoordinatorState::StrategySelected,
            CoordinatorState::Executing,
        ] {
            assert_eq!(
                state.transition(CoordinatorEvent::Abort).unwrap(),
                CoordinatorState::Idle
            );
        }
    }

    #[test]
    fn test_trigger_serialization() {
        let trigger = RecoveryTrigger::Cause {
            cause: FailureCause::NetworkIssue,
        };
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains("network_issue"));
    }
}
