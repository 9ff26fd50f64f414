//! Failure classification and escalating recovery
//!
//! Classifies each failed cycle, picks a cause-specific strategy or the
//! next escalation rung, and sequences the strategy's actions against the
//! operational target.

pub mod classifier;
pub mod coordinator;
pub mod ladder;
pub mod metrics;
pub mod target;
pub mod types;

pub use classifier::{default_rules, ClassifierRule, FailureClassifier, RuleCondition};
pub use coordinator::{CoordinatorSnapshot, RecoveryCoordinator};
pub use ladder::{default_rungs, EscalationLadder, LadderRung};
pub use metrics::FailureStats;
pub use target::{NoopTarget, OperationalTarget};
pub use types::{
    CoordinatorEvent, CoordinatorState, FailureAnalysis, FailureCause, PossibleCause,
    RecoveryAttempt, RecoveryOutcome, RecoveryStep, RecoveryStrategy, RecoveryTrigger,
    SystemMetrics,
};
