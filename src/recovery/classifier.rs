//! Rule-table failure classifier
//!
//! Maps an operation error plus current system metrics to a probable cause.
//! Rules are evaluated in priority order; the first match is the primary
//! cause and every match is listed as a possible cause.

use crate::errors::{ErrorKind, OperationError};
use crate::recovery::types::{FailureAnalysis, FailureCause, PossibleCause, SystemMetrics};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Condition under which a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "when")]
pub enum RuleCondition {
    /// Error message contains any keyword (case-insensitive)
    MessageContains { keywords: Vec<String> },
    /// Operation layer supplied this classification hint
    HintIs { kind: ErrorKind },
    MemoryAbove { percent: f64 },
    CpuAbove { percent: f64 },
    NetworkFailuresAbove { count: u32 },
    BrowserCrashesAbove { count: u32 },
    ServiceErrorsAbove { count: u32 },
    /// Every nested condition holds
    AllOf { conditions: Vec<RuleCondition> },
}

impl RuleCondition {
    /// Evaluate against an error and metrics snapshot
    pub fn matches(&self, error: &OperationError, metrics: &SystemMetrics) -> bool {
        match self {
            RuleCondition::MessageContains { keywords } => {
                let message = error.message.to_lowercase();
                keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .any(|k| message.contains(&k.to_lowercase()))
            }
            RuleCondition::HintIs { kind } => error.kind == *kind,
            RuleCondition::MemoryAbove { percent } => metrics.memory_percent > *percent,
            RuleCondition::CpuAbove { percent } => metrics.cpu_percent > *percent,
            RuleCondition::NetworkFailuresAbove { count } => metrics.network_failures > *count,
            RuleCondition::BrowserCrashesAbove { count } => metrics.browser_crashes > *count,
            RuleCondition::ServiceErrorsAbove { count } => metrics.service_errors > *count,
            RuleCondition::AllOf { conditions } => {
                !conditions.is_empty() && conditions.iter().all(|c| c.matches(error, metrics))
            }
        }
    }
}

/// One row of the classifier rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub name: String,
    pub cause: FailureCause,
    pub confidence: f64,
    pub condition: RuleCondition,
}

impl ClassifierRule {
    /// Create a rule
    pub fn new(
        name: impl Into<String>,
        cause: FailureCause,
        confidence: f64,
        condition: RuleCondition,
    ) -> Self {
        Self {
            name: name.into(),
            cause,
            confidence,
            condition,
        }
    }
}

fn keywords(words: &[&str]) -> RuleCondition {
    RuleCondition::MessageContains {
        keywords: words.iter().map(|w| w.to_string()).collect(),
    }
}

/// Default rule table, highest priority first
pub fn default_rules() -> Vec<ClassifierRule> {
    vec![
        ClassifierRule::new(
            "memory_pressure",
            FailureCause::ResourceExhaustion,
            0.85,
            RuleCondition::MemoryAbove { percent: 90.0 },
        ),
        ClassifierRule::new(
            "repeated_network_failures",
            FailureCause::NetworkIssue,
            0.80,
            RuleCondition::NetworkFailuresAbove { count: 3 },
        ),
        ClassifierRule::new(
            "recent_browser_crash",
            FailureCause::BrowserCrash,
            0.75,
            RuleCondition::BrowserCrashesAbove { count: 0 },
        ),
        ClassifierRule::new(
            "service_refusing",
            FailureCause::ServiceUnavailable,
            0.75,
            RuleCondition::ServiceErrorsAbove { count: 2 },
        ),
        ClassifierRule::new(
            "resource_hint",
            FailureCause::ResourceExhaustion,
            0.70,
            RuleCondition::HintIs {
                kind: ErrorKind::Resource,
            },
        ),
        ClassifierRule::new(
            "service_message",
            FailureCause::ServiceUnavailable,
            0.70,
            keywords(&[
                "503",
                "service unavailable",
                "maintenance",
                "rate limit",
                "too many requests",
            ]),
        ),
        ClassifierRule::new(
            "crash_message",
            FailureCause::BrowserCrash,
            0.65,
            keywords(&["crash", "target closed", "session deleted", "disconnected"]),
        ),
        ClassifierRule::new(
            "network_message",
            FailureCause::NetworkIssue,
            0.60,
            keywords(&["timeout", "timed out", "network", "connection", "dns"]),
        ),
        ClassifierRule::new(
            "resource_message",
            FailureCause::ResourceExhaustion,
            0.60,
            keywords(&["out of memory", "no space left", "too many open files"]),
        ),
    ]
}

/// Failure classifier over a priority-ordered rule table
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    rules: Vec<ClassifierRule>,
}

impl FailureClassifier {
    /// Create classifier with the default rule table
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    /// Create classifier with a custom rule table
    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Classify a failure. Never fails: no match yields `unknown` at confidence 0.
    pub fn classify(&self, error: &OperationError, metrics: &SystemMetrics) -> FailureAnalysis {
        let mut possible_causes: Vec<PossibleCause> = Vec::new();

        for rule in &self.rules {
            if !rule.confidence.is_finite() || !rule.condition.matches(error, metrics) {
                continue;
            }
            if possible_causes.iter().any(|p| p.cause == rule.cause) {
                continue;
            }
            possible_causes.push(PossibleCause {
                cause: rule.cause,
                confidence: rule.confidence.clamp(0.0, 1.0),
                rule: rule.name.clone(),
            });
        }

        let analysis = match possible_causes.first() {
            Some(primary) => FailureAnalysis {
                primary_cause: primary.cause,
                confidence: primary.confidence,
                possible_causes: possible_causes.clone(),
            },
            None => FailureAnalysis::unknown(),
        };

        debug!(
            cause = %analysis.primary_cause,
            confidence = analysis.confidence,
            candidates = analysis.possible_causes.len(),
            "classified failure"
        );

        analysis
    }

    /// Get rule table
    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}
