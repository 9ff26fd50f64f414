//! Timing system type definitions

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily progress phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Early,
    Mid,
    Late,
}

impl Phase {
    /// Phase for a daily progress ratio (achieved / target)
    pub fn from_progress(progress: f64) -> Self {
        if progress < 0.25 {
            Phase::Early
        } else if progress <= 0.75 {
            Phase::Mid
        } else {
            Phase::Late
        }
    }
}

/// Rolling factors driving timing decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationState {
    pub current_phase: Phase,

    /// Success rate over the outcome window, `[0, 1]`
    pub success_rate: f64,

    /// Latest health score scaled to `[0, 1]`
    pub system_health: f64,

    /// Smoothed per-cycle performance, `[0, 1]`
    pub performance_score: f64,
    pub last_adjustment: Option<NaiveDateTime>,
    pub adjustment_count: u64,
}

impl Default for AdaptationState {
    fn default() -> Self {
        Self {
            current_phase: Phase::Early,
            success_rate: 1.0,
            system_health: 1.0,
            performance_score: 1.0,
            last_adjustment: None,
            adjustment_count: 0,
        }
    }
}

/// Kinds of timing regularity pattern avoidance reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Too few distinct values
    Repetition,
    /// Strictly increasing or decreasing
    Sequence,
    /// Near-constant spacing between consecutive waits
    RegularSpacing,
}

impl PatternKind {
    /// Fixed confidence reported with each detection
    pub fn confidence(&self) -> f64 {
        match self {
            PatternKind::Repetition => 0.85,
            PatternKind::Sequence => 0.80,
            PatternKind::RegularSpacing => 0.75,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Repetition => "repetition",
            PatternKind::Sequence => "sequence",
            PatternKind::RegularSpacing => "regular_spacing",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pattern detection result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternDetection {
    pub detected: bool,
    pub kind: Option<PatternKind>,
    pub confidence: f64,
}

impl PatternDetection {
    pub fn none() -> Self {
        Self {
            detected: false,
            kind: None,
            confidence: 0.0,
        }
    }

    pub fn found(kind: PatternKind) -> Self {
        Self {
            detected: true,
            kind: Some(kind),
            confidence: kind.confidence(),
        }
    }
}

/// Every multiplier applied while computing one wait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingFactors {
    pub phase: f64,
    pub success_rate: f64,
    pub health: f64,
    pub time_of_day: f64,
    pub backoff: f64,
    pub jitter: f64,
    pub pattern: f64,
    pub escalation: f64,
    pub target_seeking: f64,
}

impl Default for TimingFactors {
    fn default() -> Self {
        Self {
            phase: 1.0,
            success_rate: 1.0,
            health: 1.0,
            time_of_day: 1.0,
            backoff: 1.0,
            jitter: 1.0,
            pattern: 1.0,
            escalation: 1.0,
            target_seeking: 1.0,
        }
    }
}

/// One computed wait with its derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub timestamp: NaiveDateTime,
    pub base_secs: f64,

    /// After phase, success-rate, health and time-of-day adaptation
    pub adapted_secs: f64,

    /// After the recovery-algorithm chain
    pub recovered_secs: f64,

    /// After the safety clamp
    pub final_secs: f64,
    pub factors: TimingFactors,
    pub phase: Phase,
    pub pattern: Option<PatternKind>,
    pub consecutive_failures: u32,
}

/// Summary over the timing memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStatistics {
    pub samples: usize,
    pub mean_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
    pub std_dev_secs: f64,
    pub pattern_interventions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_bands() {
        assert_eq!(Phase::from_progress(0.0), Phase::Early);
        assert_eq!(Phase::from_progress(0.24), Phase::Early);
        assert_eq!(Phase::from_progress(0.25), Phase::Mid);
        assert_eq!(Phase::from_progress(0.75), Phase::Mid);
        assert_eq!(Phase::from_progress(0.76), Phase::Late);
        assert_eq!(Phase::from_progress(3.0), Phase::Late);
    }

    #[test]
    fn test_pattern_confidences() {
        assert!(PatternKind::Repetition.confidence() >= 0.75);
        assert!(PatternKind::Sequence.confidence() >= 0.75);
        assert!(PatternKind::RegularSpacing.confidence() >= 0.75);
        assert!(!PatternDetection::none().detected);
        assert_eq!(
            PatternDetection::found(PatternKind::Sequence).kind,
            Some(PatternKind::Sequence)
        );
    }
}
