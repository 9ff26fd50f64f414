//! Per-cycle outcome types exchanged with the operation layer

use crate::errors::OperationError;
use serde::{Deserialize, Serialize};

/// What a successful cycle reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Optional quality observation in `[0, 1]`
    pub performance: Option<f64>,
}

impl CycleReport {
    /// Report carrying a performance observation
    pub fn with_performance(performance: f64) -> Self {
        Self {
            performance: Some(performance),
        }
    }
}

/// Outcome event for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub success: bool,
    pub error: Option<OperationError>,

    /// Performance observation; success/failure stand in when absent
    pub performance: Option<f64>,
    pub duration_ms: u64,
}

impl CycleOutcome {
    /// Successful cycle
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
            performance: None,
            duration_ms: 0,
        }
    }

    /// Failed cycle
    pub fn failure(error: OperationError) -> Self {
        Self {
            success: false,
            error: Some(error),
            performance: None,
            duration_ms: 0,
        }
    }

    /// Build from the operation's result
    pub fn from_result(
        result: std::result::Result<CycleReport, OperationError>,
        duration_ms: u64,
    ) -> Self {
        match result {
            Ok(report) => Self {
                success: true,
                error: None,
                performance: report.performance,
                duration_ms,
            },
            Err(error) => Self {
                success: false,
                error: Some(error),
                performance: None,
                duration_ms,
            },
        }
    }

    /// Performance observation in `[0, 1]`
    pub fn performance_observation(&self) -> f64 {
        match self.performance {
            Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
            _ if self.success => 1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_from_result() {
        let ok = CycleOutcome::from_result(Ok(CycleReport::with_performance(0.4)), 12);
        assert!(ok.success);
        assert_eq!(ok.duration_ms, 12);
        assert!((ok.performance_observation() - 0.4).abs() < 1e-9);

        let err = CycleOutcome::from_result(
            Err(OperationError::new(ErrorKind::Network, "reset")),
            5,
        );
        assert!(!err.success);
        assert_eq!(err.performance_observation(), 0.0);
    }

    #[test]
    fn test_performance_defaults() {
        assert_eq!(CycleOutcome::success().performance_observation(), 1.0);
        let mut outcome = CycleOutcome::success();
        outcome.performance = Some(3.0);
        assert_eq!(outcome.performance_observation(), 1.0);
        outcome.performance = Some(f64::NAN);
        assert_eq!(outcome.performance_observation(), 1.0);
    }
}
