//! Health monitoring type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Aggregated system status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// The check itself could not be evaluated
    Emergency,
}

impl OverallStatus {
    /// Status for a number of unhealthy components
    pub fn from_unhealthy_count(unhealthy: usize) -> Self {
        match unhealthy {
            0 => OverallStatus::Healthy,
            1..=2 => OverallStatus::Degraded,
            _ => OverallStatus::Unhealthy,
        }
    }

    /// Get status name
    pub fn name(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
            OverallStatus::Emergency => "emergency",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of resource a probe watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    Memory,
    Cpu,
    Disk,
    Network,
    Service,
}

/// Raw probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub healthy: bool,
    pub metric_value: f64,
    pub detail: String,
}

impl ProbeReading {
    /// Reading compared against a ceiling (healthy while `value <= ceiling`)
    pub fn against_ceiling(value: f64, ceiling: f64, unit: &str) -> Self {
        let healthy = value.is_finite() && value <= ceiling;
        Self {
            healthy,
            metric_value: value,
            detail: format!("{:.1}{} (limit {:.1}{})", value, unit, ceiling, unit),
        }
    }
}

/// Health of one component inside a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub category: ProbeCategory,
    pub healthy: bool,
    pub metric_value: Option<f64>,
    pub detail: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ComponentHealth {
    /// Component whose probe returned a reading
    pub fn from_reading(category: ProbeCategory, reading: ProbeReading, duration_ms: u64) -> Self {
        Self {
            category,
            healthy: reading.healthy,
            metric_value: Some(reading.metric_value),
            detail: Some(reading.detail),
            error: None,
            duration_ms,
        }
    }

    /// Component whose probe could not run
    pub fn failed(category: ProbeCategory, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            category,
            healthy: false,
            metric_value: None,
            detail: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Snapshot produced by one full health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentHealth>,
    pub overall_status: OverallStatus,

    /// Percentage of healthy components (0-100)
    pub health_score: f64,
    pub unhealthy_components: Vec<String>,

    /// Why the report is an emergency sentinel
    pub emergency_reason: Option<String>,
}

impl HealthReport {
    /// Aggregate component results into a report
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        if components.is_empty() {
            return Self::emergency("no health probes registered");
        }

        let total = components.len();
        let unhealthy_components: Vec<String> = components
            .iter()
            .filter(|(_, c)| !c.healthy)
            .map(|(name, _)| name.clone())
            .collect();
        let healthy = total - unhealthy_components.len();
        let health_score = (100.0 * healthy as f64 / total as f64).clamp(0.0, 100.0);

        Self {
            timestamp: Utc::now(),
            overall_status: OverallStatus::from_unhealthy_count(unhealthy_components.len()),
            health_score,
            unhealthy_components,
            components,
            emergency_reason: None,
        }
    }

    /// Sentinel report for a check that could not be evaluated
    pub fn emergency(reason: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            components: BTreeMap::new(),
            overall_status: OverallStatus::Emergency,
            health_score: 0.0,
            unhealthy_components: Vec::new(),
            emergency_reason: Some(reason.into()),
        }
    }

    /// Report assumed before the first check has run
    pub fn assumed_healthy() -> Self {
        Self {
            timestamp: Utc::now(),
            components: BTreeMap::new(),
            overall_status: OverallStatus::Healthy,
            health_score: 100.0,
            unhealthy_components: Vec::new(),
            emergency_reason: None,
        }
    }

    /// Health score scaled to `[0, 1]`
    pub fn normalized_score(&self) -> f64 {
        (self.health_score / 100.0).clamp(0.0, 1.0)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == OverallStatus::Healthy
    }

    /// First metric reported by a component of the given category
    pub fn metric_for(&self, category: ProbeCategory) -> Option<f64> {
        self.components
            .values()
            .filter(|c| c.category == category)
            .find_map(|c| c.metric_value)
    }
}

/// Result of the fast subset check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickHealth {
    pub healthy: bool,
    pub checked: Vec<String>,
    pub failing: Vec<String>,
}

/// Direction of recent health scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthTrend {
    Improving,
    Stable,
    Declining,
}
