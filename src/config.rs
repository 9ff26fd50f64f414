//! Configuration management for cyclekeeper
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.cyclekeeper/config.toml

use crate::errors::{ControllerError, Result};
use crate::recovery::classifier::{default_rules, ClassifierRule};
use crate::recovery::ladder::{default_rungs, LadderRung};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

/// Wait computation configuration (all durations in seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub min_wait_secs: f64,
    pub max_wait_secs: f64,

    /// Successful cycles targeted per calendar day
    pub daily_target: u32,
    pub early_multiplier: f64,
    pub mid_multiplier: f64,
    pub late_multiplier: f64,

    pub success_low_threshold: f64,
    pub success_high_threshold: f64,
    pub health_threshold: f64,

    /// Hours (0-23) that carry the peak penalty
    pub peak_hours: Vec<u32>,
    pub peak_penalty: f64,
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub night_discount: f64,

    pub backoff_base: f64,
    pub jitter_ratio: f64,

    pub pattern_window: usize,
    pub pattern_confidence_floor: f64,
    pub regular_spacing_variance: f64,
    pub repetition_multiplier: f64,
    pub sequence_multiplier: f64,
    pub regular_spacing_multiplier: f64,

    pub unhealthy_multiplier: f64,
    pub degraded_multiplier: f64,

    pub target_success_rate: f64,
    pub target_min_multiplier: f64,

    /// Below this success rate the safety floor is raised
    pub low_success_floor_rate: f64,
    /// More failures than this in the pattern window raise the safety floor
    pub recent_failure_limit: usize,
    pub safety_floor_multiplier: f64,

    pub history_capacity: usize,
    pub outcome_window: usize,
    pub performance_smoothing: f64,

    /// Fixed RNG seed for reproducible waits
    pub seed: Option<u64>,
}

/// Health monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub max_memory_percent: f64,
    pub max_cpu_percent: f64,
    pub max_disk_percent: f64,
    pub disk_path: String,

    /// host:port pairs probed with a TCP connect
    pub network_targets: Vec<String>,
    pub max_latency_ms: u64,
    pub min_reachable_targets: usize,

    pub services: Vec<ServiceEndpoint>,

    pub probe_timeout_ms: u64,
    pub quick_timeout_ms: u64,
    pub check_deadline_ms: u64,
    pub check_interval_secs: u64,
    pub history_size: usize,
}

/// Dependent service probed over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
}

/// Recovery coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub ladder: Vec<LadderRung>,

    /// Minimum classifier confidence for cause-based strategies
    pub confidence_floor: f64,

    /// Consecutive failures after which cause-based strategies give way to the ladder
    pub cause_based_tolerance: u32,

    /// Consecutive failures that force emergency recovery
    pub emergency_ceiling: u32,

    pub settle_ms: u64,
    pub backoff_ms: u64,
    pub history_size: usize,
    pub failure_window_secs: u64,
}

/// Failure classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub rules: Vec<ClassifierRule>,
}

/// Cycle loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Stop after this many cycles (runs until shutdown when unset)
    pub max_cycles: Option<u64>,
    pub operation_timeout_secs: u64,
    pub run_health_monitor: bool,
}

/// Shell commands run for each recovery action of the command target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub restart_session: Option<String>,
    pub clear_cache: Option<String>,
    pub reset_network: Option<String>,
    pub kill_stray_processes: Option<String>,
    pub full_reset: Option<String>,
    pub validate: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_wait_secs: 60.0,
            max_wait_secs: 180.0,
            daily_target: 40,
            early_multiplier: 0.9,
            mid_multiplier: 1.0,
            late_multiplier: 1.15,
            success_low_threshold: 0.7,
            success_high_threshold: 0.9,
            health_threshold: 0.7,
            peak_hours: vec![9, 10, 11, 12, 13, 14, 15, 16, 17],
            peak_penalty: 1.3,
            night_start_hour: 23,
            night_end_hour: 6,
            night_discount: 0.8,
            backoff_base: 1.5,
            jitter_ratio: 0.2,
            pattern_window: 5,
            pattern_confidence_floor: 0.75,
            regular_spacing_variance: 5.0,
            repetition_multiplier: 1.3,
            sequence_multiplier: 0.7,
            regular_spacing_multiplier: 1.2,
            unhealthy_multiplier: 1.5,
            degraded_multiplier: 1.2,
            target_success_rate: 0.85,
            target_min_multiplier: 0.7,
            low_success_floor_rate: 0.6,
            recent_failure_limit: 2,
            safety_floor_multiplier: 1.5,
            history_capacity: 100,
            outcome_window: 20,
            performance_smoothing: 0.2,
            seed: None,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_memory_percent: 85.0,
            max_cpu_percent: 90.0,
            max_disk_percent: 90.0,
            disk_path: "/".to_string(),
            network_targets: vec!["1.1.1.1:443".to_string(), "8.8.8.8:53".to_string()],
            max_latency_ms: 2000,
            min_reachable_targets: 1,
            services: Vec::new(),
            probe_timeout_ms: 5000,
            quick_timeout_ms: 1500,
            check_deadline_ms: 15000,
            check_interval_secs: 300,
            history_size: 50,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            ladder: default_rungs(),
            confidence_floor: 0.7,
            cause_based_tolerance: 3,
            emergency_ceiling: 10,
            settle_ms: 2000,
            backoff_ms: 30000,
            history_size: 50,
            failure_window_secs: 900,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            operation_timeout_secs: 300,
            run_health_monitor: true,
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            restart_session: None,
            clear_cache: None,
            reset_network: None,
            kill_stray_processes: None,
            full_reset: None,
            validate: None,
            timeout_secs: 60,
        }
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ControllerError::ConfigError(format!(
            "{} must be between 0.0 and 1.0",
            name
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ControllerError::ConfigError(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

fn check_percent(name: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ControllerError::ConfigError(format!(
            "{} must be between 0 and 100",
            name
        )));
    }
    Ok(())
}

impl TimingConfig {
    /// Validate timing values
    pub fn validate(&self) -> Result<()> {
        check_positive("min_wait_secs", self.min_wait_secs)?;
        check_positive("max_wait_secs", self.max_wait_secs)?;
        if self.max_wait_secs < self.min_wait_secs {
            return Err(ControllerError::ConfigError(
                "max_wait_secs must not be less than min_wait_secs".to_string(),
            ));
        }

        for (name, value) in [
            ("early_multiplier", self.early_multiplier),
            ("mid_multiplier", self.mid_multiplier),
            ("late_multiplier", self.late_multiplier),
            ("peak_penalty", self.peak_penalty),
            ("night_discount", self.night_discount),
            ("backoff_base", self.backoff_base),
            ("repetition_multiplier", self.repetition_multiplier),
            ("sequence_multiplier", self.sequence_multiplier),
            ("regular_spacing_multiplier", self.regular_spacing_multiplier),
            ("unhealthy_multiplier", self.unhealthy_multiplier),
            ("degraded_multiplier", self.degraded_multiplier),
            ("target_min_multiplier", self.target_min_multiplier),
            ("safety_floor_multiplier", self.safety_floor_multiplier),
        ] {
            check_positive(name, value)?;
        }

        for (name, value) in [
            ("success_low_threshold", self.success_low_threshold),
            ("success_high_threshold", self.success_high_threshold),
            ("health_threshold", self.health_threshold),
            ("jitter_ratio", self.jitter_ratio),
            ("pattern_confidence_floor", self.pattern_confidence_floor),
            ("target_success_rate", self.target_success_rate),
            ("low_success_floor_rate", self.low_success_floor_rate),
            ("performance_smoothing", self.performance_smoothing),
        ] {
            check_unit(name, value)?;
        }

        if self.success_low_threshold > self.success_high_threshold {
            return Err(ControllerError::ConfigError(
                "success_low_threshold must not exceed success_high_threshold".to_string(),
            ));
        }

        if self.daily_target == 0 {
            return Err(ControllerError::ConfigError(
                "daily_target must be greater than 0".to_string(),
            ));
        }

        if self.history_capacity == 0 || self.outcome_window == 0 {
            return Err(ControllerError::ConfigError(
                "history_capacity and outcome_window must be greater than 0".to_string(),
            ));
        }

        if self.pattern_window < 3 || self.pattern_window > self.history_capacity {
            return Err(ControllerError::ConfigError(
                "pattern_window must be between 3 and history_capacity".to_string(),
            ));
        }

        if self.regular_spacing_variance < 0.0 {
            return Err(ControllerError::ConfigError(
                "regular_spacing_variance must not be negative".to_string(),
            ));
        }

        if let Some(hour) = self
            .peak_hours
            .iter()
            .chain([&self.night_start_hour, &self.night_end_hour])
            .find(|h| **h > 23)
        {
            return Err(ControllerError::ConfigError(format!(
                "Invalid hour of day: {}",
                hour
            )));
        }

        Ok(())
    }
}

impl HealthConfig {
    /// Validate health thresholds
    pub fn validate(&self) -> Result<()> {
        check_percent("max_memory_percent", self.max_memory_percent)?;
        check_percent("max_cpu_percent", self.max_cpu_percent)?;
        check_percent("max_disk_percent", self.max_disk_percent)?;

        if self.min_reachable_targets > self.network_targets.len() {
            return Err(ControllerError::ConfigError(
                "min_reachable_targets exceeds the number of network_targets".to_string(),
            ));
        }

        if self.probe_timeout_ms == 0 || self.quick_timeout_ms == 0 || self.check_deadline_ms == 0 {
            return Err(ControllerError::ConfigError(
                "probe timeouts must be greater than 0".to_string(),
            ));
        }

        if self.history_size == 0 {
            return Err(ControllerError::ConfigError(
                "history_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl RecoveryConfig {
    /// Validate recovery settings
    pub fn validate(&self) -> Result<()> {
        if self.ladder.is_empty() {
            return Err(ControllerError::ConfigError(
                "escalation ladder must have at least one rung".to_string(),
            ));
        }

        if self.ladder.iter().any(|rung| rung.tolerance == 0) {
            return Err(ControllerError::ConfigError(
                "ladder rung tolerance must be greater than 0".to_string(),
            ));
        }

        check_unit("confidence_floor", self.confidence_floor)?;

        if self.emergency_ceiling == 0 || self.history_size == 0 {
            return Err(ControllerError::ConfigError(
                "emergency_ceiling and history_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ControllerError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cyclekeeper").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.health.validate()?;
        self.recovery.validate()?;

        if self.scheduler.operation_timeout_secs == 0 {
            return Err(ControllerError::ConfigError(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ControllerError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ControllerError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ControllerError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
