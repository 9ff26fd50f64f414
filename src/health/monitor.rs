//! Health aggregation
//!
//! Every probe runs on its own task under a per-probe timeout so a hung or
//! panicking probe becomes an unhealthy component. The whole check runs under
//! a deadline; missing it yields the emergency sentinel report.

use crate::config::HealthConfig;
use crate::context::ControllerContext;
use crate::health::probes::{default_probes, HealthProbe};
use crate::health::types::{
    ComponentHealth, HealthReport, HealthTrend, OverallStatus, ProbeCategory, QuickHealth,
};
use crate::shutdown::Shutdown;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use futures_util::future::join_all;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reports compared when computing the trend
const TREND_WINDOW: usize = 6;

/// Score change (percentage points) treated as movement rather than noise
const TREND_TOLERANCE: f64 = 5.0;

/// Probes component health and aggregates it into reports
pub struct HealthMonitor {
    config: HealthConfig,
    probes: Vec<Arc<dyn HealthProbe>>,
    history: Mutex<VecDeque<HealthReport>>,
    last_status: Mutex<Option<OverallStatus>>,
    telemetry: TelemetryCollector,
}

impl HealthMonitor {
    /// Monitor with the built-in probes for `config`
    pub fn new(config: HealthConfig, ctx: &ControllerContext) -> Self {
        let probes = default_probes(&config);
        Self::with_probes(config, probes, ctx)
    }

    /// Monitor with injected probes
    pub fn with_probes(
        config: HealthConfig,
        probes: Vec<Arc<dyn HealthProbe>>,
        ctx: &ControllerContext,
    ) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(config.history_size.max(1))),
            last_status: Mutex::new(None),
            telemetry: ctx.telemetry.clone(),
            probes,
            config,
        }
    }

    /// Probe every component and aggregate the result
    pub async fn perform_health_check(&self) -> HealthReport {
        let probe_timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let deadline = Duration::from_millis(self.config.check_deadline_ms);

        let report = match run_probes(&self.probes, probe_timeout, deadline).await {
            Some(components) => HealthReport::from_components(components),
            None => {
                warn!(deadline_ms = self.config.check_deadline_ms, "Health check deadline elapsed");
                HealthReport::emergency(format!(
                    "health check exceeded {}ms deadline",
                    self.config.check_deadline_ms
                ))
            }
        };

        self.observe(&report);
        report
    }

    /// Fast subset: first memory, network and service probe
    pub async fn quick_health_check(&self) -> QuickHealth {
        let mut subset: Vec<Arc<dyn HealthProbe>> = Vec::new();
        for category in [ProbeCategory::Memory, ProbeCategory::Network, ProbeCategory::Service] {
            if let Some(probe) = self.probes.iter().find(|p| p.category() == category) {
                subset.push(probe.clone());
            }
        }

        let quick_timeout = Duration::from_millis(self.config.quick_timeout_ms);
        let checked: Vec<String> = subset.iter().map(|p| p.name().to_string()).collect();

        match run_probes(&subset, quick_timeout, quick_timeout).await {
            Some(components) => {
                let failing: Vec<String> = components
                    .iter()
                    .filter(|(_, c)| !c.healthy)
                    .map(|(name, _)| name.clone())
                    .collect();
                QuickHealth {
                    healthy: failing.is_empty(),
                    checked,
                    failing,
                }
            }
            None => QuickHealth {
                healthy: false,
                failing: checked.clone(),
                checked,
            },
        }
    }

    /// Most recent full report
    pub fn latest(&self) -> Option<HealthReport> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    /// Retained reports, oldest first
    pub fn history(&self) -> Vec<HealthReport> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Direction of recent health scores
    pub fn trend(&self) -> HealthTrend {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let scores: Vec<f64> = history
            .iter()
            .rev()
            .take(TREND_WINDOW)
            .rev()
            .map(|r| r.health_score)
            .collect();
        score_trend(&scores)
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Run full checks every `interval` until shutdown, publishing each report
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: Shutdown,
    ) -> (watch::Receiver<HealthReport>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(HealthReport::assumed_healthy());
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {}
                }

                let report = tokio::select! {
                    _ = shutdown.wait() => break,
                    report = self.perform_health_check() => report,
                };

                if tx.send(report).is_err() {
                    break;
                }
            }

            debug!("Periodic health monitor stopped");
        });

        (rx, handle)
    }

    fn observe(&self, report: &HealthReport) {
        {
            let mut last = self.last_status.lock().unwrap_or_else(PoisonError::into_inner);
            match *last {
                Some(previous) if previous != report.overall_status => {
                    if report.overall_status == OverallStatus::Healthy {
                        info!(
                            from = %previous,
                            to = %report.overall_status,
                            "Health status changed"
                        );
                    } else {
                        warn!(
                            from = %previous,
                            to = %report.overall_status,
                            unhealthy = ?report.unhealthy_components,
                            "Health status changed"
                        );
                    }
                }
                _ => {}
            }
            *last = Some(report.overall_status);
        }

        debug!(
            status = %report.overall_status,
            score = report.health_score,
            "Health check complete"
        );
        self.telemetry.record(TelemetryEvent::HealthChecked {
            status: report.overall_status.to_string(),
            score: report.health_score,
            timestamp: std::time::Instant::now(),
        });

        let capacity = self.config.history_size.max(1);
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(report.clone());
    }
}

/// Run probes concurrently. `None` when the overall deadline elapses.
async fn run_probes(
    probes: &[Arc<dyn HealthProbe>],
    probe_timeout: Duration,
    deadline: Duration,
) -> Option<BTreeMap<String, ComponentHealth>> {
    let tasks: Vec<_> = probes
        .iter()
        .map(|probe| {
            let probe = probe.clone();
            let name = probe.name().to_string();
            let category = probe.category();
            let handle = tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                let result = tokio::time::timeout(probe_timeout, probe.probe()).await;
                (result, start.elapsed())
            });
            (name, category, handle)
        })
        .collect();

    let aborts: Vec<_> = tasks.iter().map(|(_, _, h)| h.abort_handle()).collect();
    let (meta, handles): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .map(|(name, category, handle)| ((name, category), handle))
        .unzip();

    let joined = match tokio::time::timeout(deadline, join_all(handles)).await {
        Ok(joined) => joined,
        Err(_) => {
            for abort in aborts {
                abort.abort();
            }
            return None;
        }
    };

    let mut components = BTreeMap::new();
    for ((name, category), joined) in meta.into_iter().zip(joined) {
        let component = match joined {
            Ok((Ok(Ok(reading)), elapsed)) => {
                ComponentHealth::from_reading(category, reading, elapsed.as_millis() as u64)
            }
            Ok((Ok(Err(e)), elapsed)) => {
                debug!(probe = %name, error = %e, "Probe failed");
                ComponentHealth::failed(category, e.to_string(), elapsed.as_millis() as u64)
            }
            Ok((Err(_), elapsed)) => ComponentHealth::failed(
                category,
                format!("probe timed out after {}ms", probe_timeout.as_millis()),
                elapsed.as_millis() as u64,
            ),
            Err(e) => {
                warn!(probe = %name, error = %e, "Probe task aborted");
                ComponentHealth::failed(category, format!("probe task failed: {}", e), 0)
            }
        };
        components.insert(unique_key(&components, name), component);
    }

    Some(components)
}

fn unique_key(components: &BTreeMap<String, ComponentHealth>, name: String) -> String {
    if !components.contains_key(&name) {
        return name;
    }
    (2..)
        .map(|n| format!("{}#{}", name, n))
        .find(|candidate| !components.contains_key(candidate))
        .unwrap_or(name)
}

fn score_trend(scores: &[f64]) -> HealthTrend {
    if scores.len() < 2 {
        return HealthTrend::Stable;
    }
    let mid = scores.len() / 2;
    let mean = |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64;
    let delta = mean(&scores[mid..]) - mean(&scores[..mid]);

    if delta > TREND_TOLERANCE {
        HealthTrend::Improving
    } else if delta < -TREND_TOLERANCE {
        HealthTrend::Declining
    } else {
        HealthTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_trend() {
        assert_eq!(score_trend(&[]), HealthTrend::Stable);
        assert_eq!(score_trend(&[100.0]), HealthTrend::Stable);
        assert_eq!(score_trend(&[40.0, 60.0, 80.0, 100.0]), HealthTrend::Improving);
        assert_eq!(score_trend(&[100.0, 100.0, 60.0, 40.0]), HealthTrend::Declining);
        assert_eq!(score_trend(&[80.0, 82.0, 80.0, 81.0]), HealthTrend::Stable);
    }

    #[test]
    fn test_unique_key() {
        let mut components = BTreeMap::new();
        components.insert(
            "api".to_string(),
            ComponentHealth::failed(ProbeCategory::Service, "down", 0),
        );
        assert_eq!(unique_key(&components, "api".to_string()), "api#2");
        assert_eq!(unique_key(&components, "db".to_string()), "db");
    }
}
