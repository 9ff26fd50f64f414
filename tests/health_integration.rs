//! Health monitor integration tests
//!
//! Aggregation, probe isolation (timeouts and panics) and the check deadline,
//! driven with injected probes on paused time

use async_trait::async_trait;
use cyclekeeper::config::HealthConfig;
use cyclekeeper::context::ControllerContext;
use cyclekeeper::errors::Result;
use cyclekeeper::health::{
    FnProbe, HealthMonitor, HealthProbe, OverallStatus, ProbeCategory, ProbeReading,
};
use cyclekeeper::shutdown;
use std::sync::Arc;
use std::time::Duration;

fn healthy(name: &str) -> Arc<dyn HealthProbe> {
    Arc::new(FnProbe::new(name, ProbeCategory::Memory, || {
        Ok(ProbeReading::against_ceiling(40.0, 85.0, "%"))
    }))
}

fn unhealthy(name: &str) -> Arc<dyn HealthProbe> {
    Arc::new(FnProbe::new(name, ProbeCategory::Disk, || {
        Ok(ProbeReading::against_ceiling(97.0, 90.0, "%"))
    }))
}

/// Probe that never answers
struct HangingProbe;

#[async_trait]
impl HealthProbe for HangingProbe {
    fn name(&self) -> &str {
        "hanging"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Network
    }

    async fn probe(&self) -> Result<ProbeReading> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ProbeReading::against_ceiling(0.0, 1.0, ""))
    }
}

fn hanging() -> Arc<dyn HealthProbe> {
    Arc::new(HangingProbe)
}

fn monitor(probes: Vec<Arc<dyn HealthProbe>>) -> HealthMonitor {
    HealthMonitor::with_probes(HealthConfig::default(), probes, &ControllerContext::default())
}

#[tokio::test]
async fn test_one_unhealthy_of_five_is_degraded() {
    let monitor = monitor(vec![
        healthy("a"),
        healthy("b"),
        healthy("c"),
        healthy("d"),
        unhealthy("e"),
    ]);

    let report = monitor.perform_health_check().await;
    assert_eq!(report.health_score, 80.0);
    assert_eq!(report.overall_status, OverallStatus::Degraded);
    assert_eq!(report.unhealthy_components, vec!["e".to_string()]);
    assert!(!report.is_healthy());
}

#[tokio::test]
async fn test_three_unhealthy_is_unhealthy() {
    let monitor = monitor(vec![healthy("a"), unhealthy("b"), unhealthy("c"), unhealthy("d")]);

    let report = monitor.perform_health_check().await;
    assert_eq!(report.overall_status, OverallStatus::Unhealthy);
    assert_eq!(report.health_score, 25.0);
}

#[tokio::test]
async fn test_no_probes_is_emergency() {
    let report = monitor(Vec::new()).perform_health_check().await;
    assert_eq!(report.overall_status, OverallStatus::Emergency);
    assert_eq!(report.health_score, 0.0);
    assert!(report.emergency_reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_fails_alone() {
    let monitor = monitor(vec![healthy("memory"), hanging()]);

    let report = monitor.perform_health_check().await;
    let hung = &report.components["hanging"];
    assert!(!hung.healthy);
    assert!(hung.error.as_deref().unwrap_or("").contains("timed out"));
    assert!(report.components["memory"].healthy);
    assert_eq!(report.overall_status, OverallStatus::Degraded);
}

#[tokio::test]
async fn test_panicking_probe_is_contained() {
    let panicking: Arc<dyn HealthProbe> =
        Arc::new(FnProbe::new("flaky", ProbeCategory::Cpu, || panic!("sensor exploded")));
    let monitor = monitor(vec![healthy("memory"), panicking]);

    let report = monitor.perform_health_check().await;
    assert!(!report.components["flaky"].healthy);
    assert!(report.components["memory"].healthy);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_yields_emergency_report() {
    let config = HealthConfig {
        probe_timeout_ms: 60_000,
        check_deadline_ms: 1_000,
        ..HealthConfig::default()
    };
    let monitor = HealthMonitor::with_probes(
        config,
        vec![healthy("memory"), hanging()],
        &ControllerContext::default(),
    );

    let report = monitor.perform_health_check().await;
    assert_eq!(report.overall_status, OverallStatus::Emergency);
    assert!(report.components.is_empty());
}

#[tokio::test]
async fn test_history_and_telemetry() {
    let ctx = ControllerContext::default();
    let monitor = HealthMonitor::with_probes(
        HealthConfig {
            history_size: 2,
            ..HealthConfig::default()
        },
        vec![healthy("memory")],
        &ctx,
    );

    for _ in 0..3 {
        monitor.perform_health_check().await;
    }

    assert_eq!(monitor.history().len(), 2);
    assert_eq!(ctx.telemetry.get_stats().health_checks, 3);
    assert!(monitor.latest().is_some());
}

#[tokio::test]
async fn test_quick_check_uses_subset() {
    let monitor = monitor(vec![healthy("memory"), unhealthy("disk")]);

    let quick = monitor.quick_health_check().await;
    assert!(quick.healthy);
    assert_eq!(quick.checked, vec!["memory".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_monitor_publishes_until_shutdown() {
    let (trigger, listener) = shutdown::channel();
    let ctx = ControllerContext::with_shutdown(listener.clone());
    let monitor = Arc::new(HealthMonitor::with_probes(
        HealthConfig::default(),
        vec![healthy("memory"), unhealthy("disk")],
        &ctx,
    ));

    let (mut feed, handle) = monitor.clone().spawn_periodic(Duration::from_secs(60), listener);
    feed.changed().await.unwrap();
    assert_eq!(feed.borrow().overall_status, OverallStatus::Degraded);

    trigger.trigger();
    handle.await.unwrap();
    assert!(!monitor.history().is_empty());
}
