//! Health probe backends
//!
//! Probes report a reading or an error; the monitor turns errors, panics
//! and timeouts into unhealthy components.

use crate::config::HealthConfig;
use crate::errors::{ControllerError, Result};
use crate::health::types::{ProbeCategory, ProbeReading};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, System};
use tokio::net::TcpStream;
use tokio::time::Instant;

/// A single check against one resource or dependent service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Component name used as the report key
    fn name(&self) -> &str;

    fn category(&self) -> ProbeCategory;

    async fn probe(&self) -> Result<ProbeReading>;
}

fn probe_error(name: &str, reason: impl Into<String>) -> ControllerError {
    ControllerError::Probe {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Used memory percentage against a ceiling
pub struct MemoryProbe {
    ceiling: f64,
}

impl MemoryProbe {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }
}

#[async_trait]
impl HealthProbe for MemoryProbe {
    fn name(&self) -> &str {
        "memory"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Memory
    }

    async fn probe(&self) -> Result<ProbeReading> {
        let mut sys = System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(probe_error(self.name(), "total memory reported as zero"));
        }
        let used = 100.0 * sys.used_memory() as f64 / total as f64;
        Ok(ProbeReading::against_ceiling(used, self.ceiling, "%"))
    }
}

/// Global CPU usage against a ceiling
pub struct CpuProbe {
    ceiling: f64,
}

impl CpuProbe {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }
}

#[async_trait]
impl HealthProbe for CpuProbe {
    fn name(&self) -> &str {
        "cpu"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Cpu
    }

    async fn probe(&self) -> Result<ProbeReading> {
        let mut sys = System::new();
        // usage is a delta between two refreshes
        sys.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu();

        let usage = sys.global_cpu_info().cpu_usage() as f64;
        Ok(ProbeReading::against_ceiling(usage, self.ceiling, "%"))
    }
}

/// Used space on the disk holding a path
pub struct DiskProbe {
    path: PathBuf,
    ceiling: f64,
}

impl DiskProbe {
    pub fn new(path: impl Into<PathBuf>, ceiling: f64) -> Self {
        Self {
            path: path.into(),
            ceiling,
        }
    }
}

#[async_trait]
impl HealthProbe for DiskProbe {
    fn name(&self) -> &str {
        "disk"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Disk
    }

    async fn probe(&self) -> Result<ProbeReading> {
        let disks = Disks::new_with_refreshed_list();
        let path: &Path = &self.path;

        // deepest mount point containing the path
        let disk = disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| {
                probe_error(
                    self.name(),
                    format!("no disk mounted for {}", self.path.display()),
                )
            })?;

        let total = disk.total_space();
        if total == 0 {
            return Err(probe_error(self.name(), "disk reports zero capacity"));
        }
        let used = 100.0 * (total - disk.available_space().min(total)) as f64 / total as f64;
        Ok(ProbeReading::against_ceiling(used, self.ceiling, "%"))
    }
}

/// TCP reachability of a set of `host:port` targets
pub struct NetworkProbe {
    targets: Vec<String>,
    max_latency: Duration,
    min_reachable: usize,
    connect_timeout: Duration,
}

impl NetworkProbe {
    pub fn new(
        targets: Vec<String>,
        max_latency: Duration,
        min_reachable: usize,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            targets,
            max_latency,
            min_reachable,
            connect_timeout,
        }
    }

    async fn connect(&self, target: &str) -> Option<Duration> {
        let start = Instant::now();
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => Some(start.elapsed()),
            _ => None,
        }
    }
}

#[async_trait]
impl HealthProbe for NetworkProbe {
    fn name(&self) -> &str {
        "network"
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Network
    }

    async fn probe(&self) -> Result<ProbeReading> {
        if self.targets.is_empty() {
            return Err(probe_error(self.name(), "no network targets configured"));
        }

        let latencies: Vec<Duration> = join_all(self.targets.iter().map(|t| self.connect(t)))
            .await
            .into_iter()
            .flatten()
            .collect();

        let reachable = latencies.len();
        let mean_ms = if reachable == 0 {
            f64::INFINITY
        } else {
            latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / reachable as f64
        };
        let max_ms = self.max_latency.as_secs_f64() * 1000.0;

        Ok(ProbeReading {
            healthy: reachable >= self.min_reachable && mean_ms <= max_ms,
            metric_value: if mean_ms.is_finite() { mean_ms } else { -1.0 },
            detail: format!(
                "{}/{} targets reachable, mean latency {:.0}ms (limit {:.0}ms)",
                reachable,
                self.targets.len(),
                if mean_ms.is_finite() { mean_ms } else { 0.0 },
                max_ms
            ),
        })
    }
}

/// HTTP reachability of a dependent service
pub struct ServiceProbe {
    name: String,
    url: String,
    client: Client,
    max_latency: Duration,
}

impl ServiceProbe {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        max_latency: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            name: name.into(),
            url: url.into(),
            client,
            max_latency,
        }
    }
}

#[async_trait]
impl HealthProbe for ServiceProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Service
    }

    async fn probe(&self) -> Result<ProbeReading> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| probe_error(&self.name, e.to_string()))?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        Ok(ProbeReading {
            healthy: (status.is_success() || status.is_redirection())
                && latency_ms <= self.max_latency.as_secs_f64() * 1000.0,
            metric_value: latency_ms,
            detail: format!("HTTP {} in {:.0}ms", status.as_u16(), latency_ms),
        })
    }
}

type ProbeFn = dyn Fn() -> Result<ProbeReading> + Send + Sync;

/// Probe backed by a closure, for injected or mocked backends
pub struct FnProbe {
    name: String,
    category: ProbeCategory,
    check: Box<ProbeFn>,
}

impl FnProbe {
    pub fn new<F>(name: impl Into<String>, category: ProbeCategory, check: F) -> Self
    where
        F: Fn() -> Result<ProbeReading> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            category,
            check: Box::new(check),
        }
    }
}

#[async_trait]
impl HealthProbe for FnProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ProbeCategory {
        self.category
    }

    async fn probe(&self) -> Result<ProbeReading> {
        (self.check)()
    }
}

/// Built-in probe set for a configuration
pub fn default_probes(config: &HealthConfig) -> Vec<Arc<dyn HealthProbe>> {
    let probe_timeout = Duration::from_millis(config.probe_timeout_ms);
    let max_latency = Duration::from_millis(config.max_latency_ms);

    let mut probes: Vec<Arc<dyn HealthProbe>> = vec![
        Arc::new(MemoryProbe::new(config.max_memory_percent)),
        Arc::new(CpuProbe::new(config.max_cpu_percent)),
        Arc::new(DiskProbe::new(&config.disk_path, config.max_disk_percent)),
    ];

    if !config.network_targets.is_empty() {
        probes.push(Arc::new(NetworkProbe::new(
            config.network_targets.clone(),
            max_latency,
            config.min_reachable_targets,
            probe_timeout,
        )));
    }

    for service in &config.services {
        probes.push(Arc::new(ServiceProbe::new(
            service.name.clone(),
            service.url.clone(),
            probe_timeout,
            max_latency,
        )));
    }

    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceEndpoint;

    #[test]
    fn test_default_probe_set() {
        let mut config = HealthConfig::default();
        config.services.push(ServiceEndpoint {
            name: "api".to_string(),
            url: "http://127.0.0.1:9/health".to_string(),
        });

        let probes = default_probes(&config);
        let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["memory", "cpu", "disk", "network", "api"]);
    }

    #[test]
    fn test_no_network_targets_skips_probe() {
        let config = HealthConfig {
            network_targets: Vec::new(),
            ..HealthConfig::default()
        };
        let probes = default_probes(&config);
        assert!(probes.iter().all(|p| p.category() != ProbeCategory::Network));
    }

    #[tokio::test]
    async fn test_fn_probe() {
        let probe = FnProbe::new("queue", ProbeCategory::Service, || {
            Ok(ProbeReading::against_ceiling(12.0, 10.0, " items"))
        });
        let reading = probe.probe().await.unwrap();
        assert!(!reading.healthy);
        assert_eq!(reading.metric_value, 12.0);
    }

    #[tokio::test]
    async fn test_memory_probe_reads_percentage() {
        let reading = MemoryProbe::new(100.0).probe().await.unwrap();
        assert!((0.0..=100.0).contains(&reading.metric_value));
    }

    #[tokio::test]
    async fn test_network_probe_unreachable() {
        let probe = NetworkProbe::new(
            vec!["127.0.0.1:1".to_string()],
            Duration::from_millis(500),
            1,
            Duration::from_millis(500),
        );
        let reading = probe.probe().await.unwrap();
        assert!(!reading.healthy);
    }

    #[tokio::test]
    async fn test_network_probe_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let probe = NetworkProbe::new(
            vec![addr],
            Duration::from_secs(2),
            1,
            Duration::from_secs(1),
        );
        let reading = probe.probe().await.unwrap();
        assert!(reading.healthy);
    }
}
