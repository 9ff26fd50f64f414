//! Sliding-window failure statistics feeding the classifier

use crate::errors::{ErrorKind, OperationError};
use crate::health::{HealthReport, ProbeCategory};
use crate::recovery::types::SystemMetrics;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const NETWORK_KEYWORDS: [&str; 4] = ["timeout", "timed out", "network", "connection"];

/// Recent failures kept for metric derivation
#[derive(Debug, Clone)]
pub struct FailureStats {
    window: Duration,
    failures: VecDeque<(Instant, ErrorKind, bool)>,
}

impl FailureStats {
    /// Create stats over a time window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            failures: VecDeque::new(),
        }
    }

    /// Record one failed cycle
    pub fn record_failure(&mut self, error: &OperationError) {
        let message = error.message.to_lowercase();
        let network_like = NETWORK_KEYWORDS.iter().any(|k| message.contains(k));
        self.failures
            .push_back((Instant::now(), error.kind, network_like));
        self.prune();
    }

    /// Number of failures still inside the window
    pub fn len(&mut self) -> usize {
        self.prune();
        self.failures.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Metrics snapshot merged with the latest health report
    pub fn snapshot(&mut self, health: Option<&HealthReport>) -> SystemMetrics {
        self.prune();

        let mut metrics = SystemMetrics::default();
        for (_, kind, network_like) in &self.failures {
            match kind {
                ErrorKind::Network => metrics.network_failures += 1,
                ErrorKind::Browser => metrics.browser_crashes += 1,
                ErrorKind::ServiceUnavailable => metrics.service_errors += 1,
                ErrorKind::Unknown if *network_like => metrics.network_failures += 1,
                ErrorKind::Resource | ErrorKind::Unknown => {}
            }
        }

        if let Some(report) = health {
            metrics.memory_percent = report.metric_for(ProbeCategory::Memory).unwrap_or(0.0);
            metrics.cpu_percent = report.metric_for(ProbeCategory::Cpu).unwrap_or(0.0);
        }

        metrics
    }

    fn prune(&mut self) {
        let now = Instant::now();
        while let Some((at, _, _)) = self.failures.front() {
            if now.duration_since(*at) > self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_by_kind() {
        let mut stats = FailureStats::new(Duration::from_secs(60));
        stats.record_failure(&OperationError::new(ErrorKind::Network, "reset"));
        stats.record_failure(&OperationError::unknown("request timed out"));
        stats.record_failure(&OperationError::new(ErrorKind::Browser, "tab died"));
        stats.record_failure(&OperationError::new(ErrorKind::ServiceUnavailable, "503"));

        let metrics = stats.snapshot(None);
        assert_eq!(metrics.network_failures, 2);
        assert_eq!(metrics.browser_crashes, 1);
        assert_eq!(metrics.service_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry() {
        let mut stats = FailureStats::new(Duration::from_secs(60));
        stats.record_failure(&OperationError::new(ErrorKind::Network, "reset"));
        assert_eq!(stats.len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(stats.is_empty());
        assert_eq!(stats.snapshot(None).network_failures, 0);
    }
}
