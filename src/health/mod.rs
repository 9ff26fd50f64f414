//! Health monitoring
//!
//! Probes resources and dependent services and aggregates the results into
//! a score and overall status.

pub mod monitor;
pub mod probes;
pub mod types;

pub use monitor::HealthMonitor;
pub use probes::{
    default_probes, CpuProbe, DiskProbe, FnProbe, HealthProbe, MemoryProbe, NetworkProbe,
    ServiceProbe,
};
pub use types::{
    ComponentHealth, HealthReport, HealthTrend, OverallStatus, ProbeCategory, ProbeReading,
    QuickHealth,
};
