//! cyclekeeper - adaptive pacing and failure-recovery controller
//!
//! Governs how often a repeated, externally risky operation may run and how
//! the system heals itself when that operation fails.
//!
//! # Architecture
//!
//! - **health**: probes and aggregated health reports
//! - **recovery**: failure classification, escalation ladder, recovery coordinator
//! - **timing**: adaptive wait computation with pattern avoidance
//! - **scheduler**: the cycle loop tying the components together

pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod recovery;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;
pub mod timing;
pub mod types;

// Binary support
pub mod cli;
pub mod doctor;
pub mod logging;
pub mod operations;
pub mod simulate;

// Re-export commonly used types
pub use config::Config;
pub use context::ControllerContext;
pub use errors::{ControllerError, ErrorKind, OperationError, Result};
pub use health::{HealthMonitor, HealthReport, OverallStatus};
pub use recovery::{FailureClassifier, OperationalTarget, RecoveryCoordinator, RecoveryStrategy};
pub use scheduler::{CycleScheduler, Operation};
pub use timing::TimingController;
pub use types::{CycleOutcome, CycleReport};
