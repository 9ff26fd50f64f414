//! Explicit collaborators handed to every component at construction

use crate::shutdown::Shutdown;
use crate::telemetry::TelemetryCollector;
use crate::timing::clock::{Clock, SystemClock};
use std::sync::Arc;

/// Shared context: telemetry sink, shutdown listener and wall clock
#[derive(Clone)]
pub struct ControllerContext {
    pub telemetry: TelemetryCollector,
    pub shutdown: Shutdown,
    pub clock: Arc<dyn Clock>,
}

impl ControllerContext {
    pub fn new(telemetry: TelemetryCollector, shutdown: Shutdown, clock: Arc<dyn Clock>) -> Self {
        Self {
            telemetry,
            shutdown,
            clock,
        }
    }

    /// Context on the system clock with fresh telemetry
    pub fn with_shutdown(shutdown: Shutdown) -> Self {
        Self::new(TelemetryCollector::new(), shutdown, Arc::new(SystemClock))
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for ControllerContext {
    fn default() -> Self {
        Self::with_shutdown(Shutdown::never())
    }
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("shutdown", &self.shutdown.is_triggered())
            .finish_non_exhaustive()
    }
}
