//! Operational target the coordinator sequences recovery actions against
//!
//! The controller never performs recovery itself; it only calls these
//! operations in the order a strategy prescribes.

use crate::errors::Result;
use async_trait::async_trait;

/// Recovery actions exposed by the driven subsystem
#[async_trait]
pub trait OperationalTarget: Send + Sync {
    /// Restart the working session
    async fn restart_session(&self) -> Result<()>;

    /// Drop cached state
    async fn clear_cache(&self) -> Result<()>;

    /// Re-establish network connectivity
    async fn reset_network(&self) -> Result<()>;

    /// Kill leftover helper processes
    async fn kill_stray_processes(&self) -> Result<()>;

    /// Tear everything down and start over
    async fn full_reset(&self) -> Result<()>;

    /// Check that the target is usable again
    async fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Target that accepts every action without doing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTarget;

#[async_trait]
impl OperationalTarget for NoopTarget {
    async fn restart_session(&self) -> Result<()> {
        Ok(())
    }

    async fn clear_cache(&self) -> Result<()> {
        Ok(())
    }

    async fn reset_network(&self) -> Result<()> {
        Ok(())
    }

    async fn kill_stray_processes(&self) -> Result<()> {
        Ok(())
    }

    async fn full_reset(&self) -> Result<()> {
        Ok(())
    }
}
