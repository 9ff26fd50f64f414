//! Operational target backed by configured shell hooks

use crate::config::HooksConfig;
use crate::errors::{ControllerError, Result};
use crate::operations::shell::run_shell;
use crate::recovery::OperationalTarget;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Runs one shell command per recovery action; unset hooks are no-ops
#[derive(Debug, Clone)]
pub struct HookTarget {
    hooks: HooksConfig,
}

impl HookTarget {
    pub fn new(hooks: HooksConfig) -> Self {
        Self { hooks }
    }

    async fn run_hook(&self, action: &str, hook: Option<&String>) -> Result<()> {
        let Some(command) = hook else {
            debug!(action, "No hook configured, skipping");
            return Ok(());
        };

        info!(action, command = %command, "Running recovery hook");
        let output = run_shell(command, Duration::from_secs(self.hooks.timeout_secs))
            .await
            .map_err(|reason| ControllerError::TargetAction {
                action: action.to_string(),
                reason,
            })?;

        if output.success() {
            Ok(())
        } else {
            Err(ControllerError::TargetAction {
                action: action.to_string(),
                reason: output.summary(),
            })
        }
    }
}

#[async_trait]
impl OperationalTarget for HookTarget {
    async fn restart_session(&self) -> Result<()> {
        self.run_hook("restart_session", self.hooks.restart_session.as_ref()).await
    }

    async fn clear_cache(&self) -> Result<()> {
        self.run_hook("clear_cache", self.hooks.clear_cache.as_ref()).await
    }

    async fn reset_network(&self) -> Result<()> {
        self.run_hook("reset_network", self.hooks.reset_network.as_ref()).await
    }

    async fn kill_stray_processes(&self) -> Result<()> {
        self.run_hook("kill_stray_processes", self.hooks.kill_stray_processes.as_ref()).await
    }

    async fn full_reset(&self) -> Result<()> {
        self.run_hook("full_reset", self.hooks.full_reset.as_ref()).await
    }

    async fn validate(&self) -> Result<()> {
        self.run_hook("validate", self.hooks.validate.as_ref()).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_hooks_are_noops() {
        let target = HookTarget::new(HooksConfig::default());
        assert!(target.restart_session().await.is_ok());
        assert!(target.full_reset().await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_hook_reports_action() {
        let hooks = HooksConfig {
            reset_network: Some("echo 'no route' >&2; exit 1".to_string()),
            ..HooksConfig::default()
        };
        let target = HookTarget::new(hooks);

        match target.reset_network().await {
            Err(ControllerError::TargetAction { action, reason }) => {
                assert_eq!(action, "reset_network");
                assert_eq!(reason, "no route");
            }
            other => panic!("expected TargetAction error, got {:?}", other),
        }
    }
}
