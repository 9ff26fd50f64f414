//! Shell command as the cycle operation

use crate::errors::{ErrorKind, OperationError};
use crate::operations::shell::run_shell;
use crate::scheduler::Operation;
use crate::types::CycleReport;
use async_trait::async_trait;
use std::time::Duration;

/// Exit codes mapped onto the error taxonomy
const EXIT_NETWORK: i32 = 10;
const EXIT_RESOURCE: i32 = 11;
const EXIT_SERVICE: i32 = 12;
const EXIT_BROWSER: i32 = 13;

/// Prefix of an optional stdout line carrying a `[0, 1]` performance score
const PERFORMANCE_PREFIX: &str = "performance=";

/// Runs a shell command once per cycle; exit code 0 is success
#[derive(Debug, Clone)]
pub struct CommandOperation {
    command: String,
    timeout: Duration,
}

impl CommandOperation {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

/// Error kind hinted by a process exit code
pub fn kind_for_exit_code(code: i32) -> ErrorKind {
    match code {
        EXIT_NETWORK => ErrorKind::Network,
        EXIT_RESOURCE => ErrorKind::Resource,
        EXIT_SERVICE => ErrorKind::ServiceUnavailable,
        EXIT_BROWSER => ErrorKind::Browser,
        _ => ErrorKind::Unknown,
    }
}

fn parse_performance(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(PERFORMANCE_PREFIX))
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 1.0))
}

#[async_trait]
impl Operation for CommandOperation {
    fn name(&self) -> &str {
        &self.command
    }

    async fn execute(&mut self) -> Result<CycleReport, OperationError> {
        let output = run_shell(&self.command, self.timeout)
            .await
            .map_err(OperationError::unknown)?;

        if output.success() {
            Ok(CycleReport {
                performance: parse_performance(&output.stdout),
            })
        } else {
            Err(OperationError::new(
                kind_for_exit_code(output.exit_code),
                output.summary(),
            ))
        }
    }
}
