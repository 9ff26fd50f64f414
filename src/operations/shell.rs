//! Shell command execution with timeout

use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of one shell command
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stderr line, falling back to stdout
    pub fn summary(&self) -> String {
        let last_line = |text: &str| {
            text.lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        };
        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            .unwrap_or_else(|| format!("exit code {}", self.exit_code))
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut c = Command::new("sh");
        c.arg("-c");
        c.arg(command);
        c
    }
    #[cfg(windows)]
    {
        let mut c = Command::new("cmd");
        c.arg("/C");
        c.arg(command);
        c
    }
}

/// Run `command` through the platform shell. The child is killed when the
/// timeout elapses or the future is dropped.
pub async fn run_shell(command: &str, limit: Duration) -> Result<ShellOutput, String> {
    if command.trim().is_empty() {
        return Err("command cannot be empty".to_string());
    }

    let start = Instant::now();
    let mut cmd = shell_command(command);
    cmd.kill_on_drop(true);

    match timeout(limit, cmd.output()).await {
        Ok(Ok(output)) => Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        }),
        Ok(Err(e)) => Err(format!("failed to execute command: {}", e)),
        Err(_) => Err(format!("command timed out after {}s", limit.as_secs())),
    }
}
