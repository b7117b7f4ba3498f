//! Bounded shell command execution for the `!bash` command.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default wall-clock bound for a `!bash` child process.
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one shell command.
#[derive(Debug)]
pub struct ShellOutput {
    pub success: bool,
    /// Combined stdout and stderr as shown to the user.
    pub output: String,
    /// Failure description when the command could not run or timed out.
    pub error: String,
}

/// Run a command string through `bash -c`, capturing stdout and stderr.
///
/// The child is killed and reaped when the timeout expires; the session never
/// hangs on a runaway command.
pub async fn run_shell_command(command: &str, timeout: Duration) -> ShellOutput {
    if command.is_empty() {
        return ShellOutput {
            success: false,
            output: String::new(),
            error: "No command specified".to_string(),
        };
    }

    debug!("Executing shell command: {}", command);

    let spawned = Command::new("bash")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return ShellOutput {
                success: false,
                output: String::new(),
                error: format!("Error executing command: {e}"),
            }
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(out)) => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let stderr = String::from_utf8_lossy(&out.stderr);

            let mut output = stdout.trim_end_matches('\n').to_string();
            if !stderr.is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&format!("Error output: {}", stderr.trim_end_matches('\n')));
            }

            ShellOutput {
                success: out.status.success(),
                output,
                error: stderr.trim_end_matches('\n').to_string(),
            }
        }
        Ok(Err(e)) => ShellOutput {
            success: false,
            output: String::new(),
            error: format!("Error executing command: {e}"),
        },
        // Dropping the wait future drops the child handle; kill_on_drop reaps it.
        Err(_) => ShellOutput {
            success: false,
            output: String::new(),
            error: format!("Command timed out after {} seconds", timeout.as_secs()),
        },
    }
}
