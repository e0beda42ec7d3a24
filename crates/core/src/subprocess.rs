//! Shared subprocess management utilities.
//!
//! Provides [`run_command`], the spawn + capture + timeout logic used by the
//! ffmpeg encoder. The caller builds the [`tokio::process::Command`]
//! (program, arguments, working directory) and delegates execution here.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (1 MiB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Errors that can occur while running a child process.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The program could not be spawned (missing binary, permissions).
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    /// Waiting on the process failed.
    #[error("I/O error while waiting for process: {0}")]
    Io(std::io::Error),

    /// The process exceeded its timeout and was killed.
    #[error("process timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// Spawn `cmd`, capture stdout/stderr and enforce `timeout`.
///
/// Stdin is closed. The child is configured with `kill_on_drop(true)`, so if
/// the timeout fires, or the calling future is dropped, the process is
/// killed rather than left running.
pub async fn run_command(cmd: &mut Command, timeout: Duration) -> Result<CommandOutput, CommandError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(CommandError::Spawn)?;

    // Read the pipes in spawned tasks so `child.wait()` can borrow `child`.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(e)) => Err(CommandError::Io(e)),
        Err(_elapsed) => {
            // Kill explicitly so the process is reaped before we report.
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(CommandError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = run_command(&mut cmd, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn kills_process_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30"]);
        let started = Instant::now();
        let result = run_command(&mut cmd, Duration::from_millis(200)).await;
        assert_matches!(result, Err(CommandError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let mut cmd = Command::new("/nonexistent/reverie-encoder");
        let result = run_command(&mut cmd, Duration::from_secs(1)).await;
        assert_matches!(result, Err(CommandError::Spawn(_)));
    }
}
