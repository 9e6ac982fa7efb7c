pub mod helm;
pub mod kubectl;

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a child process to completion under the configured timeout,
/// honoring caller cancellation. Non-zero exit is classified as
/// `CommandFailed` with the captured stderr.
pub async fn run(
    mut cmd: Command,
    timeout: Duration,
    ct: &CancellationToken,
) -> Result<ExecOutput, AppError> {
    let program = program_name(&cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd.spawn()?;
    wait(child, program, timeout, ct).await
}

/// Like [`run`] but feeds `input` to the child's stdin first (used by
/// `kubectl apply -f -`).
pub async fn run_with_input(
    mut cmd: Command,
    input: &str,
    timeout: Duration,
    ct: &CancellationToken,
) -> Result<ExecOutput, AppError> {
    let program = program_name(&cmd);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Internal(format!("{program} child has no stdin")))?;
    stdin.write_all(input.as_bytes()).await?;
    // Close the pipe so the child sees EOF.
    drop(stdin);

    wait(child, program, timeout, ct).await
}

async fn wait(
    child: tokio::process::Child,
    program: String,
    timeout: Duration,
    ct: &CancellationToken,
) -> Result<ExecOutput, AppError> {
    let waited = tokio::select! {
        biased;
        // Dropping the wait future kills the child (kill_on_drop).
        _ = ct.cancelled() => return Err(AppError::Cancelled),
        res = tokio::time::timeout(timeout, child.wait_with_output()) => res,
    };
    let output = match waited {
        Err(_) => {
            return Err(AppError::Timeout {
                operation: program,
                millis: timeout.as_millis() as u64,
            });
        }
        Ok(res) => res?,
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(AppError::CommandFailed {
            program,
            code: output.status.code(),
            stderr,
        });
    }
    Ok(ExecOutput { stdout, stderr })
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_of_a_successful_command() {
        let out = run(sh("echo hello"), Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_command_failed_with_stderr() {
        let err = run(
            sh("echo broken >&2; exit 2"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            AppError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert!(stderr.contains("broken"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run(
            sh("sleep 30"),
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancellation_wins_over_the_timeout() {
        let ct = CancellationToken::new();
        ct.cancel();
        let err = run(sh("sleep 30"), Duration::from_secs(60), &ct)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }

    #[tokio::test]
    async fn stdin_payload_reaches_the_child() {
        let out = run_with_input(
            sh("cat"),
            "manifest: body\n",
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out.stdout, "manifest: body\n");
    }
}
