use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Line kubectl prints once the forward is listening.
const READY_MARKER: &str = "Forwarding from";

/// What to forward: `kubectl port-forward <type>/<name> local:target -n <ns>`.
#[derive(Debug, Clone)]
pub struct ForwardSpec {
    pub resource_type: String,
    pub name: String,
    pub namespace: String,
    pub local_port: u16,
    pub target_port: u16,
}

impl ForwardSpec {
    /// Deterministic caller-visible session id.
    pub fn id(&self) -> String {
        format!("{}-{}-{}", self.resource_type, self.name, self.local_port)
    }

    fn command(&self, kubectl: &str) -> Command {
        let mut cmd = Command::new(kubectl);
        cmd.arg("port-forward")
            .arg(format!("{}/{}", self.resource_type, self.name))
            .arg(format!("{}:{}", self.local_port, self.target_port))
            .arg("-n")
            .arg(&self.namespace);
        cmd
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortForwardInfo {
    pub id: String,
    pub resource_type: String,
    pub name: String,
    pub namespace: String,
    pub local_port: u16,
    pub target_port: u16,
    pub started_at: DateTime<Utc>,
}

struct Session {
    info: PortForwardInfo,
    // Exclusive owner of the forwarding process; stopping the session
    // is the only way this child is terminated.
    child: Child,
}

/// Registry of live port-forward child processes, keyed by the
/// deterministic session id.
pub struct PortForwardRegistry {
    kubectl: String,
    ready_timeout: Duration,
    sessions: RwLock<HashMap<String, Session>>,
    // Serializes start() per session id across the stop-wait-insert
    // sequence; one slot per distinct id ever started.
    starts: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

type StdoutLines = tokio::io::Lines<BufReader<tokio::process::ChildStdout>>;

enum StartOutcome {
    Ready(StdoutLines),
    Exited,
    TimedOut,
    Cancelled,
}

impl PortForwardRegistry {
    pub fn new(kubectl: impl Into<String>, ready_timeout: Duration) -> Self {
        Self {
            kubectl: kubectl.into(),
            ready_timeout,
            sessions: RwLock::new(HashMap::new()),
            starts: Mutex::new(HashMap::new()),
        }
    }

    /// Spawns the forwarding process and waits for its readiness marker,
    /// the ready timeout, an early exit, or caller cancellation,
    /// whichever comes first. Only a marker counts as success.
    ///
    /// A duplicate id stops the previous session before the replacement
    /// is registered; the old child is never silently leaked.
    pub async fn start(
        &self,
        spec: ForwardSpec,
        ct: CancellationToken,
    ) -> Result<PortForwardInfo, AppError> {
        let cmd = spec.command(&self.kubectl);
        self.launch(spec, cmd, ct).await
    }

    pub(crate) async fn launch(
        &self,
        spec: ForwardSpec,
        mut cmd: Command,
        ct: CancellationToken,
    ) -> Result<PortForwardInfo, AppError> {
        let id = spec.id();

        // Two concurrent starts on the same id must not interleave
        // their stop-wait-insert, or one child would be overwritten
        // and leaked without ever being stopped.
        let slot = {
            let mut starts = self.starts.lock().await;
            starts.entry(id.clone()).or_default().clone()
        };
        let _guard = slot.lock().await;

        match self.stop(&id).await {
            Ok(prior) => tracing::warn!(
                "Port-forward {id} already existed (started {}), stopped before replacing",
                prior.started_at
            ),
            Err(AppError::NotFound(_)) => {}
            Err(err) => tracing::warn!("Failed to stop prior port-forward {id}: {err}"),
        }

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("port-forward child has no stdout".to_string()))?;
        let mut stderr = child.stderr.take();

        let marker_id = id.clone();
        let read_marker = async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.contains(READY_MARKER) => {
                        tracing::debug!("port-forward {marker_id}: {line}");
                        return (true, lines);
                    }
                    Ok(Some(line)) => tracing::debug!("port-forward {marker_id}: {line}"),
                    Ok(None) | Err(_) => return (false, lines),
                }
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = ct.cancelled() => StartOutcome::Cancelled,
            res = tokio::time::timeout(self.ready_timeout, read_marker) => match res {
                Ok((true, lines)) => StartOutcome::Ready(lines),
                Ok((false, _)) => StartOutcome::Exited,
                Err(_) => StartOutcome::TimedOut,
            },
        };

        match outcome {
            StartOutcome::Ready(lines) => {
                let info = PortForwardInfo {
                    id: id.clone(),
                    resource_type: spec.resource_type,
                    name: spec.name,
                    namespace: spec.namespace,
                    local_port: spec.local_port,
                    target_port: spec.target_port,
                    started_at: Utc::now(),
                };
                drain_output(id.clone(), lines, stderr.take());
                let mut sessions = self.sessions.write().await;
                sessions.insert(
                    id.clone(),
                    Session {
                        info: info.clone(),
                        child,
                    },
                );
                tracing::info!(
                    "Port-forward {id} established ({}:{} -> {})",
                    info.namespace,
                    info.local_port,
                    info.target_port
                );
                Ok(info)
            }
            StartOutcome::Exited => {
                // Closed stdout does not prove the child exited; bound
                // the reap so a still-running child cannot hang start.
                let status =
                    match tokio::time::timeout(self.ready_timeout, child.wait()).await {
                        Ok(status) => Some(status?),
                        Err(_) => {
                            kill_and_reap(&id, &mut child).await;
                            None
                        }
                    };
                let captured = read_stderr(stderr.take()).await;
                Err(AppError::CommandFailed {
                    program,
                    code: status.and_then(|s| s.code()),
                    stderr: captured,
                })
            }
            StartOutcome::TimedOut => {
                kill_and_reap(&id, &mut child).await;
                Err(AppError::Timeout {
                    operation: format!("port-forward {id} readiness"),
                    millis: self.ready_timeout.as_millis() as u64,
                })
            }
            StartOutcome::Cancelled => {
                kill_and_reap(&id, &mut child).await;
                Err(AppError::Cancelled)
            }
        }
    }

    /// Stops the session's child process (best effort; termination
    /// errors are logged) and removes the entry unconditionally.
    pub async fn stop(&self, id: &str) -> Result<PortForwardInfo, AppError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("port-forward session {id}")))?;

        let mut child = session.child;
        kill_and_reap(id, &mut child).await;
        tracing::info!("Port-forward {id} stopped");
        Ok(session.info)
    }

    /// Snapshot of live sessions.
    pub async fn active(&self) -> Vec<PortForwardInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| s.info.clone())
            .collect()
    }
}

async fn kill_and_reap(id: &str, child: &mut Child) {
    if let Err(err) = child.start_kill() {
        tracing::warn!("Failed to kill port-forward {id}: {err}");
    }
    if let Err(err) = child.wait().await {
        tracing::warn!("Failed to reap port-forward {id}: {err}");
    }
}

/// Keeps both pipes drained for the session's lifetime so the child
/// never blocks on a full pipe.
fn drain_output(id: String, mut lines: StdoutLines, stderr: Option<ChildStderr>) {
    tokio::spawn({
        let id = id.clone();
        async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("port-forward {id}: {line}");
            }
        }
    });
    if let Some(stderr) = stderr {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("port-forward {id} (stderr): {line}");
            }
        });
    }
}

async fn read_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut buf = String::new();
    let _ = stderr.read_to_string(&mut buf).await;
    buf.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn spec(local_port: u16) -> ForwardSpec {
        ForwardSpec {
            resource_type: "pod".to_string(),
            name: "web".to_string(),
            namespace: "default".to_string(),
            local_port,
            target_port: 80,
        }
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn registry(ready_millis: u64) -> PortForwardRegistry {
        PortForwardRegistry::new("kubectl", Duration::from_millis(ready_millis))
    }

    #[tokio::test]
    async fn marker_on_stdout_registers_the_session() {
        let registry = registry(2_000);
        let info = registry
            .launch(
                spec(8080),
                sh("echo 'Forwarding from 127.0.0.1:8080 -> 80'; sleep 30"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(info.id, "pod-web-8080");
        assert_eq!(registry.active().await.len(), 1);

        registry.stop(&info.id).await.unwrap();
        assert!(registry.active().await.is_empty());
    }

    #[tokio::test]
    async fn silent_child_fails_within_the_ready_timeout() {
        let registry = registry(200);
        let started = Instant::now();
        let err = registry
            .launch(spec(8081), sh("sleep 30"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(registry.active().await.is_empty());
    }

    #[tokio::test]
    async fn early_exit_surfaces_captured_stderr() {
        let registry = registry(2_000);
        let err = registry
            .launch(
                spec(8082),
                sh("echo 'unable to forward' >&2; exit 3"),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            AppError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("unable to forward"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_of_unknown_id_is_not_found() {
        let registry = registry(2_000);
        let err = registry.stop("pod-ghost-9999").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_start_replaces_the_prior_session() {
        let registry = registry(2_000);
        let script = "echo 'Forwarding from 127.0.0.1:8083 -> 80'; sleep 30";

        registry
            .launch(spec(8083), sh(script), CancellationToken::new())
            .await
            .unwrap();
        registry
            .launch(spec(8083), sh(script), CancellationToken::new())
            .await
            .unwrap();

        // One live entry; the first child was stopped, not leaked.
        assert_eq!(registry.active().await.len(), 1);
        registry.stop("pod-web-8083").await.unwrap();
    }

    #[tokio::test]
    async fn stdout_eof_with_live_child_fails_within_the_timeout() {
        let registry = registry(200);
        let started = Instant::now();
        // Closes stdout immediately but keeps running.
        let err = registry
            .launch(spec(8086), sh("exec 1>&-; sleep 30"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CommandFailed { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(registry.active().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_starts_on_one_id_serialize() {
        let registry = Arc::new(registry(2_000));
        let script = "echo 'Forwarding from 127.0.0.1:8087 -> 80'; sleep 30";

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .launch(spec(8087), sh(script), CancellationToken::new())
                    .await
            })
        };
        let second = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .launch(spec(8087), sh(script), CancellationToken::new())
                    .await
            })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // The loser of the race was stopped, not overwritten; exactly
        // one child survives.
        assert_eq!(registry.active().await.len(), 1);
        registry.stop("pod-web-8087").await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_aborts_the_wait() {
        let registry = registry(10_000);
        let ct = CancellationToken::new();
        ct.cancel();
        let err = registry
            .launch(spec(8084), sh("sleep 30"), ct)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
