use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::error::AppError;

/// Events kept per session before the oldest are dropped.
const EVENT_BUFFER_CAP: usize = 256;

/// Bounded buffer a watch task pushes event summaries into; drained by
/// the poll tool.
#[derive(Clone, Default)]
pub struct EventSink(Arc<Mutex<VecDeque<String>>>);

impl EventSink {
    pub fn push(&self, event: String) {
        let mut buf = self.0.lock().expect("event sink poisoned");
        if buf.len() == EVENT_BUFFER_CAP {
            buf.pop_front();
        }
        buf.push_back(event);
    }

    pub fn drain(&self) -> Vec<String> {
        self.0.lock().expect("event sink poisoned").drain(..).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchInfo {
    pub id: String,
    pub resource_type: String,
    pub namespace: Option<String>,
    pub started_at: DateTime<Utc>,
}

struct WatchSession {
    info: WatchInfo,
    handle: AbortHandle,
    sink: EventSink,
}

/// Registry of live watch subscriptions keyed by a fresh uuid per
/// start. A session leaves on explicit stop or when its watch task
/// ends naturally; there is no automatic expiry.
#[derive(Default)]
pub struct WatchRegistry {
    sessions: RwLock<HashMap<String, WatchSession>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the watch task and returns immediately with the session
    /// id; the task streams into the session's event sink.
    pub async fn start<F, Fut>(
        self: &Arc<Self>,
        resource_type: &str,
        namespace: Option<&str>,
        run: F,
    ) -> WatchInfo
    where
        F: FnOnce(EventSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let info = WatchInfo {
            id: id.clone(),
            resource_type: resource_type.to_string(),
            namespace: namespace.map(str::to_string),
            started_at: Utc::now(),
        };
        let sink = EventSink::default();
        let fut = run(sink.clone());

        // Holding the write lock across spawn + insert: the task's
        // natural-end removal also needs this lock, so it cannot race
        // ahead of the insert.
        let mut sessions = self.sessions.write().await;
        let registry = Arc::downgrade(self);
        let task_id = id.clone();
        let join = tokio::spawn(async move {
            fut.await;
            if let Some(registry) = registry.upgrade() {
                tracing::debug!("Watch {task_id} ended, deregistering");
                registry.sessions.write().await.remove(&task_id);
            }
        });
        sessions.insert(
            id,
            WatchSession {
                info: info.clone(),
                handle: join.abort_handle(),
                sink,
            },
        );
        tracing::info!(
            "Watch {} started for {} in {}",
            info.id,
            info.resource_type,
            info.namespace.as_deref().unwrap_or("(all namespaces)")
        );
        info
    }

    /// Drains buffered events for the session.
    pub async fn poll(&self, id: &str) -> Result<Vec<String>, AppError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("watch session {id}")))?;
        Ok(session.sink.drain())
    }

    /// Aborts the watch task and removes the entry.
    pub async fn stop(&self, id: &str) -> Result<WatchInfo, AppError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("watch session {id}")))?;
        session.handle.abort();
        tracing::info!("Watch {id} stopped");
        Ok(session.info)
    }

    pub async fn active(&self) -> Vec<WatchInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| s.info.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn start_returns_immediately_and_poll_drains_events() {
        let registry = Arc::new(WatchRegistry::new());
        let info = registry
            .start("pods", Some("default"), |sink| async move {
                sink.push("ADDED pod/web".to_string());
                sink.push("MODIFIED pod/web".to_string());
                // Keep the session alive until aborted.
                std::future::pending::<()>().await;
            })
            .await;

        // Give the task a moment to push.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = registry.poll(&info.id).await.unwrap();
        assert_eq!(events.len(), 2);
        // Drained events are gone.
        assert!(registry.poll(&info.id).await.unwrap().is_empty());

        registry.stop(&info.id).await.unwrap();
        assert!(matches!(
            registry.poll(&info.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn stop_of_unknown_id_is_not_found() {
        let registry = Arc::new(WatchRegistry::new());
        let err = registry.stop("no-such-id").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn naturally_ending_watch_deregisters_itself() {
        let registry = Arc::new(WatchRegistry::new());
        let info = registry.start("pods", None, |_sink| async {}).await;

        for _ in 0..50 {
            if registry.active().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("watch {} was not deregistered", info.id);
    }

    #[test]
    fn event_sink_drops_oldest_on_overflow() {
        let sink = EventSink::default();
        for i in 0..(EVENT_BUFFER_CAP + 10) {
            sink.push(format!("event {i}"));
        }
        let events = sink.drain();
        assert_eq!(events.len(), EVENT_BUFFER_CAP);
        assert_eq!(events[0], "event 10");
    }
}
