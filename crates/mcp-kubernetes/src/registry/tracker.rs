use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// One cluster object this process created and is responsible for in
/// bulk cleanup. Never mutated after insertion.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedResource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub created_at: DateTime<Utc>,
}

type Key = (String, String, String);

/// In-memory registry of resources created by this server. Entries
/// leave only through `untrack`; the registry is not persisted.
#[derive(Default)]
pub struct ResourceTracker {
    entries: RwLock<HashMap<Key, TrackedResource>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for `(kind, name, namespace)`.
    pub async fn track(&self, kind: &str, name: &str, namespace: &str) {
        let entry = TrackedResource {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            created_at: Utc::now(),
        };
        tracing::debug!("Tracking {kind} {namespace}/{name}");
        self.entries
            .write()
            .await
            .insert(key(kind, name, namespace), entry);
    }

    /// Snapshot of all current entries, ordered by creation time.
    pub async fn list(&self) -> Vec<TrackedResource> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    /// Removes the entry if present; absence is not an error.
    pub async fn untrack(&self, kind: &str, name: &str, namespace: &str) {
        self.entries.write().await.remove(&key(kind, name, namespace));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn key(kind: &str, name: &str, namespace: &str) -> Key {
    (kind.to_string(), name.to_string(), namespace.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_reflects_distinct_tracks_and_untracks() {
        let tracker = ResourceTracker::new();
        tracker.track("Pod", "a", "default").await;
        tracker.track("Pod", "b", "default").await;
        tracker.track("Deployment", "a", "default").await;
        assert_eq!(tracker.list().await.len(), 3);

        tracker.untrack("Pod", "a", "default").await;
        assert_eq!(tracker.list().await.len(), 2);

        // Untracking an absent key is a no-op.
        tracker.untrack("Pod", "a", "default").await;
        assert_eq!(tracker.list().await.len(), 2);
    }

    #[tokio::test]
    async fn track_overwrites_same_key() {
        let tracker = ResourceTracker::new();
        tracker.track("Pod", "web", "default").await;
        tracker.track("Pod", "web", "default").await;
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn same_name_in_other_namespace_is_a_distinct_entry() {
        let tracker = ResourceTracker::new();
        tracker.track("Pod", "web", "default").await;
        tracker.track("Pod", "web", "staging").await;
        assert_eq!(tracker.len().await, 2);
    }
}
