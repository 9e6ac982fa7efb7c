use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, tool, tool_router};
use serde_json::json;

use crate::kube::resources::delete_by_kind;
use crate::tools::{KubeService, json_result};

#[tool_router(router = tool_router_cleanup, vis = "pub")]
impl KubeService {
    #[tool(description = "List every resource created through this server that is still tracked")]
    pub async fn list_tracked_resources(&self) -> Result<CallToolResult, McpError> {
        let resources = self.state().tracker.list().await;
        json_result(&json!({
            "count": resources.len(),
            "resources": resources,
        }))
    }

    #[tool(
        description = "Delete every tracked resource. Objects already gone from the cluster count as cleaned. Entries whose deletion fails stay tracked for a later retry; the per-resource results are reported either way."
    )]
    pub async fn cleanup(&self) -> Result<CallToolResult, McpError> {
        let tracked = self.state().tracker.list().await;
        let mut results = Vec::with_capacity(tracked.len());
        let mut cleaned = 0usize;
        let mut failed = 0usize;

        for entry in tracked {
            let client = self.state().provider.client().await?;
            match delete_by_kind(client, &entry.kind, &entry.name, &entry.namespace).await {
                Ok(outcome) => {
                    self.state()
                        .tracker
                        .untrack(&entry.kind, &entry.name, &entry.namespace)
                        .await;
                    cleaned += 1;
                    results.push(json!({
                        "kind": entry.kind,
                        "name": entry.name,
                        "namespace": entry.namespace,
                        "status": outcome.status(),
                    }));
                }
                Err(err) => {
                    tracing::warn!(
                        "Cleanup of {} {}/{} failed: {err}",
                        entry.kind,
                        entry.namespace,
                        entry.name
                    );
                    failed += 1;
                    results.push(json!({
                        "kind": entry.kind,
                        "name": entry.name,
                        "namespace": entry.namespace,
                        "status": "failed",
                        "error": err.to_string(),
                    }));
                }
            }
        }

        json_result(&json!({
            "success": failed == 0,
            "cleaned": cleaned,
            "failed": failed,
            "results": results,
        }))
    }
}
