use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::api::{ListParams, LogParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{created_at, get_resource};
use crate::tools::{KubeService, json_result, namespace_or_default, text_result};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetLogsRequest {
    #[schemars(description = "Pod name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Container name for multi-container pods")]
    pub container: Option<String>,

    #[schemars(description = "Limit output to the last N lines")]
    pub tail: Option<i64>,

    #[schemars(description = "Only logs newer than this many seconds")]
    pub since_seconds: Option<i64>,

    #[schemars(description = "Logs of the previous container instance after a restart")]
    pub previous: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetEventsRequest {
    #[schemars(description = "Namespace to read events from (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Only events involving this object name")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListNodesRequest {
    #[schemars(description = "Label selector, e.g. node-role.kubernetes.io/worker=")]
    pub label_selector: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribeNodeRequest {
    #[schemars(description = "Node name")]
    pub name: String,
}

fn node_summary(node: &Node) -> serde_json::Value {
    let status = node.status.as_ref();
    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True")
        .unwrap_or(false);
    json!({
        "name": node.name_any(),
        "ready": ready,
        "kubelet_version": status
            .and_then(|s| s.node_info.as_ref())
            .map(|info| info.kubelet_version.clone()),
        "created_at": created_at(node),
    })
}

fn event_summary(event: &Event) -> serde_json::Value {
    json!({
        "type": event.type_,
        "reason": event.reason,
        "message": event.message,
        "object": format!(
            "{}/{}",
            event.involved_object.kind.as_deref().unwrap_or(""),
            event.involved_object.name.as_deref().unwrap_or(""),
        ),
        "count": event.count,
        "last_seen": event.last_timestamp.as_ref().map(|t| t.0.to_rfc3339()),
    })
}

#[tool_router(router = tool_router_diagnostics, vis = "pub")]
impl KubeService {
    #[tool(description = "Container logs of a pod, optionally the previous instance after a restart")]
    pub async fn get_logs(
        &self,
        Parameters(req): Parameters<GetLogsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Pod>::namespaced(client, &namespace);
        let params = LogParams {
            container: req.container,
            tail_lines: req.tail,
            since_seconds: req.since_seconds,
            previous: req.previous.unwrap_or(false),
            ..Default::default()
        };
        let logs = api.logs(&req.name, &params).await.map_err(AppError::from)?;
        Ok(text_result(logs))
    }

    #[tool(description = "Recent events in a namespace, optionally filtered to one object")]
    pub async fn get_events(
        &self,
        Parameters(req): Parameters<GetEventsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Event>::namespaced(client, &namespace);
        let mut params = ListParams::default();
        if let Some(name) = &req.name {
            params = params.fields(&format!("involvedObject.name={name}"));
        }
        let events = api.list(&params).await.map_err(AppError::from)?;
        let items: Vec<_> = events.items.iter().map(event_summary).collect();
        json_result(&json!({ "namespace": namespace, "events": items }))
    }

    #[tool(description = "List cluster nodes with readiness and kubelet version")]
    pub async fn list_nodes(
        &self,
        Parameters(req): Parameters<ListNodesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.state().provider.client().await?;
        let api = Api::<Node>::all(client);
        let mut params = ListParams::default();
        if let Some(selector) = &req.label_selector {
            params = params.labels(selector);
        }
        let nodes = api.list(&params).await.map_err(AppError::from)?;
        let items: Vec<_> = nodes.items.iter().map(node_summary).collect();
        json_result(&json!({ "nodes": items }))
    }

    #[tool(description = "Full definition and status of one node")]
    pub async fn describe_node(
        &self,
        Parameters(req): Parameters<DescribeNodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.state().provider.client().await?;
        let api = Api::<Node>::all(client);
        let node = get_resource(&api, &req.name).await?;
        json_result(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus, ObjectReference};

    #[test]
    fn node_summary_reads_the_ready_condition() {
        let node = Node {
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(node_summary(&node)["ready"], true);
        assert_eq!(node_summary(&Node::default())["ready"], false);
    }

    #[test]
    fn event_summary_names_the_involved_object() {
        let event = Event {
            involved_object: ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some("web".to_string()),
                ..Default::default()
            },
            reason: Some("Started".to_string()),
            ..Default::default()
        };
        assert_eq!(event_summary(&event)["object"], "Pod/web");
    }
}
