use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, PodSpec};
use kube::api::{ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_POD, created_at, delete_resource, get_resource};
use crate::kube::templates::resolve_template;
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreatePodRequest {
    #[schemars(description = "Pod name")]
    pub name: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Container template: nginx, busybox, alpine or custom (default: nginx)")]
    pub template: Option<String>,

    #[schemars(description = "Image for the custom template")]
    pub image: Option<String>,

    #[schemars(description = "Command for the custom template")]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListPodsRequest {
    #[schemars(description = "Namespace to list (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Label selector, e.g. app=web")]
    pub label_selector: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribePodRequest {
    #[schemars(description = "Pod name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeletePodRequest {
    #[schemars(description = "Pod name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Report a missing pod as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

fn pod_summary(pod: &Pod) -> serde_json::Value {
    json!({
        "name": pod.name_any(),
        "namespace": pod.namespace(),
        "phase": pod.status.as_ref().and_then(|s| s.phase.clone()),
        "node": pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        "created_at": created_at(pod),
    })
}

#[tool_router(router = tool_router_pods, vis = "pub")]
impl KubeService {
    #[tool(
        description = "Create a pod from a named container template (nginx, busybox, alpine) or a custom image. The pod is tracked for bulk cleanup."
    )]
    pub async fn create_pod(
        &self,
        Parameters(req): Parameters<CreatePodRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let template = req.template.as_deref().unwrap_or("nginx");
        let container = resolve_template(template, req.image.as_deref(), req.command.clone())?;

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                labels: Some(BTreeMap::from([("app".to_string(), req.name.clone())])),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container.to_container(&req.name)],
                ..Default::default()
            }),
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<Pod>::namespaced(client, &namespace);
        let created = api
            .create(&PostParams::default(), &pod)
            .await
            .map_err(AppError::from)?;

        self.state().tracker.track(KIND_POD, &req.name, &namespace).await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "namespace": namespace,
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "List pods in a namespace with phase and node placement")]
    pub async fn list_pods(
        &self,
        Parameters(req): Parameters<ListPodsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Pod>::namespaced(client, &namespace);

        let mut params = ListParams::default();
        if let Some(selector) = &req.label_selector {
            params = params.labels(selector);
        }
        let pods = api.list(&params).await.map_err(AppError::from)?;
        let items: Vec<_> = pods.items.iter().map(pod_summary).collect();
        json_result(&json!({ "namespace": namespace, "pods": items }))
    }

    #[tool(description = "Full definition and status of one pod")]
    pub async fn describe_pod(
        &self,
        Parameters(req): Parameters<DescribePodRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Pod>::namespaced(client, &namespace);
        let pod = get_resource(&api, &req.name).await?;
        json_result(&pod)
    }
}

#[tool_router(router = tool_router_pods_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a pod. With ignore_not_found a missing pod reports status not_found instead of failing.")]
    pub async fn delete_pod(
        &self,
        Parameters(req): Parameters<DeletePodRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Pod>::namespaced(client, &namespace);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state().tracker.untrack(KIND_POD, &req.name, &namespace).await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
            "namespace": namespace,
        }))
    }
}
