use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_NAMESPACE, created_at, delete_resource};
use crate::tools::{KubeService, json_result};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateNamespaceRequest {
    #[schemars(description = "Namespace name")]
    pub name: String,

    #[schemars(description = "Labels to set on the namespace")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListNamespacesRequest {
    #[schemars(description = "Label selector, e.g. team=platform")]
    pub label_selector: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteNamespaceRequest {
    #[schemars(description = "Namespace name")]
    pub name: String,

    #[schemars(description = "Report a missing namespace as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

#[tool_router(router = tool_router_namespaces, vis = "pub")]
impl KubeService {
    #[tool(description = "Create a namespace. Tracked for bulk cleanup.")]
    pub async fn create_namespace(
        &self,
        Parameters(req): Parameters<CreateNamespaceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                labels: req.labels.clone(),
                ..Default::default()
            },
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<Namespace>::all(client);
        let created = api
            .create(&PostParams::default(), &namespace)
            .await
            .map_err(AppError::from)?;

        self.state().tracker.track(KIND_NAMESPACE, &req.name, "").await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "List namespaces with their phase")]
    pub async fn list_namespaces(
        &self,
        Parameters(req): Parameters<ListNamespacesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.state().provider.client().await?;
        let api = Api::<Namespace>::all(client);
        let mut params = ListParams::default();
        if let Some(selector) = &req.label_selector {
            params = params.labels(selector);
        }
        let namespaces = api.list(&params).await.map_err(AppError::from)?;
        let items: Vec<_> = namespaces
            .items
            .iter()
            .map(|ns| {
                json!({
                    "name": ns.name_any(),
                    "phase": ns.status.as_ref().and_then(|s| s.phase.clone()),
                    "created_at": created_at(ns),
                })
            })
            .collect();
        json_result(&json!({ "namespaces": items }))
    }
}

#[tool_router(router = tool_router_namespaces_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a namespace and everything in it. With ignore_not_found a missing namespace reports status not_found instead of failing.")]
    pub async fn delete_namespace(
        &self,
        Parameters(req): Parameters<DeleteNamespaceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.state().provider.client().await?;
        let api = Api::<Namespace>::all(client);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state().tracker.untrack(KIND_NAMESPACE, &req.name, "").await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
        }))
    }
}
