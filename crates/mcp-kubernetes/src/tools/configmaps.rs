use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_CONFIGMAP, created_at, delete_resource, get_resource};
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateConfigMapRequest {
    #[schemars(description = "ConfigMap name")]
    pub name: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Key/value data")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetConfigMapRequest {
    #[schemars(description = "ConfigMap name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateConfigMapRequest {
    #[schemars(description = "ConfigMap name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Replacement key/value data")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteConfigMapRequest {
    #[schemars(description = "ConfigMap name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Report a missing configmap as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

#[tool_router(router = tool_router_configmaps, vis = "pub")]
impl KubeService {
    #[tool(description = "Create a configmap from key/value data. Tracked for bulk cleanup.")]
    pub async fn create_configmap(
        &self,
        Parameters(req): Parameters<CreateConfigMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                ..Default::default()
            },
            data: Some(req.data.clone()),
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<ConfigMap>::namespaced(client, &namespace);
        let created = api
            .create(&PostParams::default(), &configmap)
            .await
            .map_err(AppError::from)?;

        self.state()
            .tracker
            .track(KIND_CONFIGMAP, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "namespace": namespace,
            "keys": req.data.keys().collect::<Vec<_>>(),
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "Read a configmap's data")]
    pub async fn get_configmap(
        &self,
        Parameters(req): Parameters<GetConfigMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<ConfigMap>::namespaced(client, &namespace);
        let configmap = get_resource(&api, &req.name).await?;
        json_result(&json!({
            "name": configmap.name_any(),
            "namespace": namespace,
            "data": configmap.data,
            "created_at": created_at(&configmap),
        }))
    }

    #[tool(description = "Replace a configmap's data wholesale")]
    pub async fn update_configmap(
        &self,
        Parameters(req): Parameters<UpdateConfigMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<ConfigMap>::namespaced(client, &namespace);

        let mut configmap = get_resource(&api, &req.name).await?;
        configmap.data = Some(req.data.clone());
        configmap.metadata.managed_fields = None;
        let updated = api
            .replace(&req.name, &PostParams::default(), &configmap)
            .await
            .map_err(AppError::from)?;

        json_result(&json!({
            "success": true,
            "name": updated.name_any(),
            "namespace": namespace,
            "keys": req.data.keys().collect::<Vec<_>>(),
        }))
    }
}

#[tool_router(router = tool_router_configmaps_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a configmap. With ignore_not_found a missing configmap reports status not_found instead of failing.")]
    pub async fn delete_configmap(
        &self,
        Parameters(req): Parameters<DeleteConfigMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<ConfigMap>::namespaced(client, &namespace);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state()
            .tracker
            .untrack(KIND_CONFIGMAP, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
            "namespace": namespace,
        }))
    }
}
