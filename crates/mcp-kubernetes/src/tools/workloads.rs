use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{ListParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_DEPLOYMENT, created_at, delete_resource, get_resource};
use crate::kube::templates::resolve_template;
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateDeploymentRequest {
    #[schemars(description = "Deployment name")]
    pub name: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Container template: nginx, busybox, alpine or custom (default: nginx)")]
    pub template: Option<String>,

    #[schemars(description = "Image for the custom template")]
    pub image: Option<String>,

    #[schemars(description = "Command for the custom template")]
    pub command: Option<Vec<String>>,

    #[schemars(description = "Desired replica count (default: 1)")]
    pub replicas: Option<i32>,

    #[schemars(description = "Container ports to expose")]
    pub ports: Option<Vec<u16>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDeploymentsRequest {
    #[schemars(description = "Namespace to list (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribeDeploymentRequest {
    #[schemars(description = "Deployment name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScaleDeploymentRequest {
    #[schemars(description = "Deployment name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "New replica count")]
    pub replicas: i32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteDeploymentRequest {
    #[schemars(description = "Deployment name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Report a missing deployment as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

fn deployment_summary(deployment: &Deployment) -> serde_json::Value {
    let spec = deployment.spec.as_ref();
    let status = deployment.status.as_ref();
    json!({
        "name": deployment.name_any(),
        "namespace": deployment.namespace(),
        "replicas": spec.and_then(|s| s.replicas),
        "ready_replicas": status.and_then(|s| s.ready_replicas).unwrap_or(0),
        "created_at": created_at(deployment),
    })
}

#[tool_router(router = tool_router_workloads, vis = "pub")]
impl KubeService {
    #[tool(
        description = "Create a deployment from a named container template or custom image, with replica count and container ports. Tracked for bulk cleanup."
    )]
    pub async fn create_deployment(
        &self,
        Parameters(req): Parameters<CreateDeploymentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let template = req.template.as_deref().unwrap_or("nginx");
        let container_spec = resolve_template(template, req.image.as_deref(), req.command.clone())?;

        let labels = BTreeMap::from([("app".to_string(), req.name.clone())]);
        let mut container = container_spec.to_container(&req.name);
        if let Some(ports) = &req.ports {
            container.ports = Some(
                ports
                    .iter()
                    .map(|&p| ContainerPort {
                        container_port: i32::from(p),
                        ..Default::default()
                    })
                    .collect(),
            );
        }

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(req.replicas.unwrap_or(1)),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<Deployment>::namespaced(client, &namespace);
        let created = api
            .create(&PostParams::default(), &deployment)
            .await
            .map_err(AppError::from)?;

        self.state()
            .tracker
            .track(KIND_DEPLOYMENT, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "namespace": namespace,
            "replicas": req.replicas.unwrap_or(1),
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "List deployments in a namespace with desired and ready replica counts")]
    pub async fn list_deployments(
        &self,
        Parameters(req): Parameters<ListDeploymentsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Deployment>::namespaced(client, &namespace);
        let deployments = api
            .list(&ListParams::default())
            .await
            .map_err(AppError::from)?;
        let items: Vec<_> = deployments.items.iter().map(deployment_summary).collect();
        json_result(&json!({ "namespace": namespace, "deployments": items }))
    }

    #[tool(description = "Full definition and status of one deployment")]
    pub async fn describe_deployment(
        &self,
        Parameters(req): Parameters<DescribeDeploymentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Deployment>::namespaced(client, &namespace);
        let deployment = get_resource(&api, &req.name).await?;
        json_result(&deployment)
    }

    #[tool(description = "Scale a deployment to a new replica count via the scale subresource")]
    pub async fn scale_deployment(
        &self,
        Parameters(req): Parameters<ScaleDeploymentRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.replicas < 0 {
            return Err(AppError::InvalidRequest(
                "replicas must be non-negative".to_string(),
            )
            .into());
        }
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Deployment>::namespaced(client, &namespace);
        let patch = json!({ "spec": { "replicas": req.replicas } });
        api.patch_scale(&req.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(AppError::from)?;
        json_result(&json!({
            "success": true,
            "name": req.name,
            "namespace": namespace,
            "replicas": req.replicas,
        }))
    }
}

#[tool_router(router = tool_router_workloads_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a deployment. With ignore_not_found a missing deployment reports status not_found instead of failing.")]
    pub async fn delete_deployment(
        &self,
        Parameters(req): Parameters<DeleteDeploymentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Deployment>::namespaced(client, &namespace);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state()
            .tracker
            .untrack(KIND_DEPLOYMENT, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
            "namespace": namespace,
        }))
    }
}
