use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_SERVICE, created_at, delete_resource, get_resource};
use crate::tools::{KubeService, json_result, namespace_or_default};

const SERVICE_TYPES: &[&str] = &["ClusterIP", "NodePort", "LoadBalancer"];

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ServicePortRequest {
    #[schemars(description = "Port exposed by the service")]
    pub port: u16,

    #[schemars(description = "Port on the backing pods (default: same as port)")]
    pub target_port: Option<u16>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateServiceRequest {
    #[schemars(description = "Service name")]
    pub name: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Port mappings")]
    pub ports: Vec<ServicePortRequest>,

    #[schemars(description = "Service type: ClusterIP, NodePort or LoadBalancer (default: ClusterIP)")]
    pub service_type: Option<String>,

    #[schemars(description = "Pod selector labels (default: app=<name>)")]
    pub selector: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListServicesRequest {
    #[schemars(description = "Namespace to list (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribeServiceRequest {
    #[schemars(description = "Service name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteServiceRequest {
    #[schemars(description = "Service name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Report a missing service as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

fn service_summary(service: &Service) -> serde_json::Value {
    let spec = service.spec.as_ref();
    let ports: Vec<_> = spec
        .and_then(|s| s.ports.clone())
        .unwrap_or_default()
        .iter()
        .map(|p| json!({ "port": p.port, "target_port": p.target_port, "node_port": p.node_port }))
        .collect();
    json!({
        "name": service.name_any(),
        "namespace": service.namespace(),
        "type": spec.and_then(|s| s.type_.clone()),
        "cluster_ip": spec.and_then(|s| s.cluster_ip.clone()),
        "ports": ports,
        "created_at": created_at(service),
    })
}

#[tool_router(router = tool_router_services, vis = "pub")]
impl KubeService {
    #[tool(description = "Create a service exposing pods selected by labels. Tracked for bulk cleanup.")]
    pub async fn create_service(
        &self,
        Parameters(req): Parameters<CreateServiceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let service_type = req.service_type.as_deref().unwrap_or("ClusterIP");
        if !SERVICE_TYPES.contains(&service_type) {
            return Err(AppError::InvalidRequest(format!(
                "unsupported service type: {service_type} (expected one of {})",
                SERVICE_TYPES.join(", ")
            ))
            .into());
        }
        if req.ports.is_empty() {
            return Err(
                AppError::InvalidRequest("at least one port mapping is required".to_string())
                    .into(),
            );
        }

        let selector = req
            .selector
            .clone()
            .unwrap_or_else(|| BTreeMap::from([("app".to_string(), req.name.clone())]));
        let ports: Vec<ServicePort> = req
            .ports
            .iter()
            .map(|p| ServicePort {
                port: i32::from(p.port),
                target_port: Some(IntOrString::Int(i32::from(p.target_port.unwrap_or(p.port)))),
                ..Default::default()
            })
            .collect();

        let service = Service {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(selector),
                ports: Some(ports),
                type_: Some(service_type.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<Service>::namespaced(client, &namespace);
        let created = api
            .create(&PostParams::default(), &service)
            .await
            .map_err(AppError::from)?;

        self.state()
            .tracker
            .track(KIND_SERVICE, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "namespace": namespace,
            "type": service_type,
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "List services in a namespace with type, cluster IP and ports")]
    pub async fn list_services(
        &self,
        Parameters(req): Parameters<ListServicesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Service>::namespaced(client, &namespace);
        let services = api
            .list(&ListParams::default())
            .await
            .map_err(AppError::from)?;
        let items: Vec<_> = services.items.iter().map(service_summary).collect();
        json_result(&json!({ "namespace": namespace, "services": items }))
    }

    #[tool(description = "Full definition and status of one service")]
    pub async fn describe_service(
        &self,
        Parameters(req): Parameters<DescribeServiceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Service>::namespaced(client, &namespace);
        let service = get_resource(&api, &req.name).await?;
        json_result(&service)
    }
}

#[tool_router(router = tool_router_services_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a service. With ignore_not_found a missing service reports status not_found instead of failing.")]
    pub async fn delete_service(
        &self,
        Parameters(req): Parameters<DeleteServiceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Service>::namespaced(client, &namespace);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state()
            .tracker
            .untrack(KIND_SERVICE, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
            "namespace": namespace,
        }))
    }
}
