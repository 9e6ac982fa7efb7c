use std::fmt::Debug;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service};
use kube::api::WatchParams;
use kube::core::WatchEvent;
use kube::{Api, Resource, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::AppError;
use crate::registry::{EventSink, ForwardSpec, WatchInfo, WatchRegistry};
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PortForwardRequest {
    #[schemars(description = "Resource type to forward to: pod or service (default: pod)")]
    pub resource_type: Option<String>,

    #[schemars(description = "Pod or service name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Local port to listen on")]
    pub local_port: u16,

    #[schemars(description = "Port on the target resource (default: same as local_port)")]
    pub target_port: Option<u16>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StopPortForwardRequest {
    #[schemars(description = "Session id returned by port_forward")]
    pub id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WatchResourceRequest {
    #[schemars(
        description = "Resource type to watch: pods, deployments, services, configmaps or namespaces"
    )]
    pub resource_type: String,

    #[schemars(description = "Namespace to watch; ignored for namespaces (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PollWatchRequest {
    #[schemars(description = "Session id returned by watch_resource")]
    pub id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StopWatchRequest {
    #[schemars(description = "Session id returned by watch_resource")]
    pub id: String,
}

const FORWARDABLE: &[&str] = &["pod", "service"];

/// Streams watch events for one resource type into the session's sink
/// until the stream ends or the session is stopped.
async fn watch_loop<K>(api: Api<K>, sink: EventSink)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + 'static,
{
    let stream = match api.watch(&WatchParams::default(), "0").await {
        Ok(stream) => stream,
        Err(err) => {
            sink.push(format!("ERROR watch failed to start: {err}"));
            return;
        }
    };
    let mut stream = stream.boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(WatchEvent::Added(obj)) => sink.push(format!("ADDED {}", obj.name_any())),
            Ok(WatchEvent::Modified(obj)) => sink.push(format!("MODIFIED {}", obj.name_any())),
            Ok(WatchEvent::Deleted(obj)) => sink.push(format!("DELETED {}", obj.name_any())),
            Ok(WatchEvent::Bookmark(_)) => {}
            Ok(WatchEvent::Error(status)) => sink.push(format!("ERROR {}", status.message)),
            Err(err) => {
                sink.push(format!("ERROR {err}"));
                return;
            }
        }
    }
}

async fn start_watch<K>(
    registry: &Arc<WatchRegistry>,
    api: Api<K>,
    resource_type: &str,
    namespace: Option<&str>,
) -> WatchInfo
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + 'static,
{
    registry
        .start(resource_type, namespace, |sink| watch_loop(api, sink))
        .await
}

#[tool_router(router = tool_router_sessions, vis = "pub")]
impl KubeService {
    #[tool(
        description = "Start a background kubectl port-forward to a pod or service. Returns once the forward is listening; the session id can later be passed to stop_port_forward. Starting the same target and local port again replaces the prior session."
    )]
    pub async fn port_forward(
        &self,
        Parameters(req): Parameters<PortForwardRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let resource_type = req.resource_type.as_deref().unwrap_or("pod");
        if !FORWARDABLE.contains(&resource_type) {
            return Err(AppError::InvalidRequest(format!(
                "cannot port-forward to {resource_type} (expected one of {})",
                FORWARDABLE.join(", ")
            ))
            .into());
        }

        let spec = ForwardSpec {
            resource_type: resource_type.to_string(),
            name: req.name,
            namespace: namespace_or_default(req.namespace),
            local_port: req.local_port,
            target_port: req.target_port.unwrap_or(req.local_port),
        };
        let info = self.state().forwards.start(spec, ctx.ct.clone()).await?;
        json_result(&json!({ "success": true, "session": info }))
    }

    #[tool(description = "Stop a port-forward session and terminate its process")]
    pub async fn stop_port_forward(
        &self,
        Parameters(req): Parameters<StopPortForwardRequest>,
    ) -> Result<CallToolResult, McpError> {
        let info = self.state().forwards.stop(&req.id).await?;
        json_result(&json!({ "success": true, "session": info }))
    }

    #[tool(description = "List live port-forward sessions")]
    pub async fn list_port_forwards(&self) -> Result<CallToolResult, McpError> {
        let sessions = self.state().forwards.active().await;
        json_result(&json!({ "sessions": sessions }))
    }

    #[tool(
        description = "Start watching a resource type for changes. Events are buffered server-side; read them with poll_watch and end the session with stop_watch."
    )]
    pub async fn watch_resource(
        &self,
        Parameters(req): Parameters<WatchResourceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.state().provider.client().await?;
        let watches = &self.state().watches;
        let namespace = namespace_or_default(req.namespace);

        let info = match req.resource_type.as_str() {
            "pods" => {
                let api = Api::<Pod>::namespaced(client, &namespace);
                start_watch(watches, api, "pods", Some(&namespace)).await
            }
            "deployments" => {
                let api = Api::<Deployment>::namespaced(client, &namespace);
                start_watch(watches, api, "deployments", Some(&namespace)).await
            }
            "services" => {
                let api = Api::<Service>::namespaced(client, &namespace);
                start_watch(watches, api, "services", Some(&namespace)).await
            }
            "configmaps" => {
                let api = Api::<ConfigMap>::namespaced(client, &namespace);
                start_watch(watches, api, "configmaps", Some(&namespace)).await
            }
            "namespaces" => {
                let api = Api::<Namespace>::all(client);
                start_watch(watches, api, "namespaces", None).await
            }
            other => {
                return Err(AppError::InvalidRequest(format!(
                    "cannot watch {other} (expected pods, deployments, services, configmaps or namespaces)"
                ))
                .into());
            }
        };
        json_result(&json!({ "success": true, "session": info }))
    }

    #[tool(description = "Drain buffered events from a watch session")]
    pub async fn poll_watch(
        &self,
        Parameters(req): Parameters<PollWatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let events = self.state().watches.poll(&req.id).await?;
        json_result(&json!({ "id": req.id, "events": events }))
    }

    #[tool(description = "Stop a watch session and discard its buffer")]
    pub async fn stop_watch(
        &self,
        Parameters(req): Parameters<StopWatchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let info = self.state().watches.stop(&req.id).await?;
        json_result(&json!({ "success": true, "session": info }))
    }

    #[tool(description = "List live watch sessions")]
    pub async fn list_watches(&self) -> Result<CallToolResult, McpError> {
        let sessions = self.state().watches.active().await;
        json_result(&json!({ "sessions": sessions }))
    }
}
