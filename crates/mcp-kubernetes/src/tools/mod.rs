mod batch;
mod cleanup;
mod configmaps;
mod context;
mod diagnostics;
mod helm;
mod manifests;
mod namespaces;
mod pods;
mod services;
mod sessions;
mod workloads;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool_handler};
use serde::Serialize;

use crate::state::AppState;

pub const DEFAULT_NAMESPACE: &str = "default";

/// The MCP service: one tool router assembled once at startup. In
/// non-destructive mode the delete/uninstall/cleanup-class routers are
/// simply never added.
#[derive(Clone)]
pub struct KubeService {
    state: AppState,
    tool_router: ToolRouter<Self>,
}

impl KubeService {
    pub fn new(state: AppState, non_destructive: bool) -> Self {
        let mut tool_router = Self::tool_router_pods()
            + Self::tool_router_workloads()
            + Self::tool_router_services()
            + Self::tool_router_namespaces()
            + Self::tool_router_configmaps()
            + Self::tool_router_batch()
            + Self::tool_router_diagnostics()
            + Self::tool_router_manifests()
            + Self::tool_router_helm()
            + Self::tool_router_sessions()
            + Self::tool_router_context();
        if !non_destructive {
            tool_router = tool_router
                + Self::tool_router_pods_destructive()
                + Self::tool_router_workloads_destructive()
                + Self::tool_router_services_destructive()
                + Self::tool_router_namespaces_destructive()
                + Self::tool_router_configmaps_destructive()
                + Self::tool_router_batch_destructive()
                + Self::tool_router_helm_destructive()
                + Self::tool_router_cleanup();
        }
        Self { state, tool_router }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect()
    }
}

#[tool_handler]
impl ServerHandler for KubeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Kubernetes cluster management over MCP: create, inspect and delete pods, \
                 deployments, services, namespaces, configmaps, jobs and cronjobs; apply raw \
                 manifests; install and uninstall Helm releases; read logs and events; manage \
                 port-forward and watch sessions; switch kube-contexts. Resources created \
                 through these tools are tracked and can be bulk-removed with `cleanup`."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

/// Wraps a serializable payload in the protocol's content envelope.
pub(crate) fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub(crate) fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

pub(crate) fn namespace_or_default(namespace: Option<String>) -> String {
    namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::kube::ClientProvider;
    use kube::config::Kubeconfig;

    fn service(non_destructive: bool) -> KubeService {
        let provider = ClientProvider::new(Kubeconfig::default(), None).unwrap();
        let state = AppState::new(provider, &AppConfig::default());
        KubeService::new(state, non_destructive)
    }

    fn is_destructive(name: &str) -> bool {
        name.starts_with("delete_") || name.starts_with("uninstall_") || name == "cleanup"
    }

    #[test]
    fn non_destructive_router_lists_no_destructive_tools() {
        let names = service(true).tool_names();
        assert!(!names.is_empty());
        let destructive: Vec<_> = names.iter().filter(|n| is_destructive(n)).collect();
        assert!(destructive.is_empty(), "unexpected tools: {destructive:?}");
    }

    #[test]
    fn full_router_keeps_the_destructive_tools() {
        let names = service(false).tool_names();
        for expected in ["delete_pod", "delete_namespace", "uninstall_helm_chart", "cleanup"] {
            assert!(names.iter().any(|n| n == expected), "{expected} missing");
        }
    }
}
