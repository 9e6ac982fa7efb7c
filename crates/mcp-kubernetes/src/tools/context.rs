use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::tools::{KubeService, json_result};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCurrentContextRequest {
    #[schemars(description = "Include the cluster, user and namespace the context binds")]
    pub detailed: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetCurrentContextRequest {
    #[schemars(description = "Context name as declared in the kubeconfig")]
    pub name: String,
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl KubeService {
    #[tool(description = "List the kube-contexts declared in the kubeconfig")]
    pub async fn list_contexts(&self) -> Result<CallToolResult, McpError> {
        let provider = &self.state().provider;
        let current = provider.current_context().await;
        json_result(&json!({
            "contexts": provider.contexts(),
            "current": current,
        }))
    }

    #[tool(description = "The active kube-context, optionally with its cluster, user and namespace")]
    pub async fn get_current_context(
        &self,
        Parameters(req): Parameters<GetCurrentContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let provider = &self.state().provider;
        if req.detailed.unwrap_or(false) {
            let detail = provider.current_context_detail().await?;
            json_result(&json!({ "context": detail }))
        } else {
            json_result(&json!({ "context": provider.current_context().await }))
        }
    }

    #[tool(
        description = "Switch the active kube-context. All subsequent tools run against the new context. Fails without side effects when the name is unknown."
    )]
    pub async fn set_current_context(
        &self,
        Parameters(req): Parameters<SetCurrentContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.state().provider.set_current_context(&req.name).await?;
        json_result(&json!({ "success": true, "context": req.name }))
    }
}
