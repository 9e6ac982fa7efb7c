use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::tools::{KubeService, json_result, text_result};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct KubectlGetRequest {
    #[schemars(description = "Resource type, e.g. pods, deployments, nodes")]
    pub resource_type: String,

    #[schemars(description = "Resource name; omit to list all of the type")]
    pub name: Option<String>,

    #[schemars(description = "Namespace; ignored for cluster-scoped types")]
    pub namespace: Option<String>,

    #[schemars(description = "Output format: json, yaml, wide or name (default: json)")]
    pub output: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct KubectlDescribeRequest {
    #[schemars(description = "Resource type, e.g. pods, deployments, nodes")]
    pub resource_type: String,

    #[schemars(description = "Resource name; omit to describe all of the type")]
    pub name: Option<String>,

    #[schemars(description = "Namespace; ignored for cluster-scoped types")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct KubectlApplyRequest {
    #[schemars(description = "YAML or JSON manifest to apply; mutually exclusive with file")]
    pub manifest: Option<String>,

    #[schemars(description = "Path to a manifest file on the server host; mutually exclusive with manifest")]
    pub file: Option<String>,

    #[schemars(description = "Namespace for objects without one in the manifest")]
    pub namespace: Option<String>,
}

#[tool_router(router = tool_router_manifests, vis = "pub")]
impl KubeService {
    #[tool(description = "kubectl get for any resource type, including custom resources")]
    pub async fn kubectl_get(
        &self,
        Parameters(req): Parameters<KubectlGetRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let output_format = req.output.as_deref().unwrap_or("json");
        let output = self
            .state()
            .kubectl
            .get(
                &req.resource_type,
                req.name.as_deref(),
                req.namespace.as_deref(),
                output_format,
                &ctx.ct,
            )
            .await?;
        Ok(text_result(output.stdout))
    }

    #[tool(description = "kubectl describe for any resource type")]
    pub async fn kubectl_describe(
        &self,
        Parameters(req): Parameters<KubectlDescribeRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let output = self
            .state()
            .kubectl
            .describe(
                &req.resource_type,
                req.name.as_deref(),
                req.namespace.as_deref(),
                &ctx.ct,
            )
            .await?;
        Ok(text_result(output.stdout))
    }

    #[tool(
        description = "Apply an inline YAML/JSON manifest (fed to kubectl over stdin) or a manifest file on the server host"
    )]
    pub async fn kubectl_apply(
        &self,
        Parameters(req): Parameters<KubectlApplyRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let kubectl = &self.state().kubectl;
        let output = match (&req.manifest, &req.file) {
            (Some(manifest), None) => {
                if manifest.trim().is_empty() {
                    return Err(AppError::InvalidRequest("manifest is empty".to_string()).into());
                }
                kubectl
                    .apply_manifest(manifest, req.namespace.as_deref(), &ctx.ct)
                    .await?
            }
            (None, Some(file)) => {
                kubectl
                    .apply_file(file, req.namespace.as_deref(), &ctx.ct)
                    .await?
            }
            _ => {
                return Err(AppError::InvalidRequest(
                    "exactly one of manifest or file is required".to_string(),
                )
                .into());
            }
        };
        json_result(&json!({
            "success": true,
            "output": output.stdout,
        }))
    }
}
