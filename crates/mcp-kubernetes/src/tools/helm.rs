use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::exec::helm::ChartSpec;
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InstallHelmChartRequest {
    #[schemars(description = "Release name")]
    pub name: String,

    #[schemars(description = "Chart reference, e.g. bitnami/nginx")]
    pub chart: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Chart repository URL to add before installing")]
    pub repo: Option<String>,

    #[schemars(description = "Values overriding the chart defaults")]
    pub values: Option<serde_json::Value>,

    #[schemars(description = "Chart version to pin")]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpgradeHelmChartRequest {
    #[schemars(description = "Release name")]
    pub name: String,

    #[schemars(description = "Chart reference, e.g. bitnami/nginx")]
    pub chart: String,

    #[schemars(description = "Release namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Chart repository URL to refresh before upgrading")]
    pub repo: Option<String>,

    #[schemars(description = "Values overriding the chart defaults")]
    pub values: Option<serde_json::Value>,

    #[schemars(description = "Chart version to pin")]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UninstallHelmChartRequest {
    #[schemars(description = "Release name")]
    pub name: String,

    #[schemars(description = "Release namespace (default: default)")]
    pub namespace: Option<String>,
}

fn chart_spec(
    name: String,
    chart: String,
    namespace: String,
    repo: Option<String>,
    values: Option<serde_json::Value>,
    version: Option<String>,
) -> ChartSpec {
    ChartSpec {
        name,
        chart,
        namespace,
        repo,
        values,
        version,
    }
}

#[tool_router(router = tool_router_helm, vis = "pub")]
impl KubeService {
    #[tool(
        description = "Install a helm chart as a named release, adding the chart repo first when a repo URL is given. Creates the namespace if needed."
    )]
    pub async fn install_helm_chart(
        &self,
        Parameters(req): Parameters<InstallHelmChartRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let spec = chart_spec(
            req.name.clone(),
            req.chart.clone(),
            namespace.clone(),
            req.repo,
            req.values,
            req.version,
        );
        let output = self.state().helm.install(&spec, &ctx.ct).await?;
        json_result(&json!({
            "success": true,
            "release": req.name,
            "chart": req.chart,
            "namespace": namespace,
            "output": output.stdout,
        }))
    }

    #[tool(description = "Upgrade an existing helm release to a new chart version or values")]
    pub async fn upgrade_helm_chart(
        &self,
        Parameters(req): Parameters<UpgradeHelmChartRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let spec = chart_spec(
            req.name.clone(),
            req.chart.clone(),
            namespace.clone(),
            req.repo,
            req.values,
            req.version,
        );
        let output = self.state().helm.upgrade(&spec, &ctx.ct).await?;
        json_result(&json!({
            "success": true,
            "release": req.name,
            "chart": req.chart,
            "namespace": namespace,
            "output": output.stdout,
        }))
    }
}

#[tool_router(router = tool_router_helm_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Uninstall a helm release from its namespace")]
    pub async fn uninstall_helm_chart(
        &self,
        Parameters(req): Parameters<UninstallHelmChartRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let output = self
            .state()
            .helm
            .uninstall(&req.name, &namespace, &ctx.ct)
            .await?;
        json_result(&json!({
            "success": true,
            "release": req.name,
            "namespace": namespace,
            "output": output.stdout,
        }))
    }
}
