use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodTemplateSpec};
use kube::api::{ListParams, LogParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::{ErrorData as McpError, schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::kube::resources::{KIND_CRONJOB, created_at, delete_resource, get_resource};
use crate::kube::templates::resolve_template;
use crate::tools::{KubeService, json_result, namespace_or_default};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateCronJobRequest {
    #[schemars(description = "CronJob name")]
    pub name: String,

    #[schemars(description = "Target namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Cron schedule, e.g. */5 * * * *")]
    pub schedule: String,

    #[schemars(description = "Container template: nginx, busybox, alpine or custom (default: busybox)")]
    pub template: Option<String>,

    #[schemars(description = "Image for the custom template")]
    pub image: Option<String>,

    #[schemars(description = "Command for the custom template")]
    pub command: Option<Vec<String>>,

    #[schemars(description = "Create the cronjob suspended")]
    pub suspend: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListCronJobsRequest {
    #[schemars(description = "Namespace to list (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DescribeCronJobRequest {
    #[schemars(description = "CronJob name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListJobsRequest {
    #[schemars(description = "Namespace to list (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Only jobs spawned by this cronjob")]
    pub cronjob: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetJobLogsRequest {
    #[schemars(description = "Job name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Limit output to the last N lines per pod")]
    pub tail: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteCronJobRequest {
    #[schemars(description = "CronJob name")]
    pub name: String,

    #[schemars(description = "Namespace (default: default)")]
    pub namespace: Option<String>,

    #[schemars(description = "Report a missing cronjob as success instead of an error")]
    pub ignore_not_found: Option<bool>,
}

fn owned_by_cronjob(job: &Job, cronjob: &str) -> bool {
    job.owner_references()
        .iter()
        .any(|r| r.kind == "CronJob" && r.name == cronjob)
}

fn job_summary(job: &Job) -> serde_json::Value {
    let status = job.status.as_ref();
    json!({
        "name": job.name_any(),
        "namespace": job.namespace(),
        "active": status.and_then(|s| s.active).unwrap_or(0),
        "succeeded": status.and_then(|s| s.succeeded).unwrap_or(0),
        "failed": status.and_then(|s| s.failed).unwrap_or(0),
        "created_at": created_at(job),
    })
}

#[tool_router(router = tool_router_batch, vis = "pub")]
impl KubeService {
    #[tool(description = "Create a cronjob running a templated or custom container on a cron schedule. Tracked for bulk cleanup.")]
    pub async fn create_cronjob(
        &self,
        Parameters(req): Parameters<CreateCronJobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let template = req.template.as_deref().unwrap_or("busybox");
        let container_spec = resolve_template(template, req.image.as_deref(), req.command.clone())?;

        let cronjob = CronJob {
            metadata: ObjectMeta {
                name: Some(req.name.clone()),
                ..Default::default()
            },
            spec: Some(CronJobSpec {
                schedule: req.schedule.clone(),
                suspend: req.suspend,
                job_template: JobTemplateSpec {
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            spec: Some(PodSpec {
                                containers: vec![container_spec.to_container(&req.name)],
                                restart_policy: Some("OnFailure".to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let client = self.state().provider.client().await?;
        let api = Api::<CronJob>::namespaced(client, &namespace);
        let created = api
            .create(&PostParams::default(), &cronjob)
            .await
            .map_err(AppError::from)?;

        self.state()
            .tracker
            .track(KIND_CRONJOB, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "name": created.name_any(),
            "namespace": namespace,
            "schedule": req.schedule,
            "suspended": req.suspend.unwrap_or(false),
            "created_at": created_at(&created),
        }))
    }

    #[tool(description = "List cronjobs in a namespace with schedule and last run time")]
    pub async fn list_cronjobs(
        &self,
        Parameters(req): Parameters<ListCronJobsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<CronJob>::namespaced(client, &namespace);
        let cronjobs = api
            .list(&ListParams::default())
            .await
            .map_err(AppError::from)?;
        let items: Vec<_> = cronjobs
            .items
            .iter()
            .map(|cj| {
                let spec = cj.spec.as_ref();
                json!({
                    "name": cj.name_any(),
                    "schedule": spec.map(|s| s.schedule.clone()),
                    "suspended": spec.and_then(|s| s.suspend).unwrap_or(false),
                    "last_schedule_time": cj.status.as_ref().and_then(|s| s.last_schedule_time.as_ref()).map(|t| t.0.to_rfc3339()),
                    "created_at": created_at(cj),
                })
            })
            .collect();
        json_result(&json!({ "namespace": namespace, "cronjobs": items }))
    }

    #[tool(description = "Full definition and status of one cronjob")]
    pub async fn describe_cronjob(
        &self,
        Parameters(req): Parameters<DescribeCronJobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<CronJob>::namespaced(client, &namespace);
        let cronjob = get_resource(&api, &req.name).await?;
        json_result(&cronjob)
    }

    #[tool(description = "List jobs in a namespace, optionally only those spawned by a given cronjob")]
    pub async fn list_jobs(
        &self,
        Parameters(req): Parameters<ListJobsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<Job>::namespaced(client, &namespace);
        let jobs = api
            .list(&ListParams::default())
            .await
            .map_err(AppError::from)?;
        let items: Vec<_> = jobs
            .items
            .iter()
            .filter(|job| match &req.cronjob {
                Some(cronjob) => owned_by_cronjob(job, cronjob),
                None => true,
            })
            .map(job_summary)
            .collect();
        json_result(&json!({ "namespace": namespace, "jobs": items }))
    }

    #[tool(description = "Logs of all pods belonging to a job")]
    pub async fn get_job_logs(
        &self,
        Parameters(req): Parameters<GetJobLogsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let pods = Api::<Pod>::namespaced(client, &namespace);

        let selector = format!("job-name={}", req.name);
        let list = pods
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(AppError::from)?;
        if list.items.is_empty() {
            return Err(AppError::NotFound(format!(
                "no pods found for job {}/{}",
                namespace, req.name
            ))
            .into());
        }

        let params = LogParams {
            tail_lines: req.tail,
            ..Default::default()
        };
        let mut logs = serde_json::Map::new();
        for pod in &list.items {
            let name = pod.name_any();
            let text = pods.logs(&name, &params).await.map_err(AppError::from)?;
            logs.insert(name, json!(text));
        }
        json_result(&json!({ "job": req.name, "namespace": namespace, "logs": logs }))
    }
}

#[tool_router(router = tool_router_batch_destructive, vis = "pub")]
impl KubeService {
    #[tool(description = "Delete a cronjob. With ignore_not_found a missing cronjob reports status not_found instead of failing.")]
    pub async fn delete_cronjob(
        &self,
        Parameters(req): Parameters<DeleteCronJobRequest>,
    ) -> Result<CallToolResult, McpError> {
        let namespace = namespace_or_default(req.namespace);
        let client = self.state().provider.client().await?;
        let api = Api::<CronJob>::namespaced(client, &namespace);
        let outcome =
            delete_resource(&api, &req.name, req.ignore_not_found.unwrap_or(false)).await?;

        self.state()
            .tracker
            .untrack(KIND_CRONJOB, &req.name, &namespace)
            .await;
        json_result(&json!({
            "success": true,
            "status": outcome.status(),
            "name": req.name,
            "namespace": namespace,
        }))
    }
}
