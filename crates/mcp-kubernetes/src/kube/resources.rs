use std::fmt::Debug;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service};
use kube::api::DeleteParams;
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// What a delete call actually did, once 404 handling is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            DeleteOutcome::Deleted => "deleted",
            DeleteOutcome::NotFound => "not_found",
        }
    }
}

/// Deletes one object, translating a 404 into `DeleteOutcome::NotFound`
/// when the caller opted in via `ignore_not_found`. Without the opt-in
/// a 404 surfaces as `AppError::NotFound`.
pub async fn delete_resource<K>(
    api: &Api<K>,
    name: &str,
    ignore_not_found: bool,
) -> Result<DeleteOutcome, AppError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(DeleteOutcome::Deleted),
        Err(kube::Error::Api(resp)) if resp.code == 404 => {
            if ignore_not_found {
                Ok(DeleteOutcome::NotFound)
            } else {
                Err(AppError::NotFound(format!("{name}: {}", resp.message)))
            }
        }
        Err(err) => Err(AppError::from(err)),
    }
}

/// Gets one object, mapping a 404 onto `AppError::NotFound`.
pub async fn get_resource<K>(api: &Api<K>, name: &str) -> Result<K, AppError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(obj),
        Err(kube::Error::Api(resp)) if resp.code == 404 => {
            Err(AppError::NotFound(format!("{name}: {}", resp.message)))
        }
        Err(err) => Err(AppError::from(err)),
    }
}

pub fn created_at<K: ResourceExt>(obj: &K) -> chrono::DateTime<chrono::Utc> {
    obj.creation_timestamp()
        .map(|t| t.0)
        .unwrap_or_else(chrono::Utc::now)
}

/// Tracked-resource kinds this server creates and can bulk-delete.
pub const KIND_POD: &str = "Pod";
pub const KIND_DEPLOYMENT: &str = "Deployment";
pub const KIND_SERVICE: &str = "Service";
pub const KIND_NAMESPACE: &str = "Namespace";
pub const KIND_CONFIGMAP: &str = "ConfigMap";
pub const KIND_CRONJOB: &str = "CronJob";
pub const KIND_JOB: &str = "Job";

/// Dispatches a delete by tracked kind. Used by the bulk-cleanup tool,
/// which only ever sees kinds this process itself created.
pub async fn delete_by_kind(
    client: Client,
    kind: &str,
    name: &str,
    namespace: &str,
) -> Result<DeleteOutcome, AppError> {
    match kind {
        KIND_POD => {
            delete_resource(&Api::<Pod>::namespaced(client, namespace), name, true).await
        }
        KIND_DEPLOYMENT => {
            delete_resource(&Api::<Deployment>::namespaced(client, namespace), name, true).await
        }
        KIND_SERVICE => {
            delete_resource(&Api::<Service>::namespaced(client, namespace), name, true).await
        }
        KIND_CONFIGMAP => {
            delete_resource(&Api::<ConfigMap>::namespaced(client, namespace), name, true).await
        }
        KIND_CRONJOB => {
            delete_resource(&Api::<CronJob>::namespaced(client, namespace), name, true).await
        }
        KIND_JOB => {
            delete_resource(&Api::<Job>::namespaced(client, namespace), name, true).await
        }
        KIND_NAMESPACE => delete_resource(&Api::<Namespace>::all(client), name, true).await,
        other => Err(AppError::InvalidRequest(format!(
            "unsupported resource kind: {other}"
        ))),
    }
}
