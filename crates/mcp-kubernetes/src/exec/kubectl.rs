use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::exec::{ExecOutput, run, run_with_input};

/// Resource types kubectl addresses without a namespace flag.
const CLUSTER_SCOPED: &[&str] = &[
    "nodes",
    "namespaces",
    "persistentvolumes",
    "storageclasses",
    "clusterroles",
    "clusterrolebindings",
    "customresourcedefinitions",
];

fn is_cluster_scoped(resource_type: &str) -> bool {
    CLUSTER_SCOPED.contains(&resource_type)
}

/// Thin facade over the `kubectl` binary for the operations the API
/// client does not cover well (describe, arbitrary get, apply).
pub struct Kubectl {
    program: String,
    timeout: Duration,
}

impl Kubectl {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "kubectl".to_string(),
            timeout,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    pub async fn get(
        &self,
        resource_type: &str,
        name: Option<&str>,
        namespace: Option<&str>,
        output: &str,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        let args = get_args(resource_type, name, namespace, output);
        run(self.command(&args), self.timeout, ct).await
    }

    pub async fn describe(
        &self,
        resource_type: &str,
        name: Option<&str>,
        namespace: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        let args = describe_args(resource_type, name, namespace);
        run(self.command(&args), self.timeout, ct).await
    }

    /// `kubectl apply -f -` with the manifest fed over stdin.
    pub async fn apply_manifest(
        &self,
        manifest: &str,
        namespace: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        let args = apply_args("-", namespace);
        run_with_input(self.command(&args), manifest, self.timeout, ct).await
    }

    pub async fn apply_file(
        &self,
        path: &str,
        namespace: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        let args = apply_args(path, namespace);
        run(self.command(&args), self.timeout, ct).await
    }
}

fn get_args(
    resource_type: &str,
    name: Option<&str>,
    namespace: Option<&str>,
    output: &str,
) -> Vec<String> {
    let mut args = vec!["get".to_string(), resource_type.to_string()];
    if let Some(name) = name {
        args.push(name.to_string());
    }
    if let Some(ns) = namespace
        && !is_cluster_scoped(resource_type)
    {
        args.push("-n".to_string());
        args.push(ns.to_string());
    }
    args.push("-o".to_string());
    args.push(output.to_string());
    args
}

fn describe_args(resource_type: &str, name: Option<&str>, namespace: Option<&str>) -> Vec<String> {
    let mut args = vec!["describe".to_string(), resource_type.to_string()];
    if let Some(name) = name {
        args.push(name.to_string());
    }
    if let Some(ns) = namespace
        && !is_cluster_scoped(resource_type)
    {
        args.push("-n".to_string());
        args.push(ns.to_string());
    }
    args
}

fn apply_args(file: &str, namespace: Option<&str>) -> Vec<String> {
    let mut args = vec!["apply".to_string(), "-f".to_string(), file.to_string()];
    if let Some(ns) = namespace {
        args.push("-n".to_string());
        args.push(ns.to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn get_addresses_named_namespaced_resources() {
        let args = get_args("pods", Some("web"), Some("default"), "json");
        assert_eq!(args, ["get", "pods", "web", "-n", "default", "-o", "json"]);
    }

    #[rstest]
    #[case("nodes")]
    #[case("namespaces")]
    fn cluster_scoped_types_get_no_namespace_flag(#[case] resource_type: &str) {
        let args = get_args(resource_type, None, Some("default"), "wide");
        assert!(!args.contains(&"-n".to_string()));
    }

    #[test]
    fn apply_defaults_to_stdin() {
        assert_eq!(apply_args("-", None), ["apply", "-f", "-"]);
        assert_eq!(
            apply_args("deploy.yaml", Some("staging")),
            ["apply", "-f", "deploy.yaml", "-n", "staging"]
        );
    }

    #[test]
    fn describe_without_name_lists_the_type() {
        assert_eq!(
            describe_args("deployments", None, Some("default")),
            ["describe", "deployments", "-n", "default"]
        );
    }
}
