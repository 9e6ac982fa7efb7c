use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::exec::{ExecOutput, run};

/// A release to install or upgrade.
pub struct ChartSpec {
    pub name: String,
    pub chart: String,
    pub namespace: String,
    pub repo: Option<String>,
    pub values: Option<serde_json::Value>,
    pub version: Option<String>,
}

/// Temporary values file fed to helm via `-f`. Removed on drop, so it
/// never survives the call, success or failure.
struct ValuesFile {
    path: PathBuf,
}

impl ValuesFile {
    fn create(release: &str, values: &serde_json::Value) -> Result<Self, AppError> {
        // Unique per call so concurrent operations on one release
        // cannot clobber each other's file.
        let path = std::env::temp_dir().join(format!(
            "{release}-values-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        // JSON is valid YAML; helm accepts it as-is.
        std::fs::write(&path, serde_json::to_string_pretty(values)?)?;
        Ok(Self { path })
    }

    fn path_arg(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl Drop for ValuesFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove values file {}: {err}", self.path.display());
        }
    }
}

/// Facade over the `helm` binary.
pub struct Helm {
    program: String,
    timeout: Duration,
}

impl Helm {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "helm".to_string(),
            timeout,
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    /// `helm install`, adding and refreshing the chart repo first when
    /// a repo URL is given.
    pub async fn install(
        &self,
        spec: &ChartSpec,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        self.ensure_repo(spec, ct).await?;
        self.release_command("install", spec, ct).await
    }

    pub async fn upgrade(
        &self,
        spec: &ChartSpec,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        self.ensure_repo(spec, ct).await?;
        self.release_command("upgrade", spec, ct).await
    }

    pub async fn uninstall(
        &self,
        name: &str,
        namespace: &str,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        let args = uninstall_args(name, namespace);
        run(self.command(&args), self.timeout, ct).await
    }

    async fn ensure_repo(&self, spec: &ChartSpec, ct: &CancellationToken) -> Result<(), AppError> {
        let Some(repo_url) = &spec.repo else {
            return Ok(());
        };
        let repo_name = repo_name_of(&spec.chart)?;
        run(
            self.command(&[
                "repo".to_string(),
                "add".to_string(),
                repo_name.to_string(),
                repo_url.clone(),
            ]),
            self.timeout,
            ct,
        )
        .await?;
        run(
            self.command(&["repo".to_string(), "update".to_string()]),
            self.timeout,
            ct,
        )
        .await?;
        Ok(())
    }

    async fn release_command(
        &self,
        verb: &str,
        spec: &ChartSpec,
        ct: &CancellationToken,
    ) -> Result<ExecOutput, AppError> {
        // The guard lives across the helm call and cleans up the file
        // on every exit path.
        let values_file = spec
            .values
            .as_ref()
            .map(|v| ValuesFile::create(&spec.name, v))
            .transpose()?;
        let args = release_args(verb, spec, values_file.as_ref().map(ValuesFile::path_arg));
        run(self.command(&args), self.timeout, ct).await
    }
}

fn repo_name_of(chart: &str) -> Result<&str, AppError> {
    chart
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("chart reference {chart} has no repo prefix")))
}

fn release_args(verb: &str, spec: &ChartSpec, values_path: Option<String>) -> Vec<String> {
    let mut args = vec![
        verb.to_string(),
        spec.name.clone(),
        spec.chart.clone(),
        "--namespace".to_string(),
        spec.namespace.clone(),
    ];
    if verb == "install" {
        args.push("--create-namespace".to_string());
    }
    if let Some(version) = &spec.version {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if let Some(path) = values_path {
        args.push("-f".to_string());
        args.push(path);
    }
    args
}

fn uninstall_args(name: &str, namespace: &str) -> Vec<String> {
    vec![
        "uninstall".to_string(),
        name.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(values: Option<serde_json::Value>) -> ChartSpec {
        ChartSpec {
            name: "web".to_string(),
            chart: "bitnami/nginx".to_string(),
            namespace: "default".to_string(),
            repo: Some("https://charts.bitnami.com/bitnami".to_string()),
            values,
            version: None,
        }
    }

    #[test]
    fn values_file_is_removed_on_drop() {
        let path = {
            let file = ValuesFile::create("drop-test", &json!({"replicaCount": 2})).unwrap();
            assert!(file.path.exists());
            file.path.clone()
        };
        assert!(!path.exists());
    }

    #[test]
    fn values_files_for_the_same_release_do_not_collide() {
        let first = ValuesFile::create("web", &json!({"a": 1})).unwrap();
        let second = ValuesFile::create("web", &json!({"a": 2})).unwrap();
        assert_ne!(first.path, second.path);
        assert!(first.path.exists() && second.path.exists());
    }

    #[test]
    fn install_args_create_the_namespace() {
        let args = release_args("install", &spec(None), None);
        assert_eq!(
            args,
            [
                "install",
                "web",
                "bitnami/nginx",
                "--namespace",
                "default",
                "--create-namespace"
            ]
        );
    }

    #[test]
    fn upgrade_args_skip_create_namespace_and_carry_values() {
        let args = release_args("upgrade", &spec(None), Some("/tmp/web-values.yaml".to_string()));
        assert!(!args.contains(&"--create-namespace".to_string()));
        assert_eq!(args[args.len() - 2..], ["-f", "/tmp/web-values.yaml"]);
    }

    #[test]
    fn repo_name_comes_from_the_chart_prefix() {
        assert_eq!(repo_name_of("bitnami/nginx").unwrap(), "bitnami");
        assert!(repo_name_of("/nginx").is_err());
    }

    #[test]
    fn uninstall_targets_the_release_namespace() {
        assert_eq!(
            uninstall_args("web", "staging"),
            ["uninstall", "web", "--namespace", "staging"]
        );
    }
}
