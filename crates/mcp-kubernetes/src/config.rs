use clap::{Parser, ValueEnum};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "mcp-kubernetes")]
#[command(about = "MCP server exposing Kubernetes cluster management tools", long_about = None)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = "./config.yaml", help = "Path to configuration file")]
    pub config: PathBuf,

    #[arg(long, env = "MCP_K8S_TRANSPORT", help = "Transport: stdio or streamable-http")]
    pub transport: Option<Transport>,

    #[arg(long, env = "HOST", help = "HTTP bind address (streamable-http transport)")]
    pub host: Option<String>,

    #[arg(long, env = "PORT", help = "HTTP bind port (streamable-http transport)")]
    pub port: Option<u16>,

    #[arg(long, env = "LOG_LEVEL", help = "Log level: trace, debug, info, warn, error")]
    pub log_level: Option<String>,

    #[arg(long, env = "KUBECONFIG_PATH", help = "Explicit kubeconfig path (defaults to standard discovery)")]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, env = "KUBE_CONTEXT", help = "Kube-context to activate at startup")]
    pub kube_context: Option<String>,

    #[arg(
        long,
        env = "NON_DESTRUCTIVE_TOOLS",
        help = "Restrict the tool registry to non-destructive tools (no delete/uninstall/cleanup)"
    )]
    pub non_destructive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    Stdio,
    StreamableHttp,
}

fn remove_nulls(value: serde_json::Value) -> serde_json::Value {
    use serde_json::{Map, Value};

    match value {
        Value::Object(map) => {
            let filtered: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| {
                    let cleaned = remove_nulls(v);
                    if cleaned.is_null() {
                        None
                    } else if let Value::Object(ref obj) = cleaned {
                        if obj.is_empty() { None } else { Some((k, cleaned)) }
                    } else {
                        Some((k, cleaned))
                    }
                })
                .collect();
            Value::Object(filtered)
        }
        other => other,
    }
}

impl Cli {
    fn to_figment_map(&self) -> serde_json::Value {
        use serde_json::json;

        let value = json!({
            "server": {
                "transport": self.transport,
                "host": self.host,
                "port": self.port,
                "log_level": self.log_level,
            },
            "kubernetes": {
                "kubeconfig": self.kubeconfig,
                "context": self.kube_context,
            },
            "tools": {
                "non_destructive": if self.non_destructive { Some(true) } else { None },
            }
        });

        remove_nulls(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_transport")]
    pub transport: Transport,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// How long a port-forward may take to print its readiness marker.
    #[serde(default = "default_port_forward_ready_ms")]
    pub port_forward_ready_ms: u64,

    /// Wall-clock limit for synchronous kubectl/helm invocations.
    #[serde(default = "default_cli_ms")]
    pub cli_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub non_destructive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_transport() -> Transport {
    Transport::Stdio
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port_forward_ready_ms() -> u64 {
    5_000
}

fn default_cli_ms() -> u64 {
    60_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            port_forward_ready_ms: default_port_forward_ready_ms(),
            cli_ms: default_cli_ms(),
        }
    }
}

impl TimeoutsConfig {
    pub fn port_forward_ready(&self) -> Duration {
        Duration::from_millis(self.port_forward_ready_ms)
    }

    pub fn cli(&self) -> Duration {
        Duration::from_millis(self.cli_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            kubernetes: KubernetesConfig::default(),
            timeouts: TimeoutsConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Cli::parse();
        Self::load_from(&cli)
    }

    fn load_from(cli: &Cli) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if cli.config.exists() {
            figment = figment.merge(Yaml::file(&cli.config));
        }

        figment = figment
            .merge(Env::prefixed("MCP_K8S_").split("__"))
            .merge(Serialized::defaults(cli.to_figment_map()));

        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timeouts() {
        let config = AppConfig::default();
        assert_eq!(config.timeouts.port_forward_ready_ms, 5_000);
        assert_eq!(config.timeouts.cli_ms, 60_000);
        assert_eq!(config.server.transport, Transport::Stdio);
        assert!(!config.tools.non_destructive);
    }

    #[test]
    fn cli_overlay_wins_over_defaults() {
        let cli = Cli {
            config: PathBuf::from("/nonexistent/config.yaml"),
            transport: Some(Transport::StreamableHttp),
            host: None,
            port: Some(8080),
            log_level: None,
            kubeconfig: None,
            kube_context: Some("staging".to_string()),
            non_destructive: true,
        };
        let config = AppConfig::load_from(&cli).expect("config should load");
        assert_eq!(config.server.transport, Transport::StreamableHttp);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.kubernetes.context.as_deref(), Some("staging"));
        assert!(config.tools.non_destructive);
    }
}
