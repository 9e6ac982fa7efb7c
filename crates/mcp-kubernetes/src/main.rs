mod config;
mod error;
mod exec;
mod kube;
mod registry;
mod state;
mod tools;

use anyhow::Context;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Transport};
use crate::kube::ClientProvider;
use crate::state::AppState;
use crate::tools::KubeService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    // Stdout carries the protocol on the stdio transport; logs always
    // go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let provider = ClientProvider::from_disk(
        config.kubernetes.kubeconfig.as_deref(),
        config.kubernetes.context.clone(),
    )
    .context("failed to load kubeconfig")?;
    let state = AppState::new(provider, &config);
    let non_destructive = config.tools.non_destructive;
    if non_destructive {
        tracing::info!("Non-destructive mode: delete, uninstall and cleanup tools are disabled");
    }

    match config.server.transport {
        Transport::Stdio => {
            tracing::info!("Serving MCP over stdio");
            let service = KubeService::new(state, non_destructive)
                .serve(stdio())
                .await
                .context("failed to start stdio transport")?;
            service.waiting().await?;
        }
        Transport::StreamableHttp => {
            let addr = format!("{}:{}", config.server.host, config.server.port);
            tracing::info!("Serving MCP over streamable HTTP on {addr}/mcp");
            let service = StreamableHttpService::new(
                move || Ok(KubeService::new(state.clone(), non_destructive)),
                LocalSessionManager::default().into(),
                Default::default(),
            );
            let router = axum::Router::new().nest_service("/mcp", service);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
    }

    Ok(())
}
