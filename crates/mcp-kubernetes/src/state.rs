use std::sync::Arc;

use crate::config::AppConfig;
use crate::exec::helm::Helm;
use crate::exec::kubectl::Kubectl;
use crate::kube::ClientProvider;
use crate::registry::{PortForwardRegistry, ResourceTracker, WatchRegistry};

/// Everything the tool handlers share. Explicitly owned and injected
/// into the service at construction; independent instances per test.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ClientProvider>,
    pub tracker: Arc<ResourceTracker>,
    pub forwards: Arc<PortForwardRegistry>,
    pub watches: Arc<WatchRegistry>,
    pub kubectl: Arc<Kubectl>,
    pub helm: Arc<Helm>,
}

impl AppState {
    pub fn new(provider: ClientProvider, config: &AppConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            tracker: Arc::new(ResourceTracker::new()),
            forwards: Arc::new(PortForwardRegistry::new(
                "kubectl",
                config.timeouts.port_forward_ready(),
            )),
            watches: Arc::new(WatchRegistry::new()),
            kubectl: Arc::new(Kubectl::new(config.timeouts.cli())),
            helm: Arc::new(Helm::new(config.timeouts.cli())),
        }
    }
}
