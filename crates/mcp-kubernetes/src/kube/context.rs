use std::collections::HashMap;
use std::path::Path;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::AppError;

/// The cluster/user/namespace triple a context name resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct ContextDetail {
    pub name: String,
    pub cluster: String,
    pub user: Option<String>,
    pub namespace: Option<String>,
}

/// Lazily constructs `kube::Client`s for the active kube-context.
///
/// Clients are cached per context name. Switching the active context
/// never mutates an already-constructed client; it only changes which
/// cache slot subsequent `client()` calls resolve through, so callers
/// must not hold a client across a switch.
pub struct ClientProvider {
    kubeconfig: Kubeconfig,
    active: RwLock<Option<String>>,
    clients: RwLock<HashMap<String, Client>>,
}

impl ClientProvider {
    pub fn new(kubeconfig: Kubeconfig, initial_context: Option<String>) -> Result<Self, AppError> {
        let active = match initial_context {
            Some(name) => {
                ensure_known_context(&kubeconfig, &name)?;
                Some(name)
            }
            None => kubeconfig.current_context.clone(),
        };
        Ok(Self {
            kubeconfig,
            active: RwLock::new(active),
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Reads the kubeconfig from an explicit path or standard discovery
    /// (`$KUBECONFIG`, then `~/.kube/config`). An absent kubeconfig is
    /// not fatal: in-cluster configuration still works through
    /// `Client::try_default`, just without named contexts.
    pub fn from_disk(
        path: Option<&Path>,
        initial_context: Option<String>,
    ) -> Result<Self, AppError> {
        let kubeconfig = match path {
            Some(p) => Kubeconfig::read_from(p)?,
            None => match Kubeconfig::read() {
                Ok(kc) => kc,
                Err(err) => {
                    tracing::warn!("No kubeconfig found ({err}), assuming in-cluster config");
                    Kubeconfig::default()
                }
            },
        };
        Self::new(kubeconfig, initial_context)
    }

    /// Client for the active context, constructed on first use.
    pub async fn client(&self) -> Result<Client, AppError> {
        let active = self.active.read().await.clone();
        let Some(context) = active else {
            // No named context: in-cluster or env-driven configuration.
            return Client::try_default()
                .await
                .map_err(AppError::from);
        };

        if let Some(client) = self.clients.read().await.get(&context) {
            return Ok(client.clone());
        }

        let options = KubeConfigOptions {
            context: Some(context.clone()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(self.kubeconfig.clone(), &options).await?;
        let client = Client::try_from(config)?;

        let mut clients = self.clients.write().await;
        // Another caller may have built the same client concurrently;
        // last writer wins, both clients are equivalent.
        clients.insert(context, client.clone());
        Ok(client)
    }

    pub fn contexts(&self) -> Vec<ContextDetail> {
        self.kubeconfig
            .contexts
            .iter()
            .map(|named| {
                let ctx = named.context.clone().unwrap_or_default();
                ContextDetail {
                    name: named.name.clone(),
                    cluster: ctx.cluster,
                    user: ctx.user,
                    namespace: ctx.namespace,
                }
            })
            .collect()
    }

    pub async fn current_context(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    pub async fn current_context_detail(&self) -> Result<ContextDetail, AppError> {
        let Some(active) = self.current_context().await else {
            return Err(AppError::NotFound("no active kube-context".to_string()));
        };
        self.contexts()
            .into_iter()
            .find(|c| c.name == active)
            .ok_or_else(|| AppError::NotFound(format!("context {active} not in kubeconfig")))
    }

    /// Switches the active context. Fails without side effects when the
    /// name is not declared in the kubeconfig.
    pub async fn set_current_context(&self, name: &str) -> Result<(), AppError> {
        ensure_known_context(&self.kubeconfig, name)?;
        let mut active = self.active.write().await;
        *active = Some(name.to_string());
        tracing::info!("Active kube-context switched to {name}");
        Ok(())
    }
}

fn ensure_known_context(kubeconfig: &Kubeconfig, name: &str) -> Result<(), AppError> {
    if kubeconfig.contexts.iter().any(|c| c.name == name) {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(format!(
            "context {name} is not declared in the kubeconfig"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::config::{Context, NamedContext};

    fn test_kubeconfig() -> Kubeconfig {
        Kubeconfig {
            current_context: Some("dev".to_string()),
            contexts: vec![
                NamedContext {
                    name: "dev".to_string(),
                    context: Some(Context {
                        cluster: "dev-cluster".to_string(),
                        user: Some("dev-user".to_string()),
                        namespace: Some("default".to_string()),
                        ..Default::default()
                    }),
                },
                NamedContext {
                    name: "prod".to_string(),
                    context: Some(Context {
                        cluster: "prod-cluster".to_string(),
                        user: Some("prod-user".to_string()),
                        namespace: None,
                        ..Default::default()
                    }),
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn starts_from_kubeconfig_current_context() {
        let provider = ClientProvider::new(test_kubeconfig(), None).unwrap();
        assert_eq!(provider.current_context().await.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn switch_to_known_context_takes_effect() {
        let provider = ClientProvider::new(test_kubeconfig(), None).unwrap();
        provider.set_current_context("prod").await.unwrap();
        assert_eq!(provider.current_context().await.as_deref(), Some("prod"));

        let detail = provider.current_context_detail().await.unwrap();
        assert_eq!(detail.cluster, "prod-cluster");
        assert_eq!(detail.user.as_deref(), Some("prod-user"));
        assert_eq!(detail.namespace, None);
    }

    #[tokio::test]
    async fn switch_to_unknown_context_is_rejected_and_state_unchanged() {
        let provider = ClientProvider::new(test_kubeconfig(), None).unwrap();
        let err = provider.set_current_context("nope").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(provider.current_context().await.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn unknown_initial_context_is_rejected() {
        let err = ClientProvider::new(test_kubeconfig(), Some("nope".to_string()))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn contexts_expose_the_bound_triple() {
        let provider = ClientProvider::new(test_kubeconfig(), None).unwrap();
        let contexts = provider.contexts();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].name, "dev");
        assert_eq!(contexts[0].namespace.as_deref(), Some("default"));
    }
}
