pub mod api;
pub mod cli;
mod certs;
mod cluster_watch;
pub mod config;
pub mod tracing;

use ::tracing::{info, warn};
use admission_evaluator::{
    cache::{NamespaceCache, PriorityClassCache},
    config::AdmissionConfig,
    config_validation::ConfigValidationEngine,
    mutation::MutationEngine,
};
use anyhow::{anyhow, Result};
use axum::{
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;

use crate::api::{
    handlers::{health_handler, mutate_handler, validate_conf_handler},
    state::ApiServerState,
};
use crate::config::Config;

pub struct AdmissionServer {
    router: Router,
    addr: SocketAddr,
    tls_config: Option<RustlsConfig>,
    watchers: Vec<JoinHandle<()>>,
}

impl AdmissionServer {
    /// Build the server, connecting to the cluster the process runs in
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let client = match kube::Client::try_default().await {
            Ok(client) => Some(client),
            Err(e) => {
                if config.ignore_kubernetes_connection_failure {
                    warn!(
                        error = %e,
                        "Cannot connect to Kubernetes, namespace annotations and priority classes will be ignored"
                    );
                    None
                } else {
                    return Err(anyhow!("Cannot connect to Kubernetes cluster: {e}"));
                }
            }
        };

        Self::new_with_client(config, client).await
    }

    /// Build the server on top of an existing Kubernetes client. Without a
    /// client the namespace and priority class caches stay empty.
    pub async fn new_with_client(config: Config, client: Option<kube::Client>) -> Result<Self> {
        let admission_config = Arc::new(AdmissionConfig::new(&config.admission_settings));
        info!(
            scheduler_service_address = admission_config.scheduler_service_address(),
            bypass_auth = admission_config.bypass_auth(),
            trust_controllers = admission_config.trust_controllers(),
            "admission configuration loaded"
        );

        let namespaces = Arc::new(NamespaceCache::new());
        let priority_classes = Arc::new(PriorityClassCache::new());

        let watchers = match client {
            Some(client) => cluster_watch::spawn_watchers(
                client,
                namespaces.clone(),
                priority_classes.clone(),
            ),
            None => Vec::new(),
        };

        let config_validation_engine =
            ConfigValidationEngine::new(&admission_config, config.validation_timeout)?;
        let mutation_engine = MutationEngine::new(admission_config, namespaces, priority_classes);

        let state = Arc::new(ApiServerState {
            mutation_engine,
            config_validation_engine,
        });

        let tls_config = match &config.tls_config {
            Some(tls_config) => Some(certs::create_tls_config(tls_config).await?),
            None => None,
        };

        let router = Router::new()
            .route("/mutate", post(mutate_handler))
            .route("/validate-conf", post(validate_conf_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        Ok(Self {
            router,
            addr: config.addr,
            tls_config,
            watchers,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self) -> Result<()> {
        info!(
            address = %self.addr,
            tls = self.tls_config.is_some(),
            "started HTTP server"
        );

        let service = self.router.into_make_service();
        let result = match self.tls_config {
            Some(tls_config) => {
                axum_server::bind_rustls(self.addr, tls_config)
                    .serve(service)
                    .await
            }
            None => axum_server::bind(self.addr).serve(service).await,
        };

        for watcher in &self.watchers {
            watcher.abort();
        }

        result.map_err(|e| anyhow!("HTTP server error: {e}"))
    }
}
