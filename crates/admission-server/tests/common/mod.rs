use admission_evaluator::config::{AdmissionSettings, KEY_SCHEDULER_SERVICE_ADDRESS};
use admission_server::{config::Config, AdmissionServer};
use axum::Router;
use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

pub(crate) fn default_test_config() -> Config {
    // nothing listens there, configuration validation fails open
    let admission_settings = AdmissionSettings::from_map(&BTreeMap::from([(
        KEY_SCHEDULER_SERVICE_ADDRESS.to_owned(),
        "127.0.0.1:1".to_owned(),
    )]));

    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 9089)),
        tls_config: None,
        admission_settings,
        validation_timeout: Duration::from_secs(1),
        ignore_kubernetes_connection_failure: false,
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) async fn app(config: Config) -> Router {
    let _ = rustls::crypto::ring::default_provider().install_default();

    // never reach out to whatever cluster the local kubeconfig points to
    let server = AdmissionServer::new_with_client(config, None).await.unwrap();

    server.router()
}
