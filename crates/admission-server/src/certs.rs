use anyhow::{anyhow, Result};
use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

pub(crate) async fn create_tls_config(tls_config: &TlsConfig) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls_config.cert_file, &tls_config.key_file)
        .await
        .map_err(|e| {
            anyhow!(
                "cannot load TLS certificate {} and key {}: {}",
                tls_config.cert_file,
                tls_config.key_file,
                e
            )
        })
}
