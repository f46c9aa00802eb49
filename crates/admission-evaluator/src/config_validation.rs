use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::admission_request::AdmissionRequest;
use crate::admission_response::AdmissionResponse;
use crate::config::AdmissionConfig;
use crate::constants::{CONFIG_MAP_NAME, CONFIG_MAP_QUEUES_KEY, VALIDATE_CONF_PATH};
use crate::errors::{ConfigValidationError, DecodeError, MutationError, ValidationServiceError};

pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Answer of the scheduler validation endpoint
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub allowed: bool,
    #[serde(default)]
    pub reason: String,
}

/// Checks a scheduler configuration with the scheduler itself before it is
/// persisted.
///
/// The check fails open: when the scheduler cannot be reached, or answers
/// with anything but a well formed verdict, the configuration is accepted.
#[derive(Clone, Debug)]
pub struct ConfigValidationEngine {
    client: reqwest::Client,
    url: String,
}

impl ConfigValidationEngine {
    pub fn new(
        config: &AdmissionConfig,
        timeout: Duration,
    ) -> Result<Self, ValidationServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ValidationServiceError::Transport)?;
        Ok(ConfigValidationEngine {
            client,
            url: format!(
                "http://{}{}",
                config.scheduler_service_address(),
                VALIDATE_CONF_PATH
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Validate the queues configuration carried by `config_map`. Only an
    /// explicit rejection by the scheduler is reported as an error.
    pub async fn validate(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), ConfigValidationError> {
        let Some(payload) = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(CONFIG_MAP_QUEUES_KEY))
        else {
            debug!(namespace, "no queues configuration to validate");
            return Ok(());
        };

        match self.call(payload.clone()).await {
            Ok(verdict) if verdict.allowed => {
                debug!(namespace, "scheduler configuration accepted");
                Ok(())
            }
            Ok(verdict) => {
                info!(namespace, reason = verdict.reason.as_str(), "scheduler configuration rejected");
                Err(ConfigValidationError::Denied(verdict.reason))
            }
            Err(error) => {
                warn!(
                    namespace,
                    url = self.url.as_str(),
                    error = %error,
                    "cannot validate scheduler configuration, accepting it"
                );
                Ok(())
            }
        }
    }

    async fn call(&self, payload: String) -> Result<ValidationVerdict, ValidationServiceError> {
        let response = self
            .client
            .post(&self.url)
            .body(payload)
            .send()
            .await
            .map_err(ValidationServiceError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidationServiceError::UnexpectedStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(ValidationServiceError::Body)?;
        serde_json::from_slice(&body).map_err(ValidationServiceError::MalformedResponse)
    }

    /// Admission decision for a ConfigMap change. Only the scheduler
    /// configuration is validated, every other ConfigMap is allowed.
    pub async fn review(&self, request: Option<&AdmissionRequest>) -> AdmissionResponse {
        let Some(request) = request else {
            let error = MutationError::EmptyRequest;
            return AdmissionResponse::reject(String::new(), error.to_string(), error.code());
        };
        let uid = request.uid.clone();

        if request.kind.kind != "ConfigMap" {
            debug!(kind = request.kind.kind.as_str(), "not a ConfigMap, passing through");
            return AdmissionResponse::allow(uid);
        }
        let Some(raw) = request.object.as_ref() else {
            return AdmissionResponse::allow(uid);
        };
        let config_map: ConfigMap = match serde_json::from_value(raw.0.clone()) {
            Ok(config_map) => config_map,
            Err(source) => {
                let error = DecodeError::Malformed {
                    kind: "ConfigMap".to_owned(),
                    source,
                };
                return AdmissionResponse::reject(uid, error.to_string(), 400);
            }
        };

        let name = config_map
            .metadata
            .name
            .as_deref()
            .or(request.name.as_deref())
            .unwrap_or_default();
        if name != CONFIG_MAP_NAME {
            debug!(name, "not the scheduler configuration, passing through");
            return AdmissionResponse::allow(uid);
        }

        match self.validate(request.namespace(), &config_map).await {
            Ok(()) => AdmissionResponse::allow(uid),
            Err(error) => AdmissionResponse::reject(uid, error.to_string(), 400),
        }
    }
}
