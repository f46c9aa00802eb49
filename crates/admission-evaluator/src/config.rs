use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::SettingsError;
use crate::regex_list::RegexList;

pub const KEY_SCHEDULER_SERVICE_ADDRESS: &str =
    "admissionController.webHook.schedulerServiceAddress";
pub const KEY_PROCESS_NAMESPACES: &str = "admissionController.filtering.processNamespaces";
pub const KEY_BYPASS_NAMESPACES: &str = "admissionController.filtering.bypassNamespaces";
pub const KEY_LABEL_NAMESPACES: &str = "admissionController.filtering.labelNamespaces";
pub const KEY_NO_LABEL_NAMESPACES: &str = "admissionController.filtering.noLabelNamespaces";
pub const KEY_BYPASS_AUTH: &str = "admissionController.accessControl.bypassAuth";
pub const KEY_TRUST_CONTROLLERS: &str = "admissionController.accessControl.trustControllers";
pub const KEY_SYSTEM_USERS: &str = "admissionController.accessControl.systemUsers";
pub const KEY_EXTERNAL_USERS: &str = "admissionController.accessControl.externalUsers";
pub const KEY_EXTERNAL_GROUPS: &str = "admissionController.accessControl.externalGroups";

pub const DEFAULT_SCHEDULER_SERVICE_ADDRESS: &str = "yunikorn-service:9080";
pub const DEFAULT_BYPASS_NAMESPACES: &str = "^kube-system$";
pub const DEFAULT_SYSTEM_USERS: &str = "^system:serviceaccount:kube-system:";
pub const DEFAULT_BYPASS_AUTH: bool = false;
pub const DEFAULT_TRUST_CONTROLLERS: bool = true;

/// The raw admission controller settings, exactly as they are written by
/// the operator. Nothing is validated here, see [`AdmissionConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionSettings {
    pub scheduler_service_address: String,
    pub process_namespaces: String,
    pub bypass_namespaces: String,
    pub label_namespaces: String,
    pub no_label_namespaces: String,
    pub bypass_auth: String,
    pub trust_controllers: String,
    pub system_users: String,
    pub external_users: String,
    pub external_groups: String,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        AdmissionSettings {
            scheduler_service_address: DEFAULT_SCHEDULER_SERVICE_ADDRESS.to_owned(),
            process_namespaces: String::new(),
            bypass_namespaces: DEFAULT_BYPASS_NAMESPACES.to_owned(),
            label_namespaces: String::new(),
            no_label_namespaces: String::new(),
            bypass_auth: DEFAULT_BYPASS_AUTH.to_string(),
            trust_controllers: DEFAULT_TRUST_CONTROLLERS.to_string(),
            system_users: DEFAULT_SYSTEM_USERS.to_owned(),
            external_users: String::new(),
            external_groups: String::new(),
        }
    }
}

impl AdmissionSettings {
    /// Build the settings from a flat key/value map, the same shape used by
    /// the scheduler ConfigMap. Missing keys keep their default value.
    pub fn from_map(values: &BTreeMap<String, String>) -> Self {
        let mut settings = AdmissionSettings::default();
        for (key, value) in values {
            let field = match key.as_str() {
                KEY_SCHEDULER_SERVICE_ADDRESS => &mut settings.scheduler_service_address,
                KEY_PROCESS_NAMESPACES => &mut settings.process_namespaces,
                KEY_BYPASS_NAMESPACES => &mut settings.bypass_namespaces,
                KEY_LABEL_NAMESPACES => &mut settings.label_namespaces,
                KEY_NO_LABEL_NAMESPACES => &mut settings.no_label_namespaces,
                KEY_BYPASS_AUTH => &mut settings.bypass_auth,
                KEY_TRUST_CONTROLLERS => &mut settings.trust_controllers,
                KEY_SYSTEM_USERS => &mut settings.system_users,
                KEY_EXTERNAL_USERS => &mut settings.external_users,
                KEY_EXTERNAL_GROUPS => &mut settings.external_groups,
                _ => {
                    debug!(key = key.as_str(), "ignoring unknown admission setting");
                    continue;
                }
            };
            *field = value.clone();
        }
        settings
    }

    /// Parse a YAML document holding a flat map of settings. Scalar values
    /// of any type are accepted, `bypassAuth: true` and `bypassAuth: "true"`
    /// are equivalent.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SettingsError> {
        let raw: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(contents).map_err(SettingsError::Yaml)?;
        let values = raw
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Null => String::new(),
                    other => {
                        warn!(key = key.as_str(), value = ?other, "ignoring non scalar admission setting");
                        return None;
                    }
                };
                Some((key, value))
            })
            .collect();
        Ok(AdmissionSettings::from_map(&values))
    }

    pub fn read_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        AdmissionSettings::from_yaml_str(&contents)
    }
}

/// Immutable configuration snapshot used by every admission decision.
///
/// It is built once from [`AdmissionSettings`]. Bad input never aborts the
/// construction: a pattern list that cannot be compiled is replaced by its
/// default, an unparsable boolean takes its default value.
#[derive(Clone, Debug)]
pub struct AdmissionConfig {
    scheduler_service_address: String,
    process_namespaces: RegexList,
    bypass_namespaces: RegexList,
    label_namespaces: RegexList,
    no_label_namespaces: RegexList,
    bypass_auth: bool,
    trust_controllers: bool,
    system_users: RegexList,
    external_users: RegexList,
    external_groups: RegexList,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig::new(&AdmissionSettings::default())
    }
}

impl AdmissionConfig {
    pub fn new(settings: &AdmissionSettings) -> Self {
        AdmissionConfig {
            scheduler_service_address: settings.scheduler_service_address.trim().to_owned(),
            process_namespaces: regex_list_or(
                KEY_PROCESS_NAMESPACES,
                &settings.process_namespaces,
                "",
            ),
            bypass_namespaces: regex_list_or(
                KEY_BYPASS_NAMESPACES,
                &settings.bypass_namespaces,
                DEFAULT_BYPASS_NAMESPACES,
            ),
            label_namespaces: regex_list_or(KEY_LABEL_NAMESPACES, &settings.label_namespaces, ""),
            no_label_namespaces: regex_list_or(
                KEY_NO_LABEL_NAMESPACES,
                &settings.no_label_namespaces,
                "",
            ),
            bypass_auth: bool_or(KEY_BYPASS_AUTH, &settings.bypass_auth, DEFAULT_BYPASS_AUTH),
            trust_controllers: bool_or(
                KEY_TRUST_CONTROLLERS,
                &settings.trust_controllers,
                DEFAULT_TRUST_CONTROLLERS,
            ),
            system_users: regex_list_or(
                KEY_SYSTEM_USERS,
                &settings.system_users,
                DEFAULT_SYSTEM_USERS,
            ),
            external_users: regex_list_or(KEY_EXTERNAL_USERS, &settings.external_users, ""),
            external_groups: regex_list_or(KEY_EXTERNAL_GROUPS, &settings.external_groups, ""),
        }
    }

    pub fn scheduler_service_address(&self) -> &str {
        &self.scheduler_service_address
    }

    pub fn process_namespaces(&self) -> &RegexList {
        &self.process_namespaces
    }

    pub fn bypass_namespaces(&self) -> &RegexList {
        &self.bypass_namespaces
    }

    pub fn label_namespaces(&self) -> &RegexList {
        &self.label_namespaces
    }

    pub fn no_label_namespaces(&self) -> &RegexList {
        &self.no_label_namespaces
    }

    pub fn bypass_auth(&self) -> bool {
        self.bypass_auth
    }

    pub fn trust_controllers(&self) -> bool {
        self.trust_controllers
    }

    pub fn system_users(&self) -> &RegexList {
        &self.system_users
    }

    pub fn external_users(&self) -> &RegexList {
        &self.external_users
    }

    pub fn external_groups(&self) -> &RegexList {
        &self.external_groups
    }
}

fn regex_list_or(key: &str, patterns: &str, fallback: &str) -> RegexList {
    match RegexList::parse(patterns) {
        Ok(list) => list,
        Err(error) => {
            warn!(
                key,
                patterns,
                fallback,
                error = %error,
                "cannot parse pattern list, using the default value"
            );
            // the fallback values are constants known to compile
            RegexList::parse(fallback).unwrap_or_default()
        }
    }
}

fn bool_or(key: &str, value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => {
            warn!(key, value, fallback, "cannot parse boolean, using the default value");
            fallback
        }
    }
}
