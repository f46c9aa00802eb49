use std::collections::BTreeMap;

use k8s_openapi::api::authentication::v1::UserInfo;

use crate::config::{
    AdmissionConfig, AdmissionSettings, KEY_BYPASS_AUTH, KEY_BYPASS_NAMESPACES,
    KEY_EXTERNAL_GROUPS, KEY_EXTERNAL_USERS, KEY_NO_LABEL_NAMESPACES, KEY_SYSTEM_USERS,
    KEY_TRUST_CONTROLLERS,
};

pub(crate) const VALID_USER_INFO_ANNOTATION: &str =
    r#"{"user":"test","groups":["devops","system:authenticated"]}"#;

/// Settings shared by most of the admission tests: two bypassed namespaces,
/// one namespace excluded from labelling, a pair of trusted controllers and a
/// single external user and group.
pub(crate) fn admission_settings(bypass_auth: bool, trust_controllers: bool) -> AdmissionSettings {
    AdmissionSettings::from_map(&BTreeMap::from([
        (
            KEY_BYPASS_NAMESPACES.to_owned(),
            "^kube-system$,^bypass$".to_owned(),
        ),
        (KEY_NO_LABEL_NAMESPACES.to_owned(), "^nolabel$".to_owned()),
        (KEY_BYPASS_AUTH.to_owned(), bypass_auth.to_string()),
        (KEY_TRUST_CONTROLLERS.to_owned(), trust_controllers.to_string()),
        (
            KEY_SYSTEM_USERS.to_owned(),
            "^system:serviceaccount:kube-system:job-controller$,^system:serviceaccount:kube-system:deployment-controller$".to_owned(),
        ),
        (KEY_EXTERNAL_USERS.to_owned(), "^testExtUser$".to_owned()),
        (KEY_EXTERNAL_GROUPS.to_owned(), "^testExtGroup$".to_owned()),
    ]))
}

pub(crate) fn admission_config(bypass_auth: bool, trust_controllers: bool) -> AdmissionConfig {
    AdmissionConfig::new(&admission_settings(bypass_auth, trust_controllers))
}

pub(crate) fn user(name: &str, groups: &[&str]) -> UserInfo {
    UserInfo {
        username: Some(name.to_owned()),
        groups: if groups.is_empty() {
            None
        } else {
            Some(groups.iter().map(|g| g.to_string()).collect())
        },
        ..Default::default()
    }
}
