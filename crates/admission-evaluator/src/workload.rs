use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::Deserialize;

use crate::constants::{ANNOTATION_USER_INFO, LABEL_APP, LABEL_APP_VALUE_YUNIKORN};
use crate::errors::DecodeError;

const POD_PRIORITY_CLASS_NAME: &str = "/spec/priorityClassName";

/// The kinds handled by the mutation webhook
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    DaemonSet,
    StatefulSet,
    ReplicaSet,
    Job,
    CronJob,
}

impl WorkloadKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Pod" => Some(WorkloadKind::Pod),
            "Deployment" => Some(WorkloadKind::Deployment),
            "DaemonSet" => Some(WorkloadKind::DaemonSet),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "ReplicaSet" => Some(WorkloadKind::ReplicaSet),
            "Job" => Some(WorkloadKind::Job),
            "CronJob" => Some(WorkloadKind::CronJob),
            _ => None,
        }
    }

    /// JSON pointer to the metadata of the pod, or of the pod template
    pub fn metadata_path(self) -> &'static str {
        match self {
            WorkloadKind::Pod => "/metadata",
            WorkloadKind::Deployment
            | WorkloadKind::DaemonSet
            | WorkloadKind::StatefulSet
            | WorkloadKind::ReplicaSet
            | WorkloadKind::Job => "/spec/template/metadata",
            WorkloadKind::CronJob => "/spec/jobTemplate/spec/template/metadata",
        }
    }

    pub fn annotations_path(self) -> String {
        format!("{}/annotations", self.metadata_path())
    }

    pub fn is_pod(self) -> bool {
        self == WorkloadKind::Pod
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The parts of an admitted object the mutation logic looks at
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkloadObject {
    /// Metadata of the object itself
    pub metadata: ObjectMeta,
    /// Metadata of the pod template, the same as `metadata` for pods
    pub template: ObjectMeta,
    pub priority_class_name: Option<String>,
}

#[derive(Deserialize)]
struct ObjectShell {
    #[serde(default)]
    metadata: ObjectMeta,
}

impl WorkloadObject {
    pub fn decode(kind: WorkloadKind, raw: &RawExtension) -> Result<Self, DecodeError> {
        let malformed = |source| DecodeError::Malformed {
            kind: kind.to_string(),
            source,
        };

        let shell: ObjectShell = serde_json::from_value(raw.0.clone()).map_err(malformed)?;
        let template = if kind.is_pod() {
            shell.metadata.clone()
        } else {
            match raw.0.pointer(kind.metadata_path()) {
                Some(value) => serde_json::from_value(value.clone()).map_err(malformed)?,
                None => ObjectMeta::default(),
            }
        };
        let priority_class_name = if kind.is_pod() {
            raw.0
                .pointer(POD_PRIORITY_CLASS_NAME)
                .and_then(|value| value.as_str())
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
        } else {
            None
        };

        Ok(WorkloadObject {
            metadata: shell.metadata,
            template,
            priority_class_name,
        })
    }

    /// Carries the `app=yunikorn` label: the object belongs to the scheduler
    pub fn is_managed_by_scheduler(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(LABEL_APP))
            .is_some_and(|value| value == LABEL_APP_VALUE_YUNIKORN)
    }

    /// The user info annotation of the pod, or of the pod template
    pub fn user_info_annotation(&self) -> Option<&str> {
        self.template
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(ANNOTATION_USER_INFO))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("Pod", Some(WorkloadKind::Pod), "/metadata/annotations")]
    #[case("Deployment", Some(WorkloadKind::Deployment), "/spec/template/metadata/annotations")]
    #[case("DaemonSet", Some(WorkloadKind::DaemonSet), "/spec/template/metadata/annotations")]
    #[case("StatefulSet", Some(WorkloadKind::StatefulSet), "/spec/template/metadata/annotations")]
    #[case("ReplicaSet", Some(WorkloadKind::ReplicaSet), "/spec/template/metadata/annotations")]
    #[case("Job", Some(WorkloadKind::Job), "/spec/template/metadata/annotations")]
    #[case(
        "CronJob",
        Some(WorkloadKind::CronJob),
        "/spec/jobTemplate/spec/template/metadata/annotations"
    )]
    fn known_kinds(
        #[case] kind: &str,
        #[case] expected: Option<WorkloadKind>,
        #[case] annotations_path: &str,
    ) {
        let workload = WorkloadKind::from_kind(kind);
        assert_eq!(workload, expected);
        assert_eq!(workload.unwrap().annotations_path(), annotations_path);
    }

    #[rstest]
    #[case("ConfigMap")]
    #[case("pod")]
    #[case("")]
    fn unknown_kinds(#[case] kind: &str) {
        assert_eq!(WorkloadKind::from_kind(kind), None);
    }

    #[test]
    fn decode_pod() {
        let raw = RawExtension(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "a-test-pod",
                "labels": {"app": "sleep"},
                "annotations": {ANNOTATION_USER_INFO: "{\"user\":\"test\"}"},
            },
            "spec": {
                "priorityClassName": "high",
                "containers": [{"name": "sleep", "image": "alpine"}],
            },
        }));

        let object = WorkloadObject::decode(WorkloadKind::Pod, &raw).unwrap();
        assert_eq!(object.metadata.name.as_deref(), Some("a-test-pod"));
        assert_eq!(object.template, object.metadata);
        assert_eq!(object.priority_class_name.as_deref(), Some("high"));
        assert_eq!(object.user_info_annotation(), Some("{\"user\":\"test\"}"));
        assert!(!object.is_managed_by_scheduler());
    }

    #[test]
    fn decode_cron_job_template() {
        let raw = RawExtension(json!({
            "metadata": {"name": "nightly", "labels": {"app": "yunikorn"}},
            "spec": {"jobTemplate": {"spec": {"template": {
                "metadata": {"annotations": {"a": "b"}},
            }}}},
        }));

        let object = WorkloadObject::decode(WorkloadKind::CronJob, &raw).unwrap();
        assert_eq!(object.metadata.name.as_deref(), Some("nightly"));
        assert_eq!(
            object.template.annotations.unwrap().get("a").map(String::as_str),
            Some("b")
        );
        assert_eq!(object.priority_class_name, None);
    }

    #[test]
    fn managed_marker_is_read_from_top_level_labels() {
        let raw = RawExtension(json!({
            "metadata": {"labels": {"app": "yunikorn"}},
        }));
        let object = WorkloadObject::decode(WorkloadKind::Deployment, &raw).unwrap();

        assert!(object.is_managed_by_scheduler());
        assert_eq!(object.template, ObjectMeta::default());
    }

    #[test]
    fn decode_failure() {
        let raw = RawExtension(json!("not an object"));
        let err = WorkloadObject::decode(WorkloadKind::Pod, &raw).unwrap_err();

        assert!(err.to_string().starts_with("failed to decode Pod"));
    }
}
