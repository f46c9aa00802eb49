use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    AUTOGEN_APP_PREFIX, AUTOGEN_APP_SUFFIX, CANONICAL_LABEL_APPLICATION_ID,
    CANONICAL_LABEL_QUEUE_NAME, DEFAULT_NAMESPACE, LABEL_APPLICATION_ID, LABEL_QUEUE_NAME,
    PATCH_PATH_LABELS, PATCH_PATH_SCHEDULER_NAME, SCHEDULER_NAME,
};

/// The only JSON Patch operation ever produced
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    #[default]
    Add,
}

/// A single RFC 6902 operation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

/// Ordered list of operations. Each path appears at most once: adding an
/// operation for a path that is already patched replaces the previous value
/// in place.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOperation>);

impl Patch {
    pub fn new() -> Self {
        Patch::default()
    }

    pub fn add(&mut self, path: impl Into<String>, value: Value) {
        let path = path.into();
        match self.0.iter_mut().find(|operation| operation.path == path) {
            Some(operation) => operation.value = value,
            None => self.0.push(PatchOperation {
                op: PatchOp::Add,
                path,
                value,
            }),
        }
    }

    pub fn add_scheduler_name(&mut self) {
        self.add(PATCH_PATH_SCHEDULER_NAME, Value::from(SCHEDULER_NAME));
    }

    /// Add the merged application id and queue labels of a pod
    pub fn add_identity_labels(&mut self, namespace: &str, metadata: &ObjectMeta) {
        let labels = identity_labels(namespace, metadata.labels.as_ref());
        self.add(PATCH_PATH_LABELS, labels_value(labels));
    }

    /// Merge `updates` into the existing annotations and patch the whole map
    /// at `path`. Nothing is added when there are no updates.
    pub fn add_annotations(
        &mut self,
        path: &str,
        existing: Option<&BTreeMap<String, String>>,
        updates: BTreeMap<String, String>,
    ) {
        if updates.is_empty() {
            return;
        }
        let mut annotations = existing.cloned().unwrap_or_default();
        annotations.extend(updates);
        self.add(path, labels_value(annotations));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|operation| operation.path == path)
            .map(|operation| &operation.value)
    }
}

/// `yunikorn-<namespace>-autogen`, an empty namespace counts as `default`
pub fn generate_app_id(namespace: &str) -> String {
    let namespace = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    format!("{AUTOGEN_APP_PREFIX}-{namespace}-{AUTOGEN_APP_SUFFIX}")
}

/// Keep the canonical and legacy generations of the application id and queue
/// labels in sync. An existing application id always wins over a generated
/// one, the canonical key over the legacy one.
pub fn identity_labels(
    namespace: &str,
    existing: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut labels = existing.cloned().unwrap_or_default();

    let app_id = labels
        .get(CANONICAL_LABEL_APPLICATION_ID)
        .or_else(|| labels.get(LABEL_APPLICATION_ID))
        .cloned()
        .unwrap_or_else(|| generate_app_id(namespace));
    labels.insert(CANONICAL_LABEL_APPLICATION_ID.to_owned(), app_id.clone());
    labels.insert(LABEL_APPLICATION_ID.to_owned(), app_id);

    if let Some(queue) = labels.get(CANONICAL_LABEL_QUEUE_NAME).cloned() {
        labels.insert(LABEL_QUEUE_NAME.to_owned(), queue);
    }

    labels
}

fn labels_value(map: BTreeMap<String, String>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    )
}
