use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::access_control::{AccessControlEngine, AnnotationDecision, AnnotationReview};
use crate::admission_request::AdmissionRequest;
use crate::admission_response::AdmissionResponse;
use crate::cache::{NamespaceLookup, PriorityClassLookup};
use crate::config::AdmissionConfig;
use crate::constants::{ANNOTATION_ALLOW_PREEMPTION, ANNOTATION_USER_INFO, DEFAULT_NAMESPACE};
use crate::errors::{DecodeError, MutationError};
use crate::namespace_filter::NamespaceFilter;
use crate::patch::Patch;
use crate::workload::{WorkloadKind, WorkloadObject};

/// Computes the admission decision and the patch of the mutating webhook.
///
/// The engine holds no per-request state and can be shared between any
/// number of concurrent requests.
#[derive(Clone)]
pub struct MutationEngine {
    config: Arc<AdmissionConfig>,
    namespaces: Arc<dyn NamespaceLookup>,
    priority_classes: Arc<dyn PriorityClassLookup>,
}

impl MutationEngine {
    pub fn new(
        config: Arc<AdmissionConfig>,
        namespaces: Arc<dyn NamespaceLookup>,
        priority_classes: Arc<dyn PriorityClassLookup>,
    ) -> Self {
        MutationEngine {
            config,
            namespaces,
            priority_classes,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn mutate(&self, request: Option<&AdmissionRequest>) -> AdmissionResponse {
        let Some(request) = request else {
            warn!("received an empty admission request");
            let error = MutationError::EmptyRequest;
            return AdmissionResponse::reject(String::new(), error.to_string(), error.code());
        };

        match self.evaluate(request) {
            Ok(patch) => AdmissionResponse::allow_with_patch(request.uid.clone(), &patch),
            Err(error) => {
                info!(
                    uid = request.uid.as_str(),
                    kind = request.kind.kind.as_str(),
                    namespace = request.namespace(),
                    user = request.username(),
                    error = %error,
                    "admission request denied"
                );
                AdmissionResponse::reject(request.uid.clone(), error.to_string(), error.code())
            }
        }
    }

    fn evaluate(&self, request: &AdmissionRequest) -> Result<Patch, MutationError> {
        let Some(kind) = WorkloadKind::from_kind(&request.kind.kind) else {
            debug!(
                kind = request.kind.kind.as_str(),
                "unknown kind, passing through"
            );
            return Ok(Patch::new());
        };

        let raw = request.object.as_ref().ok_or(DecodeError::MissingObject)?;
        let object = WorkloadObject::decode(kind, raw)?;

        let namespace = match request.namespace() {
            "" => DEFAULT_NAMESPACE,
            namespace => namespace,
        };

        if object.is_managed_by_scheduler() {
            debug!(
                uid = request.uid.as_str(),
                "object belongs to the scheduler, skipping"
            );
            return Ok(Patch::new());
        }

        let filter = NamespaceFilter::new(&self.config, self.namespaces.as_ref());
        if !filter.should_process(namespace) {
            debug!(namespace, "namespace is bypassed, skipping");
            return Ok(Patch::new());
        }

        match kind {
            WorkloadKind::Pod if request.is_update() => self.process_pod_update(request, &object),
            WorkloadKind::Pod => self.process_pod(request, namespace, &object, &filter),
            _ => self.process_workload(request, kind, namespace, &object, &filter),
        }
    }

    fn process_pod(
        &self,
        request: &AdmissionRequest,
        namespace: &str,
        pod: &WorkloadObject,
        filter: &NamespaceFilter<'_>,
    ) -> Result<Patch, MutationError> {
        let decision = AccessControlEngine::new(&self.config).review(
            AnnotationReview {
                current: pod.user_info_annotation(),
                baseline: None,
                generate_if_missing: false,
            },
            &request.user_info,
        )?;

        let mut patch = Patch::new();
        patch.add_scheduler_name();

        let mut annotations = annotation_updates(decision);
        if filter.should_label(namespace) {
            patch.add_identity_labels(namespace, &pod.metadata);
            if let Some(priority_class) = pod.priority_class_name.as_deref() {
                if self.preemption_disabled(pod, priority_class) {
                    annotations.insert(ANNOTATION_ALLOW_PREEMPTION.to_owned(), "false".to_owned());
                }
            }
        } else {
            debug!(namespace, "namespace excluded from labelling");
        }
        patch.add_annotations(
            &WorkloadKind::Pod.annotations_path(),
            pod.metadata.annotations.as_ref(),
            annotations,
        );

        debug!(
            uid = request.uid.as_str(),
            namespace,
            operations = patch.len(),
            "pod mutated"
        );
        Ok(patch)
    }

    /// A pod update must keep a valid user info annotation, unless it comes
    /// from a trusted controller.
    fn process_pod_update(
        &self,
        request: &AdmissionRequest,
        pod: &WorkloadObject,
    ) -> Result<Patch, MutationError> {
        let raw = request
            .old_object
            .as_ref()
            .ok_or(DecodeError::MissingOldObject)?;
        let old_pod = WorkloadObject::decode(WorkloadKind::Pod, raw)?;

        let access_control = AccessControlEngine::new(&self.config);
        let decision = access_control.review(
            AnnotationReview {
                current: pod.user_info_annotation(),
                baseline: old_pod.user_info_annotation(),
                generate_if_missing: false,
            },
            &request.user_info,
        )?;
        if pod.user_info_annotation().is_none()
            && !access_control.is_trusted_controller(&request.user_info)
        {
            return Err(MutationError::UnauthorizedPodMutation {
                user: request.username().to_owned(),
            });
        }

        let mut patch = Patch::new();
        patch.add_annotations(
            &WorkloadKind::Pod.annotations_path(),
            pod.metadata.annotations.as_ref(),
            annotation_updates(decision),
        );
        Ok(patch)
    }

    fn process_workload(
        &self,
        request: &AdmissionRequest,
        kind: WorkloadKind,
        namespace: &str,
        workload: &WorkloadObject,
        filter: &NamespaceFilter<'_>,
    ) -> Result<Patch, MutationError> {
        if !filter.should_label(namespace) {
            debug!(namespace, %kind, "namespace excluded from labelling");
            return Ok(Patch::new());
        }

        let old_workload = match request.old_object.as_ref() {
            Some(raw) if request.is_update() => Some(WorkloadObject::decode(kind, raw)?),
            _ => None,
        };
        let decision = AccessControlEngine::new(&self.config).review(
            AnnotationReview {
                current: workload.user_info_annotation(),
                baseline: old_workload
                    .as_ref()
                    .and_then(WorkloadObject::user_info_annotation),
                generate_if_missing: true,
            },
            &request.user_info,
        )?;

        let mut patch = Patch::new();
        patch.add_annotations(
            &kind.annotations_path(),
            workload.template.annotations.as_ref(),
            annotation_updates(decision),
        );
        debug!(
            uid = request.uid.as_str(),
            namespace,
            %kind,
            operations = patch.len(),
            "workload mutated"
        );
        Ok(patch)
    }

    /// The priority class forbids preemption and the pod does not say
    /// otherwise on its own
    fn preemption_disabled(&self, pod: &WorkloadObject, priority_class: &str) -> bool {
        let already_set = pod
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(ANNOTATION_ALLOW_PREEMPTION));
        !already_set && !self.priority_classes.is_preempt_self_allowed(priority_class)
    }
}

fn annotation_updates(decision: AnnotationDecision) -> BTreeMap<String, String> {
    match decision {
        AnnotationDecision::Keep => BTreeMap::new(),
        AnnotationDecision::Set(value) => {
            BTreeMap::from([(ANNOTATION_USER_INFO.to_owned(), value)])
        }
    }
}
