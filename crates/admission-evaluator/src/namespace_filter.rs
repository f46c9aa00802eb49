use crate::cache::{NamespaceFlag, NamespaceLookup};
use crate::config::AdmissionConfig;
use crate::regex_list::RegexList;

/// Decides which namespaces are handled by the admission controller, and in
/// which of them the application identity labels are generated.
///
/// A namespace annotation cached by the namespace watcher always wins over
/// the static configuration. Without such an override the namespace must be
/// selected by the "include" list (an empty list selects everything) and not
/// be matched by the "exclude" list.
pub struct NamespaceFilter<'a> {
    config: &'a AdmissionConfig,
    namespaces: &'a dyn NamespaceLookup,
}

impl<'a> NamespaceFilter<'a> {
    pub fn new(config: &'a AdmissionConfig, namespaces: &'a dyn NamespaceLookup) -> Self {
        NamespaceFilter { config, namespaces }
    }

    pub fn should_process(&self, namespace: &str) -> bool {
        let cached = self
            .namespaces
            .namespace_flags(namespace)
            .map(|flags| flags.enable_yunikorn);
        evaluate(
            cached,
            self.config.process_namespaces(),
            self.config.bypass_namespaces(),
            namespace,
        )
    }

    pub fn should_label(&self, namespace: &str) -> bool {
        let cached = self
            .namespaces
            .namespace_flags(namespace)
            .map(|flags| flags.generate_app_id);
        evaluate(
            cached,
            self.config.label_namespaces(),
            self.config.no_label_namespaces(),
            namespace,
        )
    }
}

fn evaluate(
    cached: Option<NamespaceFlag>,
    include: &RegexList,
    exclude: &RegexList,
    namespace: &str,
) -> bool {
    if let Some(value) = cached.and_then(NamespaceFlag::value) {
        return value;
    }
    let eligible = include.is_empty() || include.matches_any(namespace);
    eligible && !exclude.matches_any(namespace)
}
