use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::constants::{ANNOTATION_NAMESPACE_ENABLE_YUNIKORN, ANNOTATION_NAMESPACE_GENERATE_APP_ID};

/// Per-namespace override. `Unset` means the namespace is known but does
/// not override anything, which is not the same as the namespace not being
/// cached at all, even though both fall through to the regex evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamespaceFlag {
    #[default]
    Unset,
    True,
    False,
}

impl NamespaceFlag {
    /// The explicit value of the override, if any
    pub fn value(self) -> Option<bool> {
        match self {
            NamespaceFlag::Unset => None,
            NamespaceFlag::True => Some(true),
            NamespaceFlag::False => Some(false),
        }
    }

    /// `"true"` and `"false"` are recognized regardless of case, anything
    /// else leaves the flag unset
    pub fn from_annotation(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("true") => NamespaceFlag::True,
            Some("false") => NamespaceFlag::False,
            _ => NamespaceFlag::Unset,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NamespaceFlags {
    pub enable_yunikorn: NamespaceFlag,
    pub generate_app_id: NamespaceFlag,
}

impl NamespaceFlags {
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        NamespaceFlags {
            enable_yunikorn: NamespaceFlag::from_annotation(
                annotations
                    .get(ANNOTATION_NAMESPACE_ENABLE_YUNIKORN)
                    .map(String::as_str),
            ),
            generate_app_id: NamespaceFlag::from_annotation(
                annotations
                    .get(ANNOTATION_NAMESPACE_GENERATE_APP_ID)
                    .map(String::as_str),
            ),
        }
    }
}

/// Read access to the namespace flags. `None` means the namespace is not
/// cached.
pub trait NamespaceLookup: Send + Sync {
    fn namespace_flags(&self, namespace: &str) -> Option<NamespaceFlags>;
}

/// Namespace name to flags. Many readers, a single writer: the namespace
/// watcher.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    namespaces: RwLock<HashMap<String, NamespaceFlags>>,
}

impl NamespaceCache {
    pub fn new() -> Self {
        NamespaceCache::default()
    }

    pub fn upsert(&self, namespace: &str, flags: NamespaceFlags) {
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace.to_owned(), flags);
    }

    pub fn remove(&self, namespace: &str) {
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace);
    }

    /// Swap the whole content of the cache, used after a full re-list
    pub fn replace_all(&self, namespaces: HashMap<String, NamespaceFlags>) {
        *self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner) = namespaces;
    }

    pub fn len(&self) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NamespaceLookup for NamespaceCache {
    fn namespace_flags(&self, namespace: &str) -> Option<NamespaceFlags> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .copied()
    }
}
