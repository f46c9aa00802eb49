use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::constants::ANNOTATION_ALLOW_PREEMPTION;

/// Read access to the priority classes. The value tells whether pods using
/// the class may be preempted by the scheduler.
pub trait PriorityClassLookup: Send + Sync {
    fn allow_preemption(&self, priority_class: &str) -> Option<bool>;

    /// Unknown priority classes allow preemption
    fn is_preempt_self_allowed(&self, priority_class: &str) -> bool {
        self.allow_preemption(priority_class).unwrap_or(true)
    }
}

#[derive(Debug, Default)]
pub struct PriorityClassCache {
    priority_classes: RwLock<HashMap<String, bool>>,
}

impl PriorityClassCache {
    pub fn new() -> Self {
        PriorityClassCache::default()
    }

    /// Only an explicit `"false"` disables preemption
    pub fn allow_preemption_from_annotations(annotations: &BTreeMap<String, String>) -> bool {
        !annotations
            .get(ANNOTATION_ALLOW_PREEMPTION)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("false"))
    }

    pub fn upsert(&self, priority_class: &str, allow_preemption: bool) {
        self.priority_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(priority_class.to_owned(), allow_preemption);
    }

    pub fn remove(&self, priority_class: &str) {
        self.priority_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(priority_class);
    }

    pub fn replace_all(&self, priority_classes: HashMap<String, bool>) {
        *self
            .priority_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner) = priority_classes;
    }

    pub fn len(&self) -> usize {
        self.priority_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriorityClassLookup for PriorityClassCache {
    fn allow_preemption(&self, priority_class: &str) -> Option<bool> {
        self.priority_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(priority_class)
            .copied()
    }
}
