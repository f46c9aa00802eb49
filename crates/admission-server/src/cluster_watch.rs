//! Keeps the namespace and priority class caches in sync with the cluster.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use admission_evaluator::cache::{NamespaceCache, NamespaceFlags, PriorityClassCache};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::scheduling::v1::PriorityClass;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A cache filled from the objects of a single Kubernetes resource
pub(crate) trait WatchedCache: Send + Sync + 'static {
    type Resource: Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static;
    type Value: Send;

    const RESOURCE_NAME: &'static str;

    fn value(annotations: &BTreeMap<String, String>) -> Self::Value;
    fn upsert(&self, name: &str, value: Self::Value);
    fn remove(&self, name: &str);
    fn replace_all(&self, entries: HashMap<String, Self::Value>);
}

impl WatchedCache for NamespaceCache {
    type Resource = Namespace;
    type Value = NamespaceFlags;

    const RESOURCE_NAME: &'static str = "namespace";

    fn value(annotations: &BTreeMap<String, String>) -> NamespaceFlags {
        NamespaceFlags::from_annotations(annotations)
    }

    fn upsert(&self, name: &str, value: NamespaceFlags) {
        NamespaceCache::upsert(self, name, value)
    }

    fn remove(&self, name: &str) {
        NamespaceCache::remove(self, name)
    }

    fn replace_all(&self, entries: HashMap<String, NamespaceFlags>) {
        NamespaceCache::replace_all(self, entries)
    }
}

impl WatchedCache for PriorityClassCache {
    type Resource = PriorityClass;
    type Value = bool;

    const RESOURCE_NAME: &'static str = "priorityclass";

    fn value(annotations: &BTreeMap<String, String>) -> bool {
        PriorityClassCache::allow_preemption_from_annotations(annotations)
    }

    fn upsert(&self, name: &str, value: bool) {
        PriorityClassCache::upsert(self, name, value)
    }

    fn remove(&self, name: &str) {
        PriorityClassCache::remove(self, name)
    }

    fn replace_all(&self, entries: HashMap<String, bool>) {
        PriorityClassCache::replace_all(self, entries)
    }
}

/// Applies watcher events to a cache.
///
/// The objects of an initial listing are collected aside and swapped into
/// the cache in one go once the listing is complete, readers never see a
/// half populated cache.
pub(crate) struct CacheUpdater<C: WatchedCache> {
    cache: Arc<C>,
    relisting: Option<HashMap<String, C::Value>>,
}

impl<C: WatchedCache> CacheUpdater<C> {
    pub(crate) fn new(cache: Arc<C>) -> Self {
        CacheUpdater {
            cache,
            relisting: None,
        }
    }

    pub(crate) fn apply(&mut self, event: Event<C::Resource>) {
        match event {
            Event::Init => {
                debug!(resource = C::RESOURCE_NAME, "initial listing started");
                self.relisting = Some(HashMap::new());
            }
            Event::InitApply(object) => {
                let name = object.name_any();
                let value = C::value(object.annotations());
                match self.relisting.as_mut() {
                    Some(entries) => {
                        entries.insert(name, value);
                    }
                    None => self.cache.upsert(&name, value),
                }
            }
            Event::InitDone => {
                let entries = self.relisting.take().unwrap_or_default();
                info!(
                    resource = C::RESOURCE_NAME,
                    count = entries.len(),
                    "cache populated"
                );
                self.cache.replace_all(entries);
            }
            Event::Apply(object) => {
                let name = object.name_any();
                debug!(resource = C::RESOURCE_NAME, name = name.as_str(), "updated");
                self.cache.upsert(&name, C::value(object.annotations()));
            }
            Event::Delete(object) => {
                let name = object.name_any();
                debug!(resource = C::RESOURCE_NAME, name = name.as_str(), "deleted");
                self.cache.remove(&name);
            }
        }
    }
}

async fn watch<C: WatchedCache>(client: Client, cache: Arc<C>) {
    let api: Api<C::Resource> = Api::all(client);
    let stream = watcher::watcher(api, watcher::Config::default());
    let mut stream = std::pin::pin!(stream);
    let mut updater = CacheUpdater::new(cache);

    info!(resource = C::RESOURCE_NAME, "watcher started");
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => updater.apply(event),
            Err(e) => {
                warn!(error = %e, resource = C::RESOURCE_NAME, "watcher error, will retry");
                tokio::time::sleep(WATCH_RETRY_DELAY).await;
            }
        }
    }
    warn!(resource = C::RESOURCE_NAME, "watcher stopped");
}

/// Spawn the namespace and priority class watchers on the current runtime
pub(crate) fn spawn_watchers(
    client: Client,
    namespaces: Arc<NamespaceCache>,
    priority_classes: Arc<PriorityClassCache>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(watch(client.clone(), namespaces)),
        tokio::spawn(watch(client, priority_classes)),
    ]
}
