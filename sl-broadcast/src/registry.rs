use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{
    Arc,
    Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use sl_core::prelude::*;
use tracing::*;

use crate::informer::{
    EventInformer,
    ObjInformer,
    PodInformer,
    WatchedObject,
};

// Where kube clients come from; the server's cluster pool implements this, tests stub it out.
#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn client_for(&self, cluster: &str) -> anyhow::Result<kube::Client>;
}

type InformerKey = (String, String);
type InformerMap<K> = Mutex<HashMap<InformerKey, ObjInformer<K>>>;

// Process-wide informer cache, at most one informer per (cluster, namespace) pair no matter how
// many dashboards are watching it.  The maps' locks are held only for lookup/insert; readiness
// waits happen outside them.
pub struct InformerRegistry {
    source: Arc<dyn ClientSource>,
    pods: InformerMap<corev1::Pod>,
    events: InformerMap<corev1::Event>,
}

impl InformerRegistry {
    pub fn new(source: Arc<dyn ClientSource>) -> InformerRegistry {
        InformerRegistry {
            source,
            pods: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
        }
    }

    pub async fn pod_informer(&self, cluster: &str, namespace: &str) -> anyhow::Result<PodInformer> {
        self.informer(&self.pods, cluster, namespace).await
    }

    pub async fn event_informer(&self, cluster: &str, namespace: &str) -> anyhow::Result<EventInformer> {
        self.informer(&self.events, cluster, namespace).await
    }

    async fn informer<K: WatchedObject>(
        &self,
        map: &InformerMap<K>,
        cluster: &str,
        namespace: &str,
    ) -> anyhow::Result<ObjInformer<K>> {
        let key = (cluster.to_string(), namespace.to_string());

        let existing = map.lock().expect("informer registry lock poisoned").get(&key).cloned();
        let informer = match existing {
            Some(informer) => informer,
            None => {
                let client = self.source.client_for(cluster).await?;
                let api = if namespace.is_empty() {
                    kube::Api::all(client)
                } else {
                    kube::Api::namespaced(client, namespace)
                };

                // Someone else may have built the same informer while we were fetching the
                // client; the map is the source of truth, so check again under the lock
                let mut m = map.lock().expect("informer registry lock poisoned");
                match m.entry(key.clone()) {
                    Entry::Occupied(e) => e.get().clone(),
                    Entry::Vacant(e) => {
                        info!("starting shared informer for {cluster}/{namespace}");
                        e.insert(ObjInformer::spawn(api)).clone()
                    },
                }
            },
        };

        // Failed informers must not stay cached; evict so the next session gets a fresh start
        // instead of a watch that never became ready
        if let Err(err) = informer
            .wait_ready(Duration::from_secs(INFORMER_READY_TIMEOUT_SECONDS))
            .await
        {
            map.lock().expect("informer registry lock poisoned").remove(&key);
            return Err(err);
        }

        Ok(informer)
    }
}
