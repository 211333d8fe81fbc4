use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::reflector::{
    self,
    Lookup,
    Store,
};
use kube::runtime::watcher::{
    self,
    watcher,
};
use kube::runtime::WatchStreamExt;
use serde::de::DeserializeOwned;
use sl_core::prelude::*;
use tokio::sync::broadcast;
use tracing::*;

const NOTIFY_CHANNEL_CAPACITY: usize = 256;

// The bounds every watched object type has to satisfy; in practice this is corev1::Pod and
// corev1::Event, but the informer machinery doesn't care.
pub trait WatchedObject:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Lookup<DynamicType = ()>
    + Clone
    + DeserializeOwned
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> WatchedObject for K where
    K: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Lookup<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + fmt::Debug
        + Send
        + Sync
        + 'static
{
}

// Change notifications re-broadcast to whoever subscribed to the informer.  Applied covers both
// add and update; the watch API doesn't distinguish and neither do our consumers (every callback
// triggers the same sweep).  WatchFailed carries upstream transient errors so managers can count
// them against their failure budget without the informer task dying.
#[derive(Clone, Debug)]
pub enum ObjEvent<K> {
    Applied(Arc<K>),
    Deleted(Arc<K>),
    Resynced,
    WatchFailed(String),
}

// One shared informer: a single watch against the cluster API feeding an in-memory store (the
// lister) plus a broadcast channel of change notifications.  Handles are cheap to clone; all
// clones share the same store and channel.  Informers are never stopped -- once spawned they run
// until process exit, no matter how many dashboards come and go.
#[derive(Clone)]
pub struct ObjInformer<K>
where
    K: WatchedObject,
{
    store: Store<K>,
    tx: broadcast::Sender<ObjEvent<K>>,
}

pub type PodInformer = ObjInformer<corev1::Pod>;
pub type EventInformer = ObjInformer<corev1::Event>;

impl<K: WatchedObject> ObjInformer<K> {
    pub fn spawn(api: kube::Api<K>) -> ObjInformer<K> {
        let (reader, writer) = reflector::store();
        let (tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        let informer = ObjInformer { store: reader, tx: tx.clone() };

        let stream = reflector::reflector(writer, watcher(api, Default::default()).default_backoff()).boxed();
        tokio::spawn(run_informer(stream, tx));

        informer
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObjEvent<K>> {
        self.tx.subscribe()
    }

    // The store is only useful once the initial list has landed; callers that can't make progress
    // without data (i.e., everyone) wait here first.
    pub async fn wait_ready(&self, timeout: Duration) -> EmptyResult {
        tokio::time::timeout(timeout, self.store.wait_until_ready())
            .await
            .map_err(|_| anyhow::anyhow!("informer not ready within {timeout:?}"))?
            .map_err(|err| anyhow::anyhow!("informer store writer dropped: {err}"))
    }
}

type WatchStream<K> = futures::stream::BoxStream<'static, Result<watcher::Event<K>, watcher::Error>>;

// The watcher handles its own reconnect/backoff; errors on the stream are transient by
// definition, so we pass them along as notifications and keep polling.
async fn run_informer<K: WatchedObject>(mut stream: WatchStream<K>, tx: broadcast::Sender<ObjEvent<K>>) {
    while let Some(res) = stream.next().await {
        match res {
            Ok(evt) => dispatch(&evt, &tx),
            Err(err) => {
                warn!("watch stream error (will retry): {err}");
                let _ = tx.send(ObjEvent::WatchFailed(err.to_string()));
            },
        }
    }
    warn!("informer watch stream ended");
}

fn dispatch<K: WatchedObject>(evt: &watcher::Event<K>, tx: &broadcast::Sender<ObjEvent<K>>) {
    // Nobody listening is fine; groups subscribe lazily
    let _ = match evt {
        watcher::Event::Apply(obj) => tx.send(ObjEvent::Applied(Arc::new(obj.clone()))),
        watcher::Event::Delete(obj) => tx.send(ObjEvent::Deleted(Arc::new(obj.clone()))),

        // The initial objects land in the store one by one; one Resynced notification once the
        // list is complete avoids a sweep per object on startup
        watcher::Event::InitDone => tx.send(ObjEvent::Resynced),
        watcher::Event::Init | watcher::Event::InitApply(_) => return,
    };
}

#[cfg(test)]
impl<K: WatchedObject> ObjInformer<K> {
    // Build an informer whose store is fed by hand instead of by a live watch; tests drive the
    // returned writer with apply_watcher_event and use notify to poke subscribed managers.
    pub fn new_from_parts() -> (ObjInformer<K>, reflector::store::Writer<K>) {
        let (reader, writer) = reflector::store();
        let (tx, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        (ObjInformer { store: reader, tx }, writer)
    }

    pub fn notify(&self, evt: ObjEvent<K>) {
        let _ = self.tx.send(evt);
    }

    // How many managers/streams are currently subscribed; handy for asserting informer sharing
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
