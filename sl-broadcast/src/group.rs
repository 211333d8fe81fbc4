use std::collections::HashMap;
use std::sync::atomic::{
    AtomicI64,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex as StdMutex,
};
use std::time::Duration;

use futures::future;
use sl_api::v1::KubePodSchema;
use sl_core::prelude::*;
use tokio::sync::{
    broadcast,
    watch,
    Mutex,
};
use tokio::time::MissedTickBehavior;
use tracing::*;

use crate::informer::{
    ObjEvent,
    PodInformer,
};
use crate::session::Session;
use crate::status::StatusSync;
use crate::subject::Subject;
use crate::view::build_pod_view;

#[derive(Clone, Copy, Debug)]
pub struct GroupTuning {
    pub sweep_interval: Duration,
    pub max_consecutive_failures: i64,
}

impl Default for GroupTuning {
    fn default() -> GroupTuning {
        GroupTuning {
            sweep_interval: Duration::from_secs(SWEEP_INTERVAL_SECONDS),
            max_consecutive_failures: MAX_CONSECUTIVE_SWEEP_FAILURES,
        }
    }
}

// Why the manager exited matters for cleanup: an idle exit re-checks for sessions that raced in
// and hands off to a fresh manager, while a failure exit leaves the group idle until the next
// attach (scenario: the cluster API is down; there's no point respawning into the same errors).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ManagerExit {
    Idle,
    Failed,
    Shutdown,
}

struct GroupState {
    sessions: Vec<Arc<Session>>,
    last_view: Option<Vec<KubePodSchema>>,
    has_manager: bool,
}

// Per-subject coordinator: owns the session set, guarantees at most one manager task is driving
// sweeps, and fans views out when they change.  All session-set and view mutations happen under
// the state mutex; the failure counter is atomic because the detached status-sync task bumps it
// from outside the lock.
pub struct BroadcastGroup {
    subject: Subject,
    informer: PodInformer,
    status_sync: Arc<dyn StatusSync>,
    tuning: GroupTuning,
    shutdown: watch::Receiver<bool>,
    state: Mutex<GroupState>,
    failures: Arc<AtomicI64>,
}

impl BroadcastGroup {
    fn new(
        subject: Subject,
        informer: PodInformer,
        status_sync: Arc<dyn StatusSync>,
        tuning: GroupTuning,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<BroadcastGroup> {
        Arc::new(BroadcastGroup {
            subject,
            informer,
            status_sync,
            tuning,
            shutdown,
            state: Mutex::new(GroupState {
                sessions: vec![],
                last_view: None,
                has_manager: false,
            }),
            failures: Arc::new(AtomicI64::new(0)),
        })
    }

    // Membership only; the session is still is_new afterwards, which guarantees the next sweep
    // writes to it even if nothing changes in the meantime.
    pub async fn attach(&self, session: Arc<Session>) {
        let mut state = self.state.lock().await;
        state.sessions.push(session);
    }

    // Admission: attach the session and write it an initial snapshot from the current lister
    // content.  A failed initial write closes the session on the spot -- there's no point keeping
    // a socket we've never successfully written to.
    pub async fn admit(self: &Arc<Self>, session: Arc<Session>) -> EmptyResult {
        let view = self.build_view();
        self.attach(session.clone()).await;

        if let Err(err) = session.send_payload(&view).await {
            self.detach(&session).await;
            return Err(err);
        }

        // Prime the comparison baseline if this is the first view the group has ever built;
        // otherwise the first sweep would see "changed" and immediately resend the same snapshot
        let mut state = self.state.lock().await;
        if state.last_view.is_none() {
            state.last_view = Some(view);
        }
        Ok(())
    }

    pub async fn detach(&self, session: &Arc<Session>) {
        let mut state = self.state.lock().await;
        state.sessions.retain(|s| !Arc::ptr_eq(s, session));
        session.close();
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    // At most one manager per subject, ever.  Whoever flips has_manager spawns it; everyone else
    // just rides along on the existing one.
    pub async fn run_manager_if_needed(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if state.has_manager {
            return;
        }
        state.has_manager = true;

        let group = self.clone();
        tokio::spawn(Self::run_manager_boxed(group));
    }

    // Boxed, type-erased entry point for run_manager so that the recursive spawn in
    // finish_manager doesn't produce a self-referential (and therefore Send-unprovable) future
    // type.
    fn run_manager_boxed(self: Arc<Self>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move { self.run_manager().await })
    }

    async fn run_manager(self: Arc<Self>) {
        debug!("manager starting for {}", self.subject);
        let mut events = self.informer.subscribe();
        let mut shutdown = self.shutdown.clone();
        let mut tick = tokio::time::interval(self.tuning.sweep_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            let is_tick = tokio::select! {
                _ = shutdown.changed() => break ManagerExit::Shutdown,

                evt = events.recv() => match evt {
                    Ok(evt) => {
                        if !self.relevant(&evt) {
                            continue;
                        }
                        if let ObjEvent::WatchFailed(msg) = evt {
                            // The upstream watch hiccuped; the view just doesn't update this
                            // round, but enough of these in a row and we give up
                            if self.note_failure(&msg) {
                                break ManagerExit::Failed;
                            }
                            continue;
                        }
                        false
                    },
                    // Dropped notifications may have included matching pods, so resweep
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("manager for {} dropped {n} informer notifications", self.subject);
                        false
                    },
                    Err(broadcast::error::RecvError::Closed) => break ManagerExit::Failed,
                },

                _ = tick.tick() => true,
            };

            // Losing the last session doesn't kill the manager until the next tick rolls around;
            // dashboards reconnect constantly and respawning managers on every blip is churn
            if is_tick && self.state.lock().await.sessions.is_empty() {
                break ManagerExit::Idle;
            }

            if let Err(err) = self.sweep().await {
                if self.note_failure(&format!("{err:#}")) {
                    break ManagerExit::Failed;
                }
            }
        };

        self.finish_manager(exit).await;
    }

    // One pass: build the current view, compare, fan out.  Writes go to every live session when
    // the view changed, and to the new ones regardless, concurrently and joined before the state
    // lock is released so every session observes views in sweep order.
    pub(crate) async fn sweep(self: &Arc<Self>) -> EmptyResult {
        let mut state = self.state.lock().await;

        let view = self.build_view();
        let view_changed = state.last_view.as_ref() != Some(&view);

        if view_changed && self.subject.is_deployment() {
            self.spawn_status_sync();
        }

        let any_new = state.sessions.iter().any(|s| s.is_new());
        if view_changed || any_new {
            let targets: Vec<Arc<Session>> = state
                .sessions
                .iter()
                .filter(|s| !s.closed() && (view_changed || s.is_new()))
                .cloned()
                .collect();

            // send_payload closes a session on write failure; all we do here is prune
            let writes = targets.iter().map(|s| s.send_payload(&view));
            for res in future::join_all(writes).await {
                if let Err(err) = res {
                    debug!("pruning session from {} after failed write: {err:#}", self.subject);
                }
            }
            state.sessions.retain(|s| !s.closed());
        }

        state.last_view = Some(view);
        self.failures.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn build_view(&self) -> Vec<KubePodSchema> {
        build_pod_view(&self.informer.store().state(), &self.subject)
    }

    fn relevant(&self, evt: &ObjEvent<corev1::Pod>) -> bool {
        match evt {
            ObjEvent::Applied(pod) | ObjEvent::Deleted(pod) => self.subject.matches(pod),
            ObjEvent::Resynced | ObjEvent::WatchFailed(_) => true,
        }
    }

    // Returns true once the failure budget is blown and the manager should stop.
    fn note_failure(&self, msg: &str) -> bool {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("sweep failed for {} ({failures} consecutive): {msg}", self.subject);
        if failures > self.tuning.max_consecutive_failures {
            error!("{} failed too frequently, stopping manager", self.subject);
            return true;
        }
        false
    }

    // The deployment service is external and slow; never let it hold up a sweep.  Detached task,
    // hard timeout, and failures count against the manager's budget.
    fn spawn_status_sync(&self) {
        let Subject::Deployment { cluster, namespace, name } = &self.subject else {
            return;
        };
        let (cluster, namespace, name) = (cluster.clone(), namespace.clone(), name.clone());
        let status_sync = self.status_sync.clone();
        let failures = self.failures.clone();

        tokio::spawn(async move {
            let res = tokio::time::timeout(
                Duration::from_secs(STATUS_SYNC_TIMEOUT_SECONDS),
                status_sync.sync_deployment_status(&cluster, &namespace, &name),
            )
            .await;
            match res {
                Ok(Ok(())) => (),
                Ok(Err(err)) => {
                    warn!("deployment status re-sync for {cluster}/{namespace}/{name} failed: {err:#}");
                    failures.fetch_add(1, Ordering::SeqCst);
                },
                Err(_) => {
                    warn!("deployment status re-sync for {cluster}/{namespace}/{name} timed out");
                    failures.fetch_add(1, Ordering::SeqCst);
                },
            }
        });
    }

    async fn finish_manager(self: &Arc<Self>, exit: ManagerExit) {
        debug!("manager for {} exiting ({exit:?})", self.subject);
        let mut state = self.state.lock().await;
        state.has_manager = false;

        // A session may have attached between the idle check and here; it saw has_manager=true
        // and is expecting somebody to sweep for it, so hand off to a fresh manager
        if exit == ManagerExit::Idle && !state.sessions.is_empty() {
            state.has_manager = true;
            let group = self.clone();
            tokio::spawn(Self::run_manager_boxed(group));
        }
    }
}

// The group-of-groups: one entry per subject for the life of the process.  The map lock is only
// ever held for lookup/insert; group entries persist even while idle (an idle group is just a
// struct with has_manager=false, not a leak).
pub struct GroupRegistry {
    status_sync: Arc<dyn StatusSync>,
    tuning: GroupTuning,
    shutdown: watch::Receiver<bool>,
    groups: StdMutex<HashMap<String, Arc<BroadcastGroup>>>,
}

impl GroupRegistry {
    pub fn new(status_sync: Arc<dyn StatusSync>, tuning: GroupTuning, shutdown: watch::Receiver<bool>) -> GroupRegistry {
        GroupRegistry {
            status_sync,
            tuning,
            shutdown,
            groups: StdMutex::new(HashMap::new()),
        }
    }

    pub fn group_for(&self, subject: &Subject, informer: &PodInformer) -> Arc<BroadcastGroup> {
        let mut groups = self.groups.lock().expect("group registry lock poisoned");
        groups
            .entry(subject.to_string())
            .or_insert_with(|| {
                BroadcastGroup::new(
                    subject.clone(),
                    informer.clone(),
                    self.status_sync.clone(),
                    self.tuning,
                    self.shutdown.clone(),
                )
            })
            .clone()
    }
}

#[cfg(test)]
impl BroadcastGroup {
    pub(crate) async fn has_manager(&self) -> bool {
        self.state.lock().await.has_manager
    }

    pub(crate) async fn last_view(&self) -> Option<Vec<KubePodSchema>> {
        self.state.lock().await.last_view.clone()
    }

    pub(crate) fn consecutive_failures(&self) -> i64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub(crate) fn set_consecutive_failures(&self, n: i64) {
        self.failures.store(n, Ordering::SeqCst);
    }
}
