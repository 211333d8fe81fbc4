mod view_test;

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::reflector::store::Writer;
use kube::runtime::watcher::Event;
use rstest::*;
use sl_api::v1::{
    KubePodSchema,
    WsRespSchema,
};
use sl_core::prelude::*;
use sl_testutils::*;
use tokio::sync::watch;

use super::*;
use crate::status::MockStatusSync;

// Pump a watcher init sequence through a hand-fed store so it ends up ready and containing
// exactly these objects.
pub(super) fn seed_store<K: WatchedObject>(writer: &mut Writer<K>, objs: &[K]) {
    writer.apply_watcher_event(&Event::Init);
    for obj in objs {
        writer.apply_watcher_event(&Event::InitApply(obj.clone()));
    }
    writer.apply_watcher_event(&Event::InitDone);
}

pub(super) fn deployment_subject() -> Subject {
    Subject::Deployment {
        cluster: TEST_CLUSTER.into(),
        namespace: TEST_NAMESPACE.into(),
        name: TEST_DEPLOYMENT.into(),
    }
}

// Decode the pod names out of a recorded success frame, in payload order.
pub(super) fn frame_pod_names(frame: &str) -> Vec<String> {
    let resp: WsRespSchema<Vec<KubePodSchema>> = serde_json::from_str(frame).unwrap();
    resp.payload.unwrap().into_iter().map(|p| p.name).collect()
}

pub(super) fn frame_lines(frame: &str) -> Vec<String> {
    let resp: WsRespSchema<Vec<String>> = serde_json::from_str(frame).unwrap();
    resp.payload.unwrap()
}

pub(super) struct TestGroup {
    pub registry: GroupRegistry,
    pub informer: PodInformer,
    pub writer: Writer<corev1::Pod>,
    pub shutdown_tx: watch::Sender<bool>,
}

// Everything a group test needs: a hand-fed informer, a registry wired to a mock status syncer,
// and a fast sweep interval so manager tests don't sit around for ten seconds.
pub(super) fn make_test_group(status_sync: MockStatusSync) -> TestGroup {
    let (informer, writer) = PodInformer::new_from_parts();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tuning = GroupTuning {
        sweep_interval: Duration::from_millis(20),
        max_consecutive_failures: 2,
    };
    let registry = GroupRegistry::new(Arc::new(status_sync), tuning, shutdown_rx);
    TestGroup { registry, informer, writer, shutdown_tx }
}

pub(super) fn quiet_status_sync() -> MockStatusSync {
    let mut mock = MockStatusSync::new();
    mock.expect_sync_deployment_status().returning(|_, _, _| Ok(()));
    mock
}

pub(super) fn new_session() -> (Arc<Session>, RecordingSink) {
    let sink = RecordingSink::new();
    (Session::new(Box::new(sink.clone())), sink)
}

// A FrameSink that just remembers what was written to it; clones share the same buffer, so tests
// hand one clone to the session and keep another for assertions.  Flip `fail` to make every
// subsequent write error, which is how tests simulate a dead socket.
#[derive(Clone, Default)]
pub(super) struct RecordingSink {
    frames: Arc<std::sync::Mutex<Vec<String>>>,
    fail: Arc<std::sync::atomic::AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> RecordingSink {
        RecordingSink::default()
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&self, text: String) -> EmptyResult {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("recording sink set to fail");
        }
        self.frames.lock().unwrap().push(text);
        Ok(())
    }
}
