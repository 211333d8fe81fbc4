use std::sync::Arc;

use sl_api::v1::{
    KubeContainerSchema,
    KubePodSchema,
};
use sl_core::k8s::PodExt;
use sl_core::prelude::*;

use crate::subject::Subject;

// Build the client-facing view of a pod set: filter FIRST (never transform a pod the subject
// doesn't own, that's how unrelated pods leak), then transform, then sort canonically so that two
// builds over the same pod set compare equal regardless of lister iteration order.
pub fn build_pod_view(pods: &[Arc<corev1::Pod>], subject: &Subject) -> Vec<KubePodSchema> {
    let mut view: Vec<KubePodSchema> = pods
        .iter()
        .filter(|pod| subject.matches(pod))
        .map(|pod| to_pod_schema(pod, subject.cluster()))
        .collect();
    view.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    view
}

fn to_pod_schema(pod: &corev1::Pod, cluster: &str) -> KubePodSchema {
    let status = pod.status.as_ref();
    KubePodSchema {
        cluster: cluster.into(),
        namespace: pod.namespace().unwrap_or_default(),
        name: pod.name_any(),
        node_name: pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.clone())
            .unwrap_or_default(),
        phase: status.and_then(|s| s.phase.clone()).unwrap_or_default(),
        reason: status.and_then(|s| s.reason.clone()),
        message: status.and_then(|s| s.message.clone()),
        ready: pod.is_ready(),
        start_time: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0.to_rfc3339()),
        labels: pod.labels().clone(),
        containers: container_schemas(status),
    }
}

fn container_schemas(status: Option<&corev1::PodStatus>) -> Vec<KubeContainerSchema> {
    let mut containers: Vec<KubeContainerSchema> = status
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(to_container_schema).collect())
        .unwrap_or_default();
    containers.sort_by(|a, b| a.name.cmp(&b.name));
    containers
}

fn to_container_schema(cs: &corev1::ContainerStatus) -> KubeContainerSchema {
    KubeContainerSchema {
        name: cs.name.clone(),
        image: cs.image.clone(),
        ready: cs.ready,
        restart_count: cs.restart_count,
        state: container_state_brief(cs.state.as_ref()),
    }
}

// Per the Kubernetes spec it is an error for more than one of running/terminated/waiting to be
// set, so the catch-all at the bottom only fires on malformed input.
fn container_state_brief(state: Option<&corev1::ContainerState>) -> String {
    match state {
        Some(corev1::ContainerState { running: Some(_), terminated: None, waiting: None }) => "running".into(),
        Some(corev1::ContainerState { running: None, terminated: Some(t), waiting: None }) => {
            match t.reason.as_deref() {
                Some(reason) => format!("terminated:{reason}"),
                None => "terminated".into(),
            }
        },
        Some(corev1::ContainerState { running: None, terminated: None, waiting: Some(w) }) => {
            match w.reason.as_deref() {
                Some(reason) => format!("waiting:{reason}"),
                None => "waiting".into(),
            }
        },
        _ => "unknown".into(),
    }
}

// Render one Kubernetes event the way the dashboard's log viewer shows it.  When the stream is
// already scoped to a single pod the involved object is redundant and omitted.
pub fn build_event_line(event: &corev1::Event, with_involved_object: bool) -> String {
    let time = event
        .last_timestamp
        .as_ref()
        .or(event.first_timestamp.as_ref())
        .map(|t| t.0.to_rfc3339())
        .or_else(|| event.event_time.as_ref().map(|t| t.0.to_rfc3339()))
        .unwrap_or_else(|| "-".into());
    let reason = event.reason.as_deref().unwrap_or("-");
    let message = event.message.as_deref().unwrap_or("");

    if with_involved_object {
        let kind = event.involved_object.kind.as_deref().unwrap_or("-");
        let name = event.involved_object.name.as_deref().unwrap_or("-");
        format!("[{time}] [{kind}] [{name}] [{reason}] {message}")
    } else {
        format!("[{time}] [{reason}] {message}")
    }
}

// The full rendered batch for an event stream: chronological, ties broken by event name so the
// order is total and change detection doesn't misfire.
pub fn build_event_lines(events: &[Arc<corev1::Event>], pod_name: Option<&str>, namespace: &str) -> Vec<String> {
    let mut matching: Vec<&Arc<corev1::Event>> = events
        .iter()
        .filter(|evt| event_matches(evt, pod_name, namespace))
        .collect();
    matching.sort_by_key(|evt| {
        let ts = evt
            .last_timestamp
            .as_ref()
            .or(evt.first_timestamp.as_ref())
            .map(|t| t.0.timestamp());
        (ts, evt.namespaced_name())
    });

    let lines: Vec<String> = matching
        .iter()
        .map(|evt| build_event_line(evt, pod_name.is_none()))
        .collect();
    if lines.is_empty() {
        vec![NO_EVENT_LINE.into()]
    } else {
        lines
    }
}

fn event_matches(event: &corev1::Event, pod_name: Option<&str>, namespace: &str) -> bool {
    if !namespace.is_empty() && event.namespace().as_deref() != Some(namespace) {
        return false;
    }
    match pod_name {
        Some(name) => {
            event.involved_object.kind.as_deref() == Some("Pod") && event.involved_object.name.as_deref() == Some(name)
        },
        None => true,
    }
}
