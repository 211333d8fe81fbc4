use std::collections::BTreeMap;

use chrono::DateTime;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use rstest::*;
use sl_core::constants::DEPLOYMENT_LABEL_KEY;

use crate::constants::*;

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// A pod belonging to the test deployment, running and ready; tests mutate it from here.
#[fixture]
pub fn test_pod(#[default(TEST_POD)] name: &str) -> corev1::Pod {
    let mut pod = corev1::Pod {
        metadata: metav1::ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(name.into()),
            labels: Some(labels(&[(DEPLOYMENT_LABEL_KEY, TEST_DEPLOYMENT), ("app", "foo")])),
            ..Default::default()
        },
        spec: Some(corev1::PodSpec {
            node_name: Some(TEST_NODE.into()),
            ..Default::default()
        }),
        status: Some(corev1::PodStatus {
            phase: Some("Running".into()),
            start_time: Some(metav1::Time(DateTime::from_timestamp(1234567890, 0).unwrap())),
            ..Default::default()
        }),
        ..Default::default()
    };
    set_ready(&mut pod, true);
    pod
}

pub fn set_phase(pod: &mut corev1::Pod, phase: &str) {
    pod.status.get_or_insert_with(Default::default).phase = Some(phase.into());
}

pub fn set_labels(pod: &mut corev1::Pod, pairs: &[(&str, &str)]) {
    pod.metadata.labels = Some(labels(pairs));
}

pub fn set_ready(pod: &mut corev1::Pod, ready: bool) {
    let status = pod.status.get_or_insert_with(Default::default);
    status.conditions = Some(vec![corev1::PodCondition {
        type_: "Ready".into(),
        status: if ready { "True" } else { "False" }.into(),
        ..Default::default()
    }]);
}

pub fn add_running_container(pod: &mut corev1::Pod, name: &str) {
    add_container_with_state(
        pod,
        name,
        corev1::ContainerState {
            running: Some(corev1::ContainerStateRunning { started_at: None }),
            ..Default::default()
        },
    );
}

pub fn add_waiting_container(pod: &mut corev1::Pod, name: &str, reason: &str) {
    add_container_with_state(
        pod,
        name,
        corev1::ContainerState {
            waiting: Some(corev1::ContainerStateWaiting {
                reason: Some(reason.into()),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
}

fn add_container_with_state(pod: &mut corev1::Pod, name: &str, state: corev1::ContainerState) {
    let status = pod.status.get_or_insert_with(Default::default);
    status
        .container_statuses
        .get_or_insert_with(Vec::new)
        .push(corev1::ContainerStatus {
            name: name.into(),
            image: format!("registry.test/{name}:latest"),
            ready: state.running.is_some(),
            restart_count: 0,
            state: Some(state),
            ..Default::default()
        });
}
