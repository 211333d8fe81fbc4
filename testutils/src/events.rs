use chrono::DateTime;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use rstest::*;

use crate::constants::*;

// An event about the test pod, timestamped so rendered lines are stable.
#[fixture]
pub fn test_event(#[default("the-event")] name: &str) -> corev1::Event {
    corev1::Event {
        metadata: metav1::ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(name.into()),
            ..Default::default()
        },
        involved_object: corev1::ObjectReference {
            kind: Some("Pod".into()),
            name: Some(TEST_POD.into()),
            namespace: Some(TEST_NAMESPACE.into()),
            ..Default::default()
        },
        reason: Some("Scheduled".into()),
        message: Some("Successfully assigned the-pod to node-1".into()),
        last_timestamp: Some(metav1::Time(DateTime::from_timestamp(1234567890, 0).unwrap())),
        ..Default::default()
    }
}

pub fn set_involved_object(event: &mut corev1::Event, kind: &str, name: &str) {
    event.involved_object.kind = Some(kind.into());
    event.involved_object.name = Some(name.into());
}

pub fn set_reason_message(event: &mut corev1::Event, reason: &str, message: &str) {
    event.reason = Some(reason.into());
    event.message = Some(message.into());
}
