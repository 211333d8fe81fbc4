use chrono::DateTime;

use super::*;

fn arcs(pods: &[corev1::Pod]) -> Vec<Arc<corev1::Pod>> {
    pods.iter().cloned().map(Arc::new).collect()
}

#[rstest]
fn test_build_pod_view_is_order_insensitive() {
    let pods = vec![test_pod("pod-c"), test_pod("pod-a"), test_pod("pod-b")];
    let mut shuffled = pods.clone();
    shuffled.reverse();

    let subject = deployment_subject();
    let view = build_pod_view(&arcs(&pods), &subject);
    let view_shuffled = build_pod_view(&arcs(&shuffled), &subject);

    assert_eq!(view, view_shuffled);
    let names: Vec<&str> = view.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["pod-a", "pod-b", "pod-c"]);
}

#[rstest]
fn test_build_pod_view_filters_before_transforming() {
    let mut unrelated = test_pod("stranger");
    set_labels(&mut unrelated, &[("app", "unrelated")]);
    let pods = vec![test_pod("pod-a"), unrelated];

    let view = build_pod_view(&arcs(&pods), &deployment_subject());
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].name, "pod-a");
}

#[rstest]
fn test_build_pod_view_selector_subject() {
    let mut prod = test_pod("prod-pod");
    set_labels(&mut prod, &[("app", "foo"), ("tier", "prod")]);
    let mut debug = test_pod("debug-pod");
    set_labels(&mut debug, &[("app", "foo"), ("tier", "debug")]);

    let subject = Subject::Selector {
        cluster: TEST_CLUSTER.into(),
        namespace: TEST_NAMESPACE.into(),
        selector: "app=foo,tier!=debug".parse().unwrap(),
    };
    let view = build_pod_view(&arcs(&[prod, debug]), &subject);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].name, "prod-pod");
}

#[rstest]
fn test_pod_schema_fields() {
    let mut pod = test_pod("pod-a");
    add_running_container(&mut pod, "server");
    add_waiting_container(&mut pod, "adapter", "ImagePullBackOff");

    let view = build_pod_view(&arcs(&[pod]), &deployment_subject());
    let schema = &view[0];

    assert_eq!(schema.cluster, TEST_CLUSTER);
    assert_eq!(schema.namespace, TEST_NAMESPACE);
    assert_eq!(schema.node_name, TEST_NODE);
    assert_eq!(schema.phase, "Running");
    assert!(schema.ready);
    assert!(schema.start_time.is_some());
    assert_eq!(schema.labels.get(DEPLOYMENT_LABEL_KEY).unwrap(), TEST_DEPLOYMENT);

    // Containers are sorted by name, and their states summarized
    assert_eq!(schema.containers.len(), 2);
    assert_eq!(schema.containers[0].name, "adapter");
    assert_eq!(schema.containers[0].state, "waiting:ImagePullBackOff");
    assert!(!schema.containers[0].ready);
    assert_eq!(schema.containers[1].name, "server");
    assert_eq!(schema.containers[1].state, "running");
    assert!(schema.containers[1].ready);
}

#[rstest]
fn test_empty_matching_set_builds_empty_view() {
    let mut unrelated = test_pod("stranger");
    set_labels(&mut unrelated, &[("app", "unrelated")]);

    let view = build_pod_view(&arcs(&[unrelated]), &deployment_subject());
    assert!(view.is_empty());
}

#[rstest]
fn test_build_event_line_scoped_to_pod() {
    let event = test_event("the-event");
    let line = build_event_line(&event, false);
    let ts = DateTime::from_timestamp(1234567890, 0).unwrap().to_rfc3339();
    assert_eq!(line, format!("[{ts}] [Scheduled] Successfully assigned the-pod to node-1"));
}

#[rstest]
fn test_build_event_line_with_involved_object() {
    let event = test_event("the-event");
    let line = build_event_line(&event, true);
    assert!(line.contains("[Pod] [the-pod]"));
    assert!(line.ends_with("Successfully assigned the-pod to node-1"));
}

#[rstest]
fn test_build_event_line_missing_time() {
    let mut event = test_event("the-event");
    event.last_timestamp = None;
    let line = build_event_line(&event, false);
    assert!(line.starts_with("[-] "));
}

#[rstest]
fn test_build_event_lines_empty_batch() {
    assert_eq!(build_event_lines(&[], None, TEST_NAMESPACE), vec![NO_EVENT_LINE.to_string()]);
}

#[rstest]
fn test_build_event_lines_pod_filter() {
    let pod_event = test_event("ev-pod");
    let mut node_event = test_event("ev-node");
    set_involved_object(&mut node_event, "Node", "node-1");

    let events: Vec<Arc<corev1::Event>> = vec![Arc::new(pod_event), Arc::new(node_event)];

    let all = build_event_lines(&events, None, TEST_NAMESPACE);
    assert_eq!(all.len(), 2);

    let scoped = build_event_lines(&events, Some(TEST_POD), TEST_NAMESPACE);
    assert_eq!(scoped.len(), 1);
    assert!(!scoped[0].contains("[Pod]"));
}

#[rstest]
fn test_build_event_lines_chronological() {
    let mut early = test_event("ev-early");
    early.last_timestamp = Some(metav1::Time(DateTime::from_timestamp(1000, 0).unwrap()));
    set_reason_message(&mut early, "Pulled", "image pulled");
    let mut late = test_event("ev-late");
    late.last_timestamp = Some(metav1::Time(DateTime::from_timestamp(2000, 0).unwrap()));
    set_reason_message(&mut late, "Started", "container started");

    let lines = build_event_lines(&[Arc::new(late), Arc::new(early)], Some(TEST_POD), TEST_NAMESPACE);
    assert!(lines[0].contains("Pulled"));
    assert!(lines[1].contains("Started"));
}
