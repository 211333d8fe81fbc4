use httpmock::prelude::*;
use httpmock::{
    Mock,
    Then,
    When,
};
use k8s_openapi::api::core::v1 as corev1;
use serde_json::json;

pub struct MockServerBuilder {
    server: MockServer,
    mock_ids: Vec<(usize, usize)>,
}

impl MockServerBuilder {
    pub fn new() -> MockServerBuilder {
        MockServerBuilder { server: MockServer::start(), mock_ids: vec![] }
    }

    pub fn assert(&self) {
        for (id, hits) in &self.mock_ids {
            Mock::new(*id, &self.server).assert_hits(*hits)
        }
    }

    pub fn handle<F: Fn(When, Then) + 'static>(&mut self, f: F) -> usize {
        self.handle_multiple(f, 1)
    }

    pub fn handle_multiple<F: Fn(When, Then) + 'static>(&mut self, f: F, calls: usize) -> usize {
        let mock_id = self.server.mock(f).id;
        self.mock_ids.push((mock_id, calls));
        mock_id
    }

    pub fn url(&self) -> http::Uri {
        http::Uri::try_from(self.server.url("/")).unwrap()
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn make_fake_apiserver() -> (MockServerBuilder, kube::Client) {
    let builder = MockServerBuilder::new();
    let config = kube::Config::new(builder.url());
    let client = kube::Client::try_from(config).unwrap();
    (builder, client)
}

pub fn pod_list_body(pods: &[corev1::Pod]) -> serde_json::Value {
    json!({
        "kind": "PodList",
        "apiVersion": "v1",
        "items": pods,
        "metadata": {"resourceVersion": "1"},
    })
}

pub fn event_list_body(events: &[corev1::Event]) -> serde_json::Value {
    json!({
        "kind": "EventList",
        "apiVersion": "v1",
        "items": events,
        "metadata": {"resourceVersion": "1"},
    })
}
