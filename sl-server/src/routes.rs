use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{
    Message,
    WebSocket,
    WebSocketUpgrade,
};
use axum::extract::{
    Path,
    Query,
    State,
};
use axum::http::HeaderMap;
use axum::response::{
    IntoResponse,
    Response,
};
use axum::routing::get;
use axum::Router;
use futures::stream::{
    SplitSink,
    SplitStream,
};
use futures::{
    SinkExt,
    StreamExt,
};
use serde::Deserialize;
use sl_api::v1::WsRespSchema;
use sl_broadcast::{
    run_event_stream,
    BroadcastGroup,
    EventStreamScope,
    FrameSink,
    GroupRegistry,
    InformerRegistry,
    Session,
    Subject,
};
use sl_core::k8s::Selector;
use sl_core::prelude::*;
use tracing::*;

use crate::auth::{
    Authorizer,
    Identity,
};
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub authorizer: Arc<dyn Authorizer>,
    pub informers: Arc<InformerRegistry>,
    pub groups: Arc<GroupRegistry>,
}

// The same query surface for every stream route; each handler picks out what it understands.
// organization_name is accepted for wire compatibility but identity carries the org externally.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/v1/clusters/{cluster}/ws/pods", get(ws_cluster_pods))
        .route("/ws/v1/clusters/{cluster}/deployments/{deployment}/ws/pods", get(ws_deployment_pods))
        .route("/ws/v1/clusters/{cluster}/kube_events", get(ws_cluster_events))
        .route(
            "/ws/v1/clusters/{cluster}/namespaces/{namespace}/deployments/{deployment}/kube_events",
            get(ws_deployment_events),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

// All the real work happens after the upgrade: the contract with clients is that any failure
// (auth, not-found, bad selector, informer setup) arrives as a single error frame on the open
// socket, followed by a close.
async fn ws_cluster_pods(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity::from_parts(&headers, query.token.as_deref());
    ws.on_upgrade(move |socket| serve_pod_stream(state, socket, identity, cluster, None, query))
        .into_response()
}

async fn ws_deployment_pods(
    State(state): State<AppState>,
    Path((cluster, deployment)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity::from_parts(&headers, query.token.as_deref());
    ws.on_upgrade(move |socket| serve_pod_stream(state, socket, identity, cluster, Some(deployment), query))
        .into_response()
}

async fn ws_cluster_events(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity::from_parts(&headers, query.token.as_deref());
    let namespace = query.namespace.clone().unwrap_or_default();
    ws.on_upgrade(move |socket| serve_event_stream(state, socket, identity, cluster, namespace, query))
        .into_response()
}

async fn ws_deployment_events(
    State(state): State<AppState>,
    Path((cluster, namespace, _deployment)): Path<(String, String, String)>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity::from_parts(&headers, query.token.as_deref());
    ws.on_upgrade(move |socket| serve_event_stream(state, socket, identity, cluster, namespace, query))
        .into_response()
}

async fn serve_pod_stream(
    state: AppState,
    socket: WebSocket,
    identity: Identity,
    cluster: String,
    deployment: Option<String>,
    query: StreamQuery,
) {
    let (sink, mut reader) = split_socket(socket);

    match admit_pod_session(&state, &sink, &identity, cluster, deployment, &query).await {
        Ok((group, session)) => {
            // This task doubles as the session's reader: all it does from here on is watch for
            // the client going away
            read_until_close(&mut reader).await;
            session.cancel();
            group.detach(&session).await;
        },
        Err(err) => {
            info!("pod stream rejected: {err:#}");
            write_error_frame(&sink, &err).await;
        },
    }
}

async fn admit_pod_session(
    state: &AppState,
    sink: &WsFrameSink,
    identity: &Identity,
    cluster: String,
    deployment: Option<String>,
    query: &StreamQuery,
) -> anyhow::Result<(Arc<BroadcastGroup>, Arc<Session>)> {
    state.authorizer.authorize_view(identity, &cluster).await?;

    let subject = match deployment {
        Some(name) => {
            // A deployment's pods live in its cluster's configured namespace; resolving the
            // deployment record itself is the control plane's job, not ours
            let namespace = state
                .config
                .clusters
                .get(&cluster)
                .map(|c| c.default_namespace.clone())
                .unwrap_or_else(|| "default".into());
            Subject::Deployment { cluster, namespace, name }
        },
        None => {
            let selector: Selector = query.selector.as_deref().unwrap_or_default().parse()?;
            let namespace = query.namespace.clone().unwrap_or_default();
            Subject::Selector { cluster, namespace, selector }
        },
    };

    let informer = state
        .informers
        .pod_informer(subject.cluster(), subject.namespace())
        .await?;

    let session = Session::new(Box::new(sink.clone()));
    let group = state.groups.group_for(&subject, &informer);
    group.admit(session.clone()).await?;
    group.run_manager_if_needed().await;

    Ok((group, session))
}

async fn serve_event_stream(
    state: AppState,
    socket: WebSocket,
    identity: Identity,
    cluster: String,
    namespace: String,
    query: StreamQuery,
) {
    let (sink, mut reader) = split_socket(socket);

    let admitted = async {
        state.authorizer.authorize_view(&identity, &cluster).await?;
        state.informers.event_informer(&cluster, &namespace).await
    }
    .await;

    let informer = match admitted {
        Ok(informer) => informer,
        Err(err) => {
            info!("event stream rejected: {err:#}");
            write_error_frame(&sink, &err).await;
            return;
        },
    };

    let session = Session::new(Box::new(sink.clone()));
    let scope = EventStreamScope {
        namespace,
        pod_name: query.pod_name.clone(),
    };

    // No fan-out group here; the stream loop and the reader race, and whichever finishes first
    // (client hangup or write failure) tears the whole thing down
    tokio::select! {
        res = run_event_stream(&informer, &scope, &session, Duration::from_secs(SWEEP_INTERVAL_SECONDS)) => {
            if let Err(err) = res {
                debug!("event stream ended: {err:#}");
            }
        },
        _ = read_until_close(&mut reader) => session.cancel(),
    }
}

// Client-to-server frames are ignored; this exists solely to notice the close.
async fn read_until_close(reader: &mut SplitStream<WebSocket>) {
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => (),
        }
    }
}

async fn write_error_frame(sink: &WsFrameSink, err: &anyhow::Error) {
    let frame = WsRespSchema::<()>::error(&format!("{err:#}"));
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = sink.send_text(text).await;
    }
}

fn split_socket(socket: WebSocket) -> (WsFrameSink, SplitStream<WebSocket>) {
    let (sink, reader) = socket.split();
    (WsFrameSink { sink: Arc::new(tokio::sync::Mutex::new(sink)) }, reader)
}

// The socket's write half; the async mutex is what serializes writes per session when a sweep's
// concurrent fan-out and an admission write race on the same connection.
#[derive(Clone)]
struct WsFrameSink {
    sink: Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&self, text: String) -> EmptyResult {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }
}
