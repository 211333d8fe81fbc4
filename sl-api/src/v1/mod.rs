use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

// Every server-to-client websocket frame has the same envelope; the payload type depends on the
// stream that produced it (pod schemas for pod streams, rendered lines for event streams).  Error
// frames always carry a null payload.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WsRespType {
    Success,
    Error,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WsRespSchema<T> {
    #[serde(rename = "type")]
    pub type_: WsRespType,
    pub message: String,
    pub payload: Option<T>,
}

impl<T> WsRespSchema<T> {
    pub fn success(payload: T) -> WsRespSchema<T> {
        WsRespSchema {
            type_: WsRespType::Success,
            message: String::new(),
            payload: Some(payload),
        }
    }

    pub fn error(message: &str) -> WsRespSchema<T> {
        WsRespSchema {
            type_: WsRespType::Error,
            message: message.into(),
            payload: None,
        }
    }
}

// The client-facing rendition of a pod; the field set matches what the dashboard's pod table
// renders.  Keep the derived PartialEq in sync with "two views are the same" -- the broadcast
// layer uses it to decide whether to fan a new view out, so every field here must be
// deterministic for a given pod (labels are a BTreeMap for exactly that reason).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubePodSchema {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    pub node_name: String,
    pub phase: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub ready: bool,
    pub start_time: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<KubeContainerSchema>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeContainerSchema {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: String,
}
