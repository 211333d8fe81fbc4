use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sl_api::v1::WsRespSchema;
use sl_core::prelude::*;
use tokio::sync::watch;
use tracing::*;

// The write half of a client connection.  Implementations must serialize writes internally (the
// server's sink holds the socket behind an async mutex); the broadcast layer only ever hands a
// whole frame across this boundary, which is also what keeps the group logic testable without
// sockets.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_text(&self, text: String) -> EmptyResult;
}

// One client's streaming connection.  A session is "new" from admission until its first
// successful write, which is what guarantees it gets a frame on the very next sweep even when
// nothing changed; it is "closed" once any write fails or the reader saw the socket go away.
// Closed sessions stay in their group's set only until the next sweep prunes them.
pub struct Session {
    sink: Box<dyn FrameSink>,
    is_new: AtomicBool,
    closed: AtomicBool,
    cancel_tx: watch::Sender<bool>,
}

impl Session {
    pub fn new(sink: Box<dyn FrameSink>) -> Arc<Session> {
        let (cancel_tx, _) = watch::channel(false);
        Arc::new(Session {
            sink,
            is_new: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            cancel_tx,
        })
    }

    pub fn is_new(&self) -> bool {
        self.is_new.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    // Called by the reader task when the client goes away; wakes up whatever is driving this
    // session so it can detach.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn cancelled(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    // All payload types go through here so the success-frame envelope is identical on every
    // stream.  A failed write closes the session; is_new is cleared only on success, so a session
    // that never got a clean frame stays eligible for one on the next sweep.
    pub async fn send_payload<T: Serialize + Sync>(&self, payload: &T) -> EmptyResult {
        let frame = serde_json::to_string(&WsRespSchema::success(payload))?;
        match self.sink.send_text(frame).await {
            Ok(()) => {
                self.is_new.store(false, Ordering::SeqCst);
                Ok(())
            },
            Err(err) => {
                debug!("session write failed, closing: {err:#}");
                self.close();
                Err(err)
            },
        }
    }

    pub async fn send_error(&self, message: &str) {
        let frame = WsRespSchema::<()>::error(message);
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = self.sink.send_text(text).await;
        }
        self.close();
    }
}
