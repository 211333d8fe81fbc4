use std::sync::Arc;
use std::time::Duration;

use sl_core::prelude::*;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::*;

use crate::informer::{
    EventInformer,
    ObjEvent,
};
use crate::session::Session;
use crate::view::build_event_lines;

// What one event-stream client is looking at.  Namespace scoping happens at the informer; the
// optional pod name narrows the rendered batch to a single pod's events (and drops the involved
// object from each line, since it'd be the same pod every time).
#[derive(Clone, Debug, Default)]
pub struct EventStreamScope {
    pub namespace: String,
    pub pod_name: Option<String>,
}

// Event streams have no fan-out group: each client gets its own loop over the shared event
// informer.  The first batch is always written (even when it's just "no event"), after that only
// changes go out.  Runs until the session is cancelled or a write fails; there is nothing to
// clean up server-side, reconnecting is entirely the client's business.
pub async fn run_event_stream(
    informer: &EventInformer,
    scope: &EventStreamScope,
    session: &Arc<Session>,
    sweep_interval: Duration,
) -> EmptyResult {
    let mut notifications = informer.subscribe();
    let mut cancel = session.cancelled();
    let mut tick = tokio::time::interval(sweep_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_lines: Option<Vec<String>> = None;
    loop {
        let lines = build_event_lines(&informer.store().state(), scope.pod_name.as_deref(), &scope.namespace);
        if last_lines.as_ref() != Some(&lines) {
            session.send_payload(&lines).await?;
            last_lines = Some(lines);
        }

        tokio::select! {
            _ = cancel.changed() => break,

            evt = notifications.recv() => match evt {
                Ok(ObjEvent::WatchFailed(msg)) => {
                    // Transient upstream failure; the batch just doesn't refresh this round
                    debug!("event watch error for {}/{}: {msg}", scope.namespace, session_scope_name(scope));
                },
                Ok(_) => (),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event stream dropped {n} notifications, rebuilding");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = tick.tick() => (),
        }
    }

    Ok(())
}

fn session_scope_name(scope: &EventStreamScope) -> &str {
    scope.pod_name.as_deref().unwrap_or("*")
}
