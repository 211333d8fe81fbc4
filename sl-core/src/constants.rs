// Label placed on every pod owned by a managed deployment; deployment-scoped
// streams select their pods by exact match on this key.
pub const DEPLOYMENT_LABEL_KEY: &str = "yatai-deployment";

// Timing
pub const SWEEP_INTERVAL_SECONDS: u64 = 10;
pub const STATUS_SYNC_TIMEOUT_SECONDS: u64 = 10;
pub const INFORMER_READY_TIMEOUT_SECONDS: u64 = 30;

// A manager gives up after this many consecutive failed sweeps; the next
// attached session starts a fresh one.
pub const MAX_CONSECUTIVE_SWEEP_FAILURES: i64 = 10;

// Emitted as the sole payload line when an event stream has nothing to show,
// so the client UI is never blank.
pub const NO_EVENT_LINE: &str = "no event";
