mod events;
mod group;
mod informer;
mod registry;
mod session;
mod status;
mod subject;
mod view;

pub use crate::events::{
    run_event_stream,
    EventStreamScope,
};
pub use crate::group::{
    BroadcastGroup,
    GroupRegistry,
    GroupTuning,
};
pub use crate::informer::{
    EventInformer,
    ObjEvent,
    ObjInformer,
    PodInformer,
    WatchedObject,
};
pub use crate::registry::{
    ClientSource,
    InformerRegistry,
};
pub use crate::session::{
    FrameSink,
    Session,
};
pub use crate::status::{
    LogOnlyStatusSync,
    StatusSync,
};
pub use crate::subject::Subject;
pub use crate::view::{
    build_event_line,
    build_event_lines,
    build_pod_view,
};

#[cfg(test)]
mod tests;
