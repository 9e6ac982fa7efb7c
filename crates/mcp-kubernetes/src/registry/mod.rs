pub mod portforward;
pub mod tracker;
pub mod watch;

pub use portforward::{ForwardSpec, PortForwardRegistry};
pub use tracker::ResourceTracker;
pub use watch::{EventSink, WatchInfo, WatchRegistry};
