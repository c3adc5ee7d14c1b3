// Streaming search: frames → events → per-source state + result set → notifications.
// Only `session` talks to a transport; the other modules are pure.

pub mod aggregator;
pub mod event;
pub mod frame;
pub mod session;
pub mod tracker;
pub mod transport;

pub use session::{
    SearchNotification, SessionController, SessionOptions, SessionSnapshot, SessionStatus,
};
pub use tracker::SourceState;
pub use transport::HttpTransport;
