//! Real-time change feed: a broadcast dispatcher plus the WebSocket
//! connection loop that forwards section-scoped and user-targeted events.

pub mod connection;
pub mod dispatcher;

pub use dispatcher::Dispatcher;
