//! Types shared between the showcase server, its gateway and client consumers.

pub mod api;
pub mod events;
pub mod format;
pub mod models;
