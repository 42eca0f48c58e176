//! Client-side consumers of the showcase backend.
//!
//! [`LiveConfig`] keeps a configuration section in sync with the store and
//! its change feed, [`FollowButton`] drives a follow toggle, and [`Session`]
//! tracks the signed-in user. All of them talk to the backend through the
//! narrow traits in [`backend`], implemented in-process by [`LocalBackend`]
//! and over HTTP/WebSocket by [`RemoteBackend`].

pub mod backend;
pub mod error;
pub mod follow_button;
pub mod live_config;
pub mod local;
pub mod merge;
pub mod remote;
pub mod session;

pub use backend::{AuthBackend, ConfigBackend, FollowBackend, SectionSnapshot, Subscription};
pub use error::BackendError;
pub use follow_button::{ClickOutcome, FollowButton, FollowLabel, Notice};
pub use live_config::{ConfigState, LiveConfig};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use session::{Session, SignedInUser};
