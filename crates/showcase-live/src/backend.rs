//! The narrow interface consumers use to reach the backend.

use std::future::Future;

use tokio::sync::mpsc;
use uuid::Uuid;

use showcase_types::api::{AuthResponse, RegisterRequest};

use crate::error::BackendError;

/// A stored section value together with its store revision.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSnapshot {
    pub value: serde_json::Value,
    pub revision: u64,
}

/// Point reads and change-feed subscriptions for configuration sections.
pub trait ConfigBackend: Send + Sync + 'static {
    /// `Ok(None)` when the section has never been stored.
    fn get(
        &self,
        section: &str,
    ) -> impl Future<Output = Result<Option<SectionSnapshot>, BackendError>> + Send;

    /// Resolves once the subscription is active: every write that happens
    /// afterwards is delivered.
    fn subscribe(
        &self,
        section: &str,
    ) -> impl Future<Output = Result<Subscription, BackendError>> + Send;
}

/// Create and remove follow edges for `actor`.
pub trait FollowBackend: Send + Sync + 'static {
    fn follow(&self, actor: Uuid, target: Uuid) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn unfollow(&self, actor: Uuid, target: Uuid) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn is_following(
        &self,
        actor: Uuid,
        target: Uuid,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;
}

pub trait AuthBackend: Send + Sync + 'static {
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthResponse, BackendError>> + Send;

    fn register(
        &self,
        request: RegisterRequest,
    ) -> impl Future<Output = Result<AuthResponse, BackendError>> + Send;

    /// Forget any credentials the backend holds.
    fn sign_out(&self);
}

/// Live updates for one section.
///
/// Dropping the subscription runs its unsubscribe action exactly once.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SectionSnapshot>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<SectionSnapshot>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_drop: Some(Box::new(unsubscribe)),
        }
    }

    /// Next update, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<SectionSnapshot> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.on_drop.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_drop.is_some())
            .finish()
    }
}
