//! In-process backend: reads the store directly and listens on the
//! dispatcher, the way the server itself does.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use showcase_db::Database;
use showcase_gateway::Dispatcher;
use showcase_types::events::GatewayEvent;
use showcase_types::models::SiteConfigEntry;

use crate::backend::{ConfigBackend, FollowBackend, SectionSnapshot, Subscription};
use crate::error::BackendError;

#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Admin write: store the section and announce it on the change feed.
    pub async fn put_section(
        &self,
        section: &str,
        value: serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<SiteConfigEntry, BackendError> {
        let section = section.to_string();
        let value_json = serde_json::to_string(&value)?;
        let updated_by = updated_by.map(|id| id.to_string());

        let entry = self
            .blocking(move |db| db.put_section(&section, &value_json, updated_by.as_deref()))
            .await?
            .into_model();
        self.dispatcher.publish_config(&entry);
        Ok(entry)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
            .map_err(BackendError::from)
    }
}

impl ConfigBackend for LocalBackend {
    async fn get(&self, section: &str) -> Result<Option<SectionSnapshot>, BackendError> {
        let section = section.to_string();
        let row = self.blocking(move |db| db.get_section(&section)).await?;
        Ok(row.map(|row| {
            let entry = row.into_model();
            SectionSnapshot {
                value: entry.value,
                revision: entry.revision,
            }
        }))
    }

    async fn subscribe(&self, section: &str) -> Result<Subscription, BackendError> {
        // The receiver exists before this returns, so later writes are never missed.
        let mut feed = self.dispatcher.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let wanted = section.to_string();

        let forward = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(GatewayEvent::ConfigUpdate {
                        section,
                        value,
                        revision,
                    }) if section == wanted => {
                        if tx.send(SectionSnapshot { value, revision }).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("config feed for '{}' lagged by {} events", wanted, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("config feed for '{}' closed", wanted);
        });

        Ok(Subscription::new(rx, move || forward.abort()))
    }
}

impl FollowBackend for LocalBackend {
    async fn follow(&self, actor: Uuid, target: Uuid) -> Result<(), BackendError> {
        let (follower, followee) = (actor.to_string(), target.to_string());
        let created = self
            .blocking(move |db| db.create_follow(&follower, &followee))
            .await?;
        if created {
            self.dispatcher
                .send_to_user(
                    target,
                    GatewayEvent::FollowCreate {
                        follower_id: actor,
                        followee_id: target,
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn unfollow(&self, actor: Uuid, target: Uuid) -> Result<(), BackendError> {
        let (follower, followee) = (actor.to_string(), target.to_string());
        let removed = self
            .blocking(move |db| db.remove_follow(&follower, &followee))
            .await?;
        if removed {
            self.dispatcher
                .send_to_user(
                    target,
                    GatewayEvent::FollowRemove {
                        follower_id: actor,
                        followee_id: target,
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn is_following(&self, actor: Uuid, target: Uuid) -> Result<bool, BackendError> {
        let (follower, followee) = (actor.to_string(), target.to_string());
        self.blocking(move |db| db.is_following(&follower, &followee))
            .await
    }
}
