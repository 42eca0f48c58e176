use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::FollowBackend;
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowLabel {
    Follow,
    Unfollow,
}

impl FollowLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "Follow",
            Self::Unfollow => "Unfollow",
        }
    }
}

/// User-visible failure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nobody signed in, or the target is the actor.
    Hidden,
    /// Another click is still in flight.
    Ignored,
    Followed,
    Unfollowed,
    Failed(Notice),
}

/// Follow toggle for one target user.
pub struct FollowButton<B: FollowBackend> {
    backend: Arc<B>,
    actor: Option<Uuid>,
    target: Uuid,
    following: AtomicBool,
    busy: AtomicBool,
}

/// Clears the busy flag when the click finishes, including on cancellation.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: FollowBackend> FollowButton<B> {
    pub fn new(backend: Arc<B>, actor: Option<Uuid>, target: Uuid, following: bool) -> Self {
        Self {
            backend,
            actor,
            target,
            following: AtomicBool::new(following),
            busy: AtomicBool::new(false),
        }
    }

    fn actor(&self) -> Option<Uuid> {
        self.actor.filter(|actor| *actor != self.target)
    }

    /// `None` means the button is not shown.
    pub fn label(&self) -> Option<FollowLabel> {
        self.actor()?;
        Some(if self.is_following() {
            FollowLabel::Unfollow
        } else {
            FollowLabel::Follow
        })
    }

    pub fn is_following(&self) -> bool {
        self.following.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Reload the relation from the backend.
    pub async fn refresh(&self) -> Result<bool, BackendError> {
        let Some(actor) = self.actor() else {
            return Ok(false);
        };
        let following = self.backend.is_following(actor, self.target).await?;
        self.following.store(following, Ordering::Release);
        Ok(following)
    }

    pub async fn click(&self) -> ClickOutcome {
        let Some(actor) = self.actor() else {
            return ClickOutcome::Hidden;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ClickOutcome::Ignored;
        }
        let _guard = BusyGuard(&self.busy);

        if self.is_following() {
            match self.backend.unfollow(actor, self.target).await {
                Ok(()) => {
                    self.following.store(false, Ordering::Release);
                    info!("{} unfollowed {}", actor, self.target);
                    ClickOutcome::Unfollowed
                }
                Err(e) => {
                    warn!("unfollow {} failed: {}", self.target, e);
                    ClickOutcome::Failed(notice(&e, "Could not unfollow. Please try again."))
                }
            }
        } else {
            match self.backend.follow(actor, self.target).await {
                Ok(()) => {
                    self.following.store(true, Ordering::Release);
                    info!("{} followed {}", actor, self.target);
                    ClickOutcome::Followed
                }
                Err(e) => {
                    warn!("follow {} failed: {}", self.target, e);
                    ClickOutcome::Failed(notice(&e, "Could not follow. Please try again."))
                }
            }
        }
    }
}

fn notice(error: &BackendError, fallback: &str) -> Notice {
    let message = match error {
        BackendError::Unauthorized => "Please sign in again.".to_string(),
        _ => fallback.to_string(),
    };
    Notice { message }
}
