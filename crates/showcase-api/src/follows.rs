use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use showcase_types::api::{Claims, FollowStatus};
use showcase_types::events::GatewayEvent;

use crate::error::ApiError;
use crate::{AppState, run_db};

/// GET /users/{user_id}/follow
pub async fn follow_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FollowStatus>, ApiError> {
    status(&state, claims.sub, user_id).await.map(Json)
}

/// PUT /users/{user_id}/follow: idempotent; only a new edge notifies the followee.
pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FollowStatus>, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }

    let follower = claims.sub.to_string();
    let followee = user_id.to_string();
    let created = run_db(&state, move |db| {
        if db.get_user_by_id(&followee)?.is_none() {
            return Ok(None);
        }
        db.create_follow(&follower, &followee).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("user"))?;

    if created {
        info!("{} followed {}", claims.sub, user_id);
        state
            .dispatcher
            .send_to_user(
                user_id,
                GatewayEvent::FollowCreate {
                    follower_id: claims.sub,
                    followee_id: user_id,
                },
            )
            .await;
    }

    status(&state, claims.sub, user_id).await.map(Json)
}

/// DELETE /users/{user_id}/follow: idempotent.
pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FollowStatus>, ApiError> {
    let follower = claims.sub.to_string();
    let followee = user_id.to_string();
    let removed = run_db(&state, move |db| db.remove_follow(&follower, &followee)).await?;

    if removed {
        info!("{} unfollowed {}", claims.sub, user_id);
        state
            .dispatcher
            .send_to_user(
                user_id,
                GatewayEvent::FollowRemove {
                    follower_id: claims.sub,
                    followee_id: user_id,
                },
            )
            .await;
    }

    status(&state, claims.sub, user_id).await.map(Json)
}

async fn status(state: &AppState, actor: Uuid, target: Uuid) -> Result<FollowStatus, ApiError> {
    let actor = actor.to_string();
    let target = target.to_string();
    run_db(state, move |db| {
        let following = db.is_following(&actor, &target)?;
        let (followers, following_count) = db.follow_counts(&target)?;
        Ok(FollowStatus {
            following,
            followers,
            following_count,
        })
    })
    .await
}
