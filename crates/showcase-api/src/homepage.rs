use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use showcase_types::api::{CardInput, HeroInput, ReorderCardsRequest};
use showcase_types::models::{HeroConfig, HomepageCard};

use crate::error::ApiError;
use crate::{AppState, require_text, run_db};

// -- Public --

/// GET /homepage/hero: active heroes in display order.
pub async fn public_heroes(State(state): State<AppState>) -> Result<Json<Vec<HeroConfig>>, ApiError> {
    list_heroes(&state, true).await.map(Json)
}

/// GET /homepage/cards: published cards in display order.
pub async fn public_cards(State(state): State<AppState>) -> Result<Json<Vec<HomepageCard>>, ApiError> {
    list_cards(&state, true).await.map(Json)
}

// -- Admin: heroes --

pub async fn admin_heroes(State(state): State<AppState>) -> Result<Json<Vec<HeroConfig>>, ApiError> {
    list_heroes(&state, false).await.map(Json)
}

pub async fn create_hero(
    State(state): State<AppState>,
    Json(input): Json<HeroInput>,
) -> Result<impl IntoResponse, ApiError> {
    require_text(&input.title, "title")?;
    let id = Uuid::new_v4().to_string();
    let row = run_db(&state, move |db| db.insert_hero(&id, &input)).await?;
    Ok((StatusCode::CREATED, Json(row.into_model())))
}

pub async fn update_hero(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<HeroInput>,
) -> Result<Json<HeroConfig>, ApiError> {
    require_text(&input.title, "title")?;
    let row = run_db(&state, move |db| db.update_hero(&id.to_string(), &input))
        .await?
        .ok_or(ApiError::NotFound("hero"))?;
    Ok(Json(row.into_model()))
}

// -- Admin: cards --

pub async fn admin_cards(State(state): State<AppState>) -> Result<Json<Vec<HomepageCard>>, ApiError> {
    list_cards(&state, false).await.map(Json)
}

pub async fn create_card(
    State(state): State<AppState>,
    Json(input): Json<CardInput>,
) -> Result<impl IntoResponse, ApiError> {
    require_text(&input.title, "title")?;
    let id = Uuid::new_v4().to_string();
    let row = run_db(&state, move |db| db.insert_card(&id, &input)).await?;
    Ok((StatusCode::CREATED, Json(row.into_model())))
}

pub async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CardInput>,
) -> Result<Json<HomepageCard>, ApiError> {
    require_text(&input.title, "title")?;
    let row = run_db(&state, move |db| db.update_card(&id.to_string(), &input))
        .await?
        .ok_or(ApiError::NotFound("card"))?;
    Ok(Json(row.into_model()))
}

/// PUT /admin/cards/order: returns the full card list in its new order.
pub async fn reorder_cards(
    State(state): State<AppState>,
    Json(req): Json<ReorderCardsRequest>,
) -> Result<Json<Vec<HomepageCard>>, ApiError> {
    let unique: HashSet<&Uuid> = req.ids.iter().collect();
    if unique.len() != req.ids.len() {
        return Err(ApiError::BadRequest("card ids must not repeat".into()));
    }
    let ids: Vec<String> = req.ids.iter().map(Uuid::to_string).collect();
    let moved = run_db(&state, move |db| db.reorder_cards(&ids)).await?;
    if moved != req.ids.len() {
        return Err(ApiError::NotFound("card"));
    }
    list_cards(&state, false).await.map(Json)
}

async fn list_heroes(state: &AppState, active_only: bool) -> Result<Vec<HeroConfig>, ApiError> {
    let rows = run_db(state, move |db| db.list_heroes(active_only)).await?;
    Ok(rows.into_iter().map(|r| r.into_model()).collect())
}

async fn list_cards(state: &AppState, published_only: bool) -> Result<Vec<HomepageCard>, ApiError> {
    let rows = run_db(state, move |db| db.list_cards(published_only)).await?;
    Ok(rows.into_iter().map(|r| r.into_model()).collect())
}
