use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use showcase_types::api::ProductInput;
use showcase_types::format::slugify;
use showcase_types::models::Product;

use crate::error::ApiError;
use crate::{AppState, require_text, run_db};

/// GET /store/products
pub async fn public_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    list_products(&state, true).await.map(Json)
}

/// GET /store/products/{slug}
pub async fn public_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let row = run_db(&state, move |db| db.get_product_by_slug(&slug, true))
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(row.into_model()))
}

pub async fn admin_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    list_products(&state, false).await.map(Json)
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = validate_product(&input)?;
    let id = Uuid::new_v4().to_string();
    let row = run_db(&state, move |db| db.insert_product(&id, &slug, &input))
        .await
        .map_err(|e| e.conflict_on_constraint("slug already in use"))?;
    Ok((StatusCode::CREATED, Json(row.into_model())))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let slug = validate_product(&input)?;
    let row = run_db(&state, move |db| db.update_product(&id.to_string(), &slug, &input))
        .await
        .map_err(|e| e.conflict_on_constraint("slug already in use"))?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(Json(row.into_model()))
}

/// Checks the input and returns the slug to store.
fn validate_product(input: &ProductInput) -> Result<String, ApiError> {
    require_text(&input.name, "name")?;
    if input.price_cents < 0 {
        return Err(ApiError::BadRequest("price must not be negative".into()));
    }
    if input.stock < 0 {
        return Err(ApiError::BadRequest("stock must not be negative".into()));
    }
    if input.currency.len() != 3 || !input.currency.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ApiError::BadRequest("currency must be a 3-letter ISO code".into()));
    }

    let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
    if slug.is_empty() {
        return Err(ApiError::BadRequest("slug must contain letters or digits".into()));
    }
    Ok(slug)
}

async fn list_products(state: &AppState, published_only: bool) -> Result<Vec<Product>, ApiError> {
    let rows = run_db(state, move |db| db.list_products(published_only)).await?;
    Ok(rows.into_iter().map(|r| r.into_model()).collect())
}
