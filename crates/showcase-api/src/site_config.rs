use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use showcase_types::api::{Claims, PutSectionRequest};
use showcase_types::models::SiteConfigEntry;

use crate::error::ApiError;
use crate::{AppState, run_db};

const MAX_SECTION_LEN: usize = 64;

/// GET /config/{section}: the stored value, or 404 so clients fall back to their defaults.
pub async fn get_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<SiteConfigEntry>, ApiError> {
    validate_section(&section)?;
    let row = run_db(&state, move |db| db.get_section(&section))
        .await?
        .ok_or(ApiError::NotFound("section"))?;
    Ok(Json(row.into_model()))
}

/// GET /admin/config
pub async fn list_sections(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_sections()).await?;
    let entries: Vec<SiteConfigEntry> = rows.into_iter().map(|r| r.into_model()).collect();
    Ok(Json(entries))
}

/// PUT /admin/config/{section}: store the value and push it on the change feed.
pub async fn put_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PutSectionRequest>,
) -> Result<Json<SiteConfigEntry>, ApiError> {
    validate_section(&section)?;
    let value_json = serde_json::to_string(&req.value).map_err(anyhow::Error::from)?;
    let updated_by = claims.sub.to_string();

    let entry = run_db(&state, move |db| {
        db.put_section(&section, &value_json, Some(&updated_by))
    })
    .await?
    .into_model();

    info!(
        "{} updated section '{}' (rev {})",
        claims.username, entry.section, entry.revision
    );
    state.dispatcher.publish_config(&entry);

    Ok(Json(entry))
}

/// Section names are URL path segments and feed keys: lowercase ASCII,
/// digits, `-` and `_`.
pub fn validate_section(section: &str) -> Result<(), ApiError> {
    let valid = !section.is_empty()
        && section.len() <= MAX_SECTION_LEN
        && section
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid section name '{}'", section)))
    }
}
