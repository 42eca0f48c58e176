//! HTTP API for the showcase site: auth, site configuration sections,
//! homepage and store content, and community follows.

pub mod auth;
pub mod error;
pub mod follows;
pub mod homepage;
pub mod middleware;
pub mod site_config;
pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use showcase_db::Database;
use showcase_gateway::{Dispatcher, connection};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    /// Usernames that become admins when they register.
    pub admins: HashSet<String>,
}

/// Build the full router: public, member, admin routes and the gateway.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/config/{section}", get(site_config::get_section))
        .route("/homepage/hero", get(homepage::public_heroes))
        .route("/homepage/cards", get(homepage::public_cards))
        .route("/store/products", get(store::public_products))
        .route("/store/products/{slug}", get(store::public_product))
        .route("/gateway", get(gateway_upgrade));

    let member_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route(
            "/users/{user_id}/follow",
            get(follows::follow_status)
                .put(follows::follow)
                .delete(follows::unfollow),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let admin_routes = Router::new()
        .route("/admin/config", get(site_config::list_sections))
        .route("/admin/config/{section}", put(site_config::put_section))
        .route(
            "/admin/heroes",
            get(homepage::admin_heroes).post(homepage::create_hero),
        )
        .route("/admin/heroes/{id}", put(homepage::update_hero))
        .route(
            "/admin/cards",
            get(homepage::admin_cards).post(homepage::create_card),
        )
        .route("/admin/cards/order", put(homepage::reorder_cards))
        .route("/admin/cards/{id}", put(homepage::update_card))
        .route(
            "/admin/products",
            get(store::admin_products).post(store::create_product),
        )
        .route("/admin/products/{id}", put(store::update_product))
        .layer(from_fn(middleware::require_admin))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "feed_receivers": state.dispatcher.receiver_count(),
    }))
}

async fn gateway_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::from)
}

/// Reject blank required text fields.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}
