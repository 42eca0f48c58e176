mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use showcase_api::{AppState, AppStateInner};
use showcase_gateway::Dispatcher;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showcase=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr()?;

    let db = showcase_db::Database::open(&config.db_path)?;
    info!("Database ready at {}", config.db_path.display());

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        dispatcher: Dispatcher::new(),
        admins: config.admins,
    });

    let app = showcase_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Showcase server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
