use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use showcase_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::{AppState, run_db};

const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::BadRequest("username must be 3-32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let is_admin = state.admins.contains(&req.username);

    let username = req.username.clone();
    let display_name = req.display_name.clone();
    run_db(&state, move |db| {
        db.create_user(
            &user_id.to_string(),
            &username,
            &password_hash,
            display_name.as_deref(),
            is_admin,
        )
    })
    .await
    .map_err(|e| e.conflict_on_constraint("username already taken"))?;

    info!("registered {} ({}), admin={}", req.username, user_id, is_admin);

    let token = create_token(&state.jwt_secret, user_id, &req.username, is_admin)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username: req.username,
            is_admin,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username, user.is_admin)?;

    Ok(Json(AuthResponse {
        user_id,
        username: user.username,
        is_admin: user.is_admin,
        token,
    }))
}

/// The signed-in user's profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user.into_model()))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    is_admin: bool,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
