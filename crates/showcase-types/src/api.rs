use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EffectFlags, Layout, MediaKind};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway `Identify`
/// handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub token: String,
}

// -- Site config --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutSectionRequest {
    pub value: serde_json::Value,
}

// -- Homepage --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeroInput {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_kind: MediaKind,
    #[serde(default)]
    pub cta_label: Option<String>,
    #[serde(default)]
    pub cta_href: Option<String>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub effects: EffectFlags,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardInput {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub cta_label: Option<String>,
    #[serde(default)]
    pub cta_href: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub effects: EffectFlags,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub position: i64,
}

/// Card ids in their new display order. Position `i` is assigned to `ids[i]`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorderCardsRequest {
    pub ids: Vec<Uuid>,
}

// -- Store --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductInput {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_currency() -> String {
    "USD".to_string()
}

// -- Community --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowStatus {
    /// Whether the caller follows the target.
    pub following: bool,
    /// Number of users following the target.
    pub followers: u64,
    /// Number of users the target follows.
    pub following_count: u64,
}
