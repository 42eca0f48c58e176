use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// One named configuration section as stored by the backend.
///
/// `revision` is bumped by the store on every write, so consumers can tell
/// an older read apart from a newer push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfigEntry {
    pub section: String,
    pub value: serde_json::Value,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
    /// A 3D model rendered by the front-end viewer.
    Model,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "model" => Some(Self::Model),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Left,
    #[default]
    Center,
    Right,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Visual effects the front-end layers over a hero or card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectFlags {
    pub particles: bool,
    pub crystal: bool,
    pub scroll_indicator: bool,
    pub counters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroConfig {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: MediaKind,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub layout: Layout,
    pub effects: EffectFlags,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageCard {
    pub id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub badge: Option<String>,
    pub effects: EffectFlags,
    pub is_published: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub image_url: Option<String>,
    pub stock: i64,
    pub is_published: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Directional edge: `follower_id` follows `followee_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
}
