//! Database row types. These map directly to SQLite rows; `into_model`
//! converts them to the API models in showcase-types.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use showcase_types::models::{
    EffectFlags, HeroConfig, HomepageCard, Layout, MediaKind, Product, SiteConfigEntry, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct SiteConfigRow {
    pub section: String,
    pub value: String,
    pub revision: i64,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

pub struct HeroRow {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub media_url: Option<String>,
    pub media_kind: String,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub layout: String,
    pub effects: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CardRow {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub media_url: Option<String>,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub badge: Option<String>,
    pub effects: String,
    pub is_published: bool,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub image_url: Option<String>,
    pub stock: i64,
    pub is_published: bool,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn into_model(self) -> User {
        User {
            id: parse_id(&self.id, "user"),
            created_at: parse_timestamp(&self.created_at),
            username: self.username,
            display_name: self.display_name,
            is_admin: self.is_admin,
        }
    }
}

impl SiteConfigRow {
    pub fn into_model(self) -> SiteConfigEntry {
        let value = serde_json::from_str(&self.value).unwrap_or_else(|e| {
            warn!("Corrupt value for section '{}': {}", self.section, e);
            serde_json::Value::Null
        });
        SiteConfigEntry {
            value,
            revision: self.revision.max(0) as u64,
            updated_at: parse_timestamp(&self.updated_at),
            updated_by: self.updated_by.as_deref().map(|id| parse_id(id, "updated_by")),
            section: self.section,
        }
    }
}

impl HeroRow {
    pub fn into_model(self) -> HeroConfig {
        HeroConfig {
            id: parse_id(&self.id, "hero"),
            media_kind: MediaKind::parse(&self.media_kind).unwrap_or_default(),
            layout: Layout::parse(&self.layout).unwrap_or_default(),
            effects: parse_effects(&self.effects),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            title: self.title,
            subtitle: self.subtitle,
            media_url: self.media_url,
            cta_label: self.cta_label,
            cta_href: self.cta_href,
            is_active: self.is_active,
            sort_order: self.sort_order,
        }
    }
}

impl CardRow {
    pub fn into_model(self) -> HomepageCard {
        HomepageCard {
            id: parse_id(&self.id, "card"),
            effects: parse_effects(&self.effects),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            title: self.title,
            body: self.body,
            media_url: self.media_url,
            cta_label: self.cta_label,
            cta_href: self.cta_href,
            badge: self.badge,
            is_published: self.is_published,
            position: self.position,
        }
    }
}

impl ProductRow {
    pub fn into_model(self) -> Product {
        Product {
            id: parse_id(&self.id, "product"),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            name: self.name,
            slug: self.slug,
            description: self.description,
            price_cents: self.price_cents,
            currency: self.currency,
            image_url: self.image_url,
            stock: self.stock,
            is_published: self.is_published,
            sort_order: self.sort_order,
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_effects(raw: &str) -> EffectFlags {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt effects column '{}': {}", raw, e);
        EffectFlags::default()
    })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
