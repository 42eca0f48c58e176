//! Homepage and store content edited from the admin panel.

use anyhow::Result;
use rusqlite::Row;

use showcase_types::api::{CardInput, HeroInput, ProductInput};

use crate::Database;
use crate::models::{CardRow, HeroRow, ProductRow};
use crate::queries::OptionalExt;

const HERO_COLUMNS: &str = "id, title, subtitle, media_url, media_kind, cta_label, cta_href, layout, effects, is_active, sort_order, created_at, updated_at";
const CARD_COLUMNS: &str = "id, title, body, media_url, cta_label, cta_href, badge, effects, is_published, position, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, slug, description, price_cents, currency, image_url, stock, is_published, sort_order, created_at, updated_at";

impl Database {
    // -- Heroes --

    pub fn insert_hero(&self, id: &str, input: &HeroInput) -> Result<HeroRow> {
        let effects = serde_json::to_string(&input.effects)?;
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO heroes (id, title, subtitle, media_url, media_kind, cta_label, cta_href, layout, effects, is_active, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING {}",
                HERO_COLUMNS
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.title,
                    input.subtitle,
                    input.media_url,
                    input.media_kind.as_str(),
                    input.cta_label,
                    input.cta_href,
                    input.layout.as_str(),
                    effects,
                    input.is_active,
                    input.sort_order,
                ],
                map_hero_row,
            )?;
            Ok(row)
        })
    }

    /// Replace every editable field. Returns None when the hero does not exist.
    pub fn update_hero(&self, id: &str, input: &HeroInput) -> Result<Option<HeroRow>> {
        let effects = serde_json::to_string(&input.effects)?;
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE heroes SET
                    title = ?2, subtitle = ?3, media_url = ?4, media_kind = ?5, cta_label = ?6,
                    cta_href = ?7, layout = ?8, effects = ?9, is_active = ?10, sort_order = ?11,
                    updated_at = datetime('now')
                 WHERE id = ?1
                 RETURNING {}",
                HERO_COLUMNS
            );
            conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.title,
                    input.subtitle,
                    input.media_url,
                    input.media_kind.as_str(),
                    input.cta_label,
                    input.cta_href,
                    input.layout.as_str(),
                    effects,
                    input.is_active,
                    input.sort_order,
                ],
                map_hero_row,
            )
            .optional()
        })
    }

    pub fn list_heroes(&self, active_only: bool) -> Result<Vec<HeroRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM heroes WHERE (?1 = 0 OR is_active = 1) ORDER BY sort_order, created_at",
                HERO_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([active_only], map_hero_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Homepage cards --

    pub fn insert_card(&self, id: &str, input: &CardInput) -> Result<CardRow> {
        let effects = serde_json::to_string(&input.effects)?;
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO homepage_cards (id, title, body, media_url, cta_label, cta_href, badge, effects, is_published, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 RETURNING {}",
                CARD_COLUMNS
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.title,
                    input.body,
                    input.media_url,
                    input.cta_label,
                    input.cta_href,
                    input.badge,
                    effects,
                    input.is_published,
                    input.position,
                ],
                map_card_row,
            )?;
            Ok(row)
        })
    }

    pub fn update_card(&self, id: &str, input: &CardInput) -> Result<Option<CardRow>> {
        let effects = serde_json::to_string(&input.effects)?;
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE homepage_cards SET
                    title = ?2, body = ?3, media_url = ?4, cta_label = ?5, cta_href = ?6,
                    badge = ?7, effects = ?8, is_published = ?9, position = ?10,
                    updated_at = datetime('now')
                 WHERE id = ?1
                 RETURNING {}",
                CARD_COLUMNS
            );
            conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.title,
                    input.body,
                    input.media_url,
                    input.cta_label,
                    input.cta_href,
                    input.badge,
                    effects,
                    input.is_published,
                    input.position,
                ],
                map_card_row,
            )
            .optional()
        })
    }

    pub fn list_cards(&self, published_only: bool) -> Result<Vec<CardRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM homepage_cards WHERE (?1 = 0 OR is_published = 1) ORDER BY position, created_at",
                CARD_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([published_only], map_card_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Assign positions 0..n in the given order inside one transaction.
    /// Returns how many of the ids matched a card; nothing is committed
    /// unless all of them did.
    pub fn reorder_cards(&self, ids: &[String]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut moved = 0;
            for (position, id) in ids.iter().enumerate() {
                moved += tx.execute(
                    "UPDATE homepage_cards SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
                    rusqlite::params![position as i64, id],
                )?;
            }
            if moved == ids.len() {
                tx.commit()?;
            }
            Ok(moved)
        })
    }

    // -- Products --

    pub fn insert_product(&self, id: &str, slug: &str, input: &ProductInput) -> Result<ProductRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO products (id, name, slug, description, price_cents, currency, image_url, stock, is_published, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 RETURNING {}",
                PRODUCT_COLUMNS
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.name,
                    slug,
                    input.description,
                    input.price_cents,
                    input.currency,
                    input.image_url,
                    input.stock,
                    input.is_published,
                    input.sort_order,
                ],
                map_product_row,
            )?;
            Ok(row)
        })
    }

    pub fn update_product(&self, id: &str, slug: &str, input: &ProductInput) -> Result<Option<ProductRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE products SET
                    name = ?2, slug = ?3, description = ?4, price_cents = ?5, currency = ?6,
                    image_url = ?7, stock = ?8, is_published = ?9, sort_order = ?10,
                    updated_at = datetime('now')
                 WHERE id = ?1
                 RETURNING {}",
                PRODUCT_COLUMNS
            );
            conn.query_row(
                &sql,
                rusqlite::params![
                    id,
                    input.name,
                    slug,
                    input.description,
                    input.price_cents,
                    input.currency,
                    input.image_url,
                    input.stock,
                    input.is_published,
                    input.sort_order,
                ],
                map_product_row,
            )
            .optional()
        })
    }

    pub fn list_products(&self, published_only: bool) -> Result<Vec<ProductRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM products WHERE (?1 = 0 OR is_published = 1) ORDER BY sort_order, name",
                PRODUCT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([published_only], map_product_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_product_by_slug(&self, slug: &str, published_only: bool) -> Result<Option<ProductRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM products WHERE slug = ?1 AND (?2 = 0 OR is_published = 1)",
                PRODUCT_COLUMNS
            );
            conn.query_row(&sql, rusqlite::params![slug, published_only], map_product_row)
                .optional()
        })
    }
}

fn map_hero_row(row: &Row<'_>) -> rusqlite::Result<HeroRow> {
    Ok(HeroRow {
        id: row.get(0)?,
        title: row.get(1)?,
        subtitle: row.get(2)?,
        media_url: row.get(3)?,
        media_kind: row.get(4)?,
        cta_label: row.get(5)?,
        cta_href: row.get(6)?,
        layout: row.get(7)?,
        effects: row.get(8)?,
        is_active: row.get(9)?,
        sort_order: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_card_row(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        media_url: row.get(3)?,
        cta_label: row.get(4)?,
        cta_href: row.get(5)?,
        badge: row.get(6)?,
        effects: row.get(7)?,
        is_published: row.get(8)?,
        position: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        price_cents: row.get(4)?,
        currency: row.get(5)?,
        image_url: row.get(6)?,
        stock: row.get(7)?,
        is_published: row.get(8)?,
        sort_order: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
