use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, site config, follows)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                display_name  TEXT,
                is_admin      INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE site_config (
                section     TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                revision    INTEGER NOT NULL DEFAULT 1,
                updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_by  TEXT REFERENCES users(id)
            );

            CREATE TABLE follows (
                follower_id  TEXT NOT NULL REFERENCES users(id),
                followee_id  TEXT NOT NULL REFERENCES users(id),
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (follower_id, followee_id),
                CHECK (follower_id != followee_id)
            );

            CREATE INDEX idx_follows_followee ON follows(followee_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (homepage and store content)");
        conn.execute_batch(
            "
            CREATE TABLE heroes (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                subtitle    TEXT,
                media_url   TEXT,
                media_kind  TEXT NOT NULL DEFAULT 'image',
                cta_label   TEXT,
                cta_href    TEXT,
                layout      TEXT NOT NULL DEFAULT 'center',
                effects     TEXT NOT NULL DEFAULT '{}',
                is_active   INTEGER NOT NULL DEFAULT 0,
                sort_order  INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE homepage_cards (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                body          TEXT,
                media_url     TEXT,
                cta_label     TEXT,
                cta_href      TEXT,
                badge         TEXT,
                effects       TEXT NOT NULL DEFAULT '{}',
                is_published  INTEGER NOT NULL DEFAULT 0,
                position      INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_cards_position ON homepage_cards(position);

            CREATE TABLE products (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                slug          TEXT NOT NULL UNIQUE,
                description   TEXT,
                price_cents   INTEGER NOT NULL,
                currency      TEXT NOT NULL DEFAULT 'USD',
                image_url     TEXT,
                stock         INTEGER NOT NULL DEFAULT 0,
                is_published  INTEGER NOT NULL DEFAULT 0,
                sort_order    INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
