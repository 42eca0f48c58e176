use crate::Database;
use crate::models::{SiteConfigRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, password, display_name, is_admin, created_at";
const CONFIG_COLUMNS: &str = "section, value, revision, updated_at, updated_by";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: Option<&str>,
        is_admin: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, display_name, is_admin) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, username, password_hash, display_name, is_admin],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Site config --

    pub fn get_section(&self, section: &str) -> Result<Option<SiteConfigRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM site_config WHERE section = ?1", CONFIG_COLUMNS);
            conn.query_row(&sql, [section], map_config_row).optional()
        })
    }

    pub fn list_sections(&self) -> Result<Vec<SiteConfigRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM site_config ORDER BY section", CONFIG_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_config_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Store a section value. The first write gets revision 1 and every later
    /// write bumps it by one. Returns the stored row.
    pub fn put_section(
        &self,
        section: &str,
        value_json: &str,
        updated_by: Option<&str>,
    ) -> Result<SiteConfigRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO site_config (section, value, updated_by) VALUES (?1, ?2, ?3)
                 ON CONFLICT(section) DO UPDATE SET
                    value = excluded.value,
                    revision = site_config.revision + 1,
                    updated_at = datetime('now'),
                    updated_by = excluded.updated_by
                 RETURNING {}",
                CONFIG_COLUMNS
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![section, value_json, updated_by],
                map_config_row,
            )?;
            Ok(row)
        })
    }

    // -- Follows --

    /// Create the edge. Returns false when it already existed.
    pub fn create_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                (follower_id, followee_id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove the edge. Returns false when there was nothing to remove.
    pub fn remove_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
                (follower_id, followee_id),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Returns (followers, following) counts for a user.
    pub fn follow_counts(&self, user_id: &str) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let counts: (i64, i64) = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok((counts.0.max(0) as u64, counts.1.max(0) as u64))
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            display_name: row.get(3)?,
            is_admin: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn map_config_row(row: &Row<'_>) -> rusqlite::Result<SiteConfigRow> {
    Ok(SiteConfigRow {
        section: row.get(0)?,
        value: row.get(1)?,
        revision: row.get(2)?,
        updated_at: row.get(3)?,
        updated_by: row.get(4)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_users(names: &[&str]) -> (Database, Vec<String>) {
        let db = Database::open_in_memory().unwrap();
        let ids = names
            .iter()
            .map(|name| {
                let id = Uuid::new_v4().to_string();
                db.create_user(&id, name, "hash", None, false).unwrap();
                id
            })
            .collect();
        (db, ids)
    }

    #[test]
    fn missing_section_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_section("hero").unwrap().is_none());
    }

    #[test]
    fn put_section_bumps_revision() {
        let db = Database::open_in_memory().unwrap();

        let first = db.put_section("hero", r#"{"title":"One"}"#, None).unwrap();
        assert_eq!(first.revision, 1);

        let second = db.put_section("hero", r#"{"title":"Two"}"#, None).unwrap();
        assert_eq!(second.revision, 2);

        let stored = db.get_section("hero").unwrap().unwrap();
        assert_eq!(stored.revision, 2);
        assert_eq!(stored.value, r#"{"title":"Two"}"#);

        // Other sections keep their own counter
        let other = db.put_section("footer", "{}", None).unwrap();
        assert_eq!(other.revision, 1);
        assert_eq!(db.list_sections().unwrap().len(), 2);
    }

    #[test]
    fn user_lookup() {
        let (db, ids) = db_with_users(&["alice"]);
        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, ids[0]);
        assert!(!by_name.is_admin);
        assert!(db.get_user_by_id(&ids[0]).unwrap().is_some());
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_constraint_violation() {
        let (db, _) = db_with_users(&["alice"]);
        let err = db
            .create_user(&Uuid::new_v4().to_string(), "alice", "hash", None, false)
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn follow_edges_are_idempotent() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (alice, bob) = (&ids[0], &ids[1]);

        assert!(db.create_follow(alice, bob).unwrap());
        assert!(!db.create_follow(alice, bob).unwrap());
        assert!(db.is_following(alice, bob).unwrap());
        assert!(!db.is_following(bob, alice).unwrap());
        assert_eq!(db.follow_counts(bob).unwrap(), (1, 0));
        assert_eq!(db.follow_counts(alice).unwrap(), (0, 1));

        assert!(db.remove_follow(alice, bob).unwrap());
        assert!(!db.remove_follow(alice, bob).unwrap());
        assert!(!db.is_following(alice, bob).unwrap());
    }

    #[test]
    fn self_follow_is_never_stored() {
        // OR IGNORE swallows the CHECK violation
        let (db, ids) = db_with_users(&["alice"]);
        assert!(!db.create_follow(&ids[0], &ids[0]).unwrap());
        assert!(!db.is_following(&ids[0], &ids[0]).unwrap());
    }

    #[test]
    fn follow_unknown_user_fails() {
        let (db, ids) = db_with_users(&["alice"]);
        let err = db
            .create_follow(&ids[0], &Uuid::new_v4().to_string())
            .unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }
}
