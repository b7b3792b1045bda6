use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// Default image-generation model assigned to users who never picked one.
pub const DEFAULT_MODEL: &str = "flux";

/// The closed set of per-user preference fields that can be updated.
///
/// Keeping this an enum (instead of accepting an arbitrary column name)
/// means every UPDATE statement is a fixed string and the storage layer
/// never interpolates identifiers into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    /// The selected image-generation backend.
    Model,
}

impl UserField {
    /// Value returned by [`get_preference`] when no row exists for the user.
    pub fn default_value(self) -> &'static str {
        match self {
            UserField::Model => DEFAULT_MODEL,
        }
    }
}

/// Initialize the database schema
pub fn init_database_schema(conn: &Connection) -> Result<()> {
    info!("Initializing database schema...");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            user_name TEXT,
            name TEXT,
            model TEXT NOT NULL DEFAULT 'flux'
        )",
        [],
    )
    .context("Failed to create users table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert a row for the user if one does not exist yet.
///
/// Idempotent: repeated calls for the same id never overwrite the
/// `user_name`, `name` or `model` stored at first contact.
pub fn ensure_user(
    conn: &Connection,
    user_id: i64,
    username: Option<&str>,
    name: Option<&str>,
) -> Result<()> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO users (id, user_name, name) VALUES (?1, ?2, ?3)",
            params![user_id, username, name],
        )
        .context("Failed to ensure user row")?;

    if inserted > 0 {
        info!(user_id, "Created user row on first contact");
    } else {
        debug!(user_id, "User row already present");
    }

    Ok(())
}

/// Overwrite a single preference field for the row matching `user_id`.
///
/// Updating a missing row is a no-op; callers run [`ensure_user`] first.
pub fn set_preference(
    conn: &Connection,
    user_id: i64,
    field: UserField,
    value: &str,
) -> Result<()> {
    let updated = match field {
        UserField::Model => conn
            .execute(
                "UPDATE users SET model = ?1 WHERE id = ?2",
                params![value, user_id],
            )
            .context("Failed to update model preference")?,
    };

    debug!(user_id, ?field, value, rows = updated, "Preference updated");
    Ok(())
}

/// Read a preference field for `user_id`.
///
/// Returns the field's documented default when no row exists; never
/// creates a row.
pub fn get_preference(conn: &Connection, user_id: i64, field: UserField) -> Result<String> {
    let value: Option<String> = match field {
        UserField::Model => conn
            .query_row(
                "SELECT model FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read model preference")?,
    };

    Ok(value.unwrap_or_else(|| field.default_value().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn setup_test_db() -> Result<(Connection, NamedTempFile)> {
        let temp_file = NamedTempFile::new()?;
        let conn = Connection::open(temp_file.path())?;
        init_database_schema(&conn)?;
        Ok((conn, temp_file))
    }

    fn count_users(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    #[test]
    fn test_ensure_user_creates_row() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 12345, Some("smith"), Some("John"))?;

        assert_eq!(count_users(&conn)?, 1);

        let (user_name, name): (Option<String>, Option<String>) = conn.query_row(
            "SELECT user_name, name FROM users WHERE id = ?1",
            params![12345],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!(user_name.as_deref(), Some("smith"));
        assert_eq!(name.as_deref(), Some("John"));

        Ok(())
    }

    #[test]
    fn test_ensure_user_is_idempotent() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 12345, Some("smith"), Some("John"))?;
        ensure_user(&conn, 12345, Some("renamed"), Some("Johnny"))?;

        // Exactly one row, and the first-contact values survive.
        assert_eq!(count_users(&conn)?, 1);

        let user_name: Option<String> = conn.query_row(
            "SELECT user_name FROM users WHERE id = ?1",
            params![12345],
            |row| row.get(0),
        )?;
        assert_eq!(user_name.as_deref(), Some("smith"));

        Ok(())
    }

    #[test]
    fn test_ensure_user_keeps_model_choice() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 12345, Some("smith"), Some("John"))?;
        set_preference(&conn, 12345, UserField::Model, "flux-pro")?;
        ensure_user(&conn, 12345, Some("smith"), Some("John"))?;

        assert_eq!(get_preference(&conn, 12345, UserField::Model)?, "flux-pro");

        Ok(())
    }

    #[test]
    fn test_ensure_user_without_username() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 12345, None, None)?;

        assert_eq!(count_users(&conn)?, 1);
        assert_eq!(get_preference(&conn, 12345, UserField::Model)?, "flux");

        Ok(())
    }

    #[test]
    fn test_get_preference_unknown_user_returns_default() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        let model = get_preference(&conn, 99999, UserField::Model)?;

        assert_eq!(model, "flux");
        // The lookup must not create a row as a side effect.
        assert_eq!(count_users(&conn)?, 0);

        Ok(())
    }

    #[test]
    fn test_set_and_get_preference_round_trip() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 12345, Some("smith"), Some("John"))?;
        set_preference(&conn, 12345, UserField::Model, "flux-pro")?;

        assert_eq!(get_preference(&conn, 12345, UserField::Model)?, "flux-pro");

        Ok(())
    }

    #[test]
    fn test_set_preference_missing_row_is_noop() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        set_preference(&conn, 99999, UserField::Model, "flux-pro")?;

        assert_eq!(count_users(&conn)?, 0);
        assert_eq!(get_preference(&conn, 99999, UserField::Model)?, "flux");

        Ok(())
    }

    #[test]
    fn test_preferences_are_isolated_per_user() -> Result<()> {
        let (conn, _temp_file) = setup_test_db()?;

        ensure_user(&conn, 111, Some("first"), None)?;
        ensure_user(&conn, 222, Some("second"), None)?;

        set_preference(&conn, 111, UserField::Model, "flux-realism")?;
        set_preference(&conn, 222, UserField::Model, "Prodia")?;

        assert_eq!(get_preference(&conn, 111, UserField::Model)?, "flux-realism");
        assert_eq!(get_preference(&conn, 222, UserField::Model)?, "Prodia");

        Ok(())
    }
}
