use anyhow::Result;
use forgebot::db::{ensure_user, get_preference, init_database_schema, set_preference, UserField};
use rusqlite::Connection;
use tempfile::NamedTempFile;

fn setup_test_db() -> Result<(Connection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let conn = Connection::open(temp_file.path())?;
    init_database_schema(&conn)?;
    Ok((conn, temp_file))
}

/// Schema creation must be idempotent: reopening an existing database
/// and initializing again must not fail or drop data.
#[test]
fn test_schema_init_is_idempotent() -> Result<()> {
    let (conn, temp_file) = setup_test_db()?;

    ensure_user(&conn, 12345, Some("smith"), Some("John"))?;
    set_preference(&conn, 12345, UserField::Model, "flux-3d")?;
    drop(conn);

    let conn = Connection::open(temp_file.path())?;
    init_database_schema(&conn)?;

    assert_eq!(get_preference(&conn, 12345, UserField::Model)?, "flux-3d");

    Ok(())
}

/// Full preference lifecycle of a single user, the way a chat session
/// drives it: first contact, default read, selection, repeat contact.
#[test]
fn test_preference_lifecycle() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    // First contact creates the row with the default model.
    ensure_user(&conn, 12345, Some("smith"), Some("John"))?;
    assert_eq!(get_preference(&conn, 12345, UserField::Model)?, "flux");

    // Picking a model sticks.
    set_preference(&conn, 12345, UserField::Model, "stability-ai")?;
    assert_eq!(
        get_preference(&conn, 12345, UserField::Model)?,
        "stability-ai"
    );

    // Later contacts never reset the selection or the identity fields.
    ensure_user(&conn, 12345, Some("other"), Some("Jane"))?;
    assert_eq!(
        get_preference(&conn, 12345, UserField::Model)?,
        "stability-ai"
    );

    Ok(())
}

/// Interleaved writes for two users must never cross: each user's model
/// field only reflects their own updates.
#[test]
fn test_interleaved_users_do_not_cross_write() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    ensure_user(&conn, 111, Some("first"), None)?;
    ensure_user(&conn, 222, Some("second"), None)?;

    set_preference(&conn, 111, UserField::Model, "flux-pro")?;
    set_preference(&conn, 222, UserField::Model, "Pixart")?;
    set_preference(&conn, 111, UserField::Model, "flux-realism")?;

    assert_eq!(get_preference(&conn, 111, UserField::Model)?, "flux-realism");
    assert_eq!(get_preference(&conn, 222, UserField::Model)?, "Pixart");

    Ok(())
}
