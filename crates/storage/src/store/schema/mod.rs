#![forbid(unsafe_code)]

mod migrations;
mod sql;

use super::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

/// Current on-disk schema generation. Data written by any older generation
/// is upgraded in place on first open.
pub const SCHEMA_VERSION: i64 = 3;

/// Well-known key of the delete-protected default project, created once by
/// the migration that introduced project partitioning.
pub const DEFAULT_PROJECT_ID: &str = "prj_default";
pub const DEFAULT_PROJECT_NAME: &str = "Default";

/// Opens the database file and brings its schema to [`SCHEMA_VERSION`].
/// Invoked only from the connection manager's open path.
pub(in crate::store) fn open_with_migrations(db_path: &Path) -> Result<Connection, StoreError> {
    let mut conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(sql::PRAGMAS)?;
    migrate(&mut conn)?;
    Ok(conn)
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql::META)?;

    let current = schema_version_tx(&tx)?;
    if current < SCHEMA_VERSION {
        migrations::apply(&tx, current)?;
        tx.execute(
            r#"
            INSERT INTO meta(key, value) VALUES ('schema_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
            params![SCHEMA_VERSION.to_string()],
        )?;
        tracing::debug!(from = current, to = SCHEMA_VERSION, "schema migrated");
    }

    // A failed step aborts here and the version marker stays behind it.
    tx.commit()?;
    Ok(())
}

fn schema_version_tx(conn: &Connection) -> Result<i64, StoreError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|value| value.parse().ok()).unwrap_or(0))
}
