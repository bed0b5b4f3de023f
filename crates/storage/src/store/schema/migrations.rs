#![forbid(unsafe_code)]

use super::sql;
use super::{DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME};
use crate::store::StoreError;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

/// Applies every migration step newer than `from`, in version order. Steps
/// are strictly additive and individually idempotent, so a partially-applied
/// prior run can be replayed without damage.
pub(super) fn apply(tx: &Transaction<'_>, from: i64) -> Result<(), StoreError> {
    if from < 1 {
        drop_legacy_media(tx)?;
    }
    if from < 2 {
        create_unified_records(tx)?;
    }
    if from < 3 {
        introduce_projects(tx)?;
    }
    Ok(())
}

// v1: the standalone media table is subsumed by media embedded in content
// rows; nothing in it is worth carrying over.
fn drop_legacy_media(tx: &Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch("DROP TABLE IF EXISTS media_entries;")?;
    Ok(())
}

// v2: the unified record collection with its derived indexes.
fn create_unified_records(tx: &Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch(sql::RECORDS)?;
    Ok(())
}

// v3: project partitioning. Adds the lookup column and index, seeds the
// default project and the active-project pointer, then backfills every
// content row that predates partitioning.
fn introduce_projects(tx: &Transaction<'_>) -> Result<(), StoreError> {
    add_column_if_missing(tx, "records", "project_id", "TEXT")?;
    tx.execute_batch(sql::PROJECT_INDEX)?;

    let has_default = tx
        .query_row(
            "SELECT 1 FROM records WHERE type='project' AND is_default=1 LIMIT 1",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_default {
        let now_ms = crate::store::now_ms();
        tx.execute(
            r#"
            INSERT OR IGNORE INTO records(key, type, name, is_default, item_count, created_ms, modified_ms)
            VALUES (?1, 'project', ?2, 1, 0, ?3, ?3)
            "#,
            params![DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME, now_ms],
        )?;
    }

    tx.execute(
        "UPDATE records SET project_id=?1 WHERE type='content' AND (project_id IS NULL OR project_id='')",
        params![DEFAULT_PROJECT_ID],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES ('active_project', ?1)",
        params![DEFAULT_PROJECT_ID],
    )?;
    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), StoreError> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(()),
        Err(err) if is_duplicate_column(&err) => Ok(()),
        Err(err) => Err(StoreError::Sql(err)),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("duplicate column name")
        }
        _ => false,
    }
}
