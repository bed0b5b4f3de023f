#![forbid(unsafe_code)]

use super::{StorageEngine, StoreError, meta_get_tx, meta_set_tx, next_counter_tx, now_ms};
use cs_core::model::Project;
use cs_core::validate;
use rusqlite::{Connection, OptionalExtension, params};

const ACTIVE_PROJECT_KEY: &str = "active_project";

impl StorageEngine {
    /// Creates a project after validating name rules and case-insensitive
    /// uniqueness.
    pub fn create_project(&self, name: &str) -> Result<Project, StoreError> {
        let name = name.trim().to_string();
        validate::validate_project_name(&name)?;
        let now = now_ms();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if project_name_taken(&tx, &name, None)? {
                return Err(StoreError::DuplicateProjectName(name.clone()));
            }
            let seq = next_counter_tx(&tx, "project_seq")?;
            let key = format!("prj_{seq:06}");
            tx.execute(
                r#"
                INSERT INTO records(key, type, name, is_default, item_count, created_ms, modified_ms)
                VALUES (?1, 'project', ?2, 0, 0, ?3, ?3)
                "#,
                params![key, name, now],
            )?;
            tx.commit()?;
            Ok(Project {
                key,
                name: name.clone(),
                created_ms: now,
                modified_ms: now,
                is_default: false,
                item_count: 0,
            })
        })
    }

    /// Renames a project; uniqueness excludes the project itself so a
    /// case-only rename of its own name goes through.
    pub fn rename_project(&self, id: &str, new_name: &str) -> Result<(), StoreError> {
        let new_name = new_name.trim().to_string();
        validate::validate_project_name(&new_name)?;
        let now = now_ms();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if project_by_key(&tx, id)?.is_none() {
                return Err(StoreError::UnknownProject(id.to_string()));
            }
            if project_name_taken(&tx, &new_name, Some(id))? {
                return Err(StoreError::DuplicateProjectName(new_name.clone()));
            }
            tx.execute(
                "UPDATE records SET name=?2, modified_ms=?3 WHERE key=?1 AND type='project'",
                params![id, new_name, now],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Deletes a project by cascading over its content first. The default
    /// project and the last remaining project are delete-protected. The
    /// project's session ledger is purged afterwards.
    pub fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(project) = project_by_key(&tx, id)? else {
                return Err(StoreError::UnknownProject(id.to_string()));
            };
            if project.is_default {
                return Err(StoreError::DefaultProjectProtected);
            }
            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM records WHERE type='project'",
                [],
                |row| row.get(0),
            )?;
            if total <= 1 {
                return Err(StoreError::LastProjectProtected);
            }

            let removed_items = tx.execute(
                "DELETE FROM records WHERE type='content' AND project_id=?1",
                params![id],
            )?;
            tx.execute(
                "DELETE FROM records WHERE key=?1 AND type='project'",
                params![id],
            )?;

            if meta_get_tx(&tx, ACTIVE_PROJECT_KEY)?.as_deref() == Some(id) {
                let default_id = default_project_id_tx(&tx)?;
                meta_set_tx(&tx, ACTIVE_PROJECT_KEY, &default_id)?;
            }

            tx.commit()?;
            tracing::debug!(project = id, items = removed_items, "project deleted");
            Ok(())
        })?;

        self.clear_history(id);
        Ok(())
    }

    /// Persists the active-project pointer in durable state. The undo
    /// ledger needs no reload: stacks are keyed by project id.
    pub fn switch_project(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            if !project_exists_tx(conn, id)? {
                return Err(StoreError::UnknownProject(id.to_string()));
            }
            meta_set_tx(conn, ACTIVE_PROJECT_KEY, id)
        })
    }

    /// Reads the active-project pointer, repointing it at the default
    /// project when the pointee no longer exists.
    pub fn active_project(&self) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            if let Some(active) = meta_get_tx(conn, ACTIVE_PROJECT_KEY)? {
                if project_exists_tx(conn, &active)? {
                    return Ok(active);
                }
            }
            let default_id = default_project_id_tx(conn)?;
            meta_set_tx(conn, ACTIVE_PROJECT_KEY, &default_id)?;
            Ok(default_id)
        })
    }

    pub fn default_project_id(&self) -> Result<String, StoreError> {
        self.with_conn(|conn| default_project_id_tx(conn))
    }

    /// Reassigns a content item to another project and stamps it modified.
    /// Recording the move as an update action in the source project's
    /// ledger is the caller's responsibility.
    pub fn move_content(&self, content_id: &str, target_project_id: &str) -> Result<(), StoreError> {
        let now = now_ms();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            if !project_exists_tx(&tx, target_project_id)? {
                return Err(StoreError::UnknownProject(target_project_id.to_string()));
            }
            let touched = tx.execute(
                "UPDATE records SET project_id=?2, modified_ms=?3 WHERE key=?1 AND type='content'",
                params![content_id, target_project_id, now],
            )?;
            if touched == 0 {
                return Err(StoreError::UnknownContent(content_id.to_string()));
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Point lookup with a live `item_count`.
    pub fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.with_conn(|conn| {
            let Some(mut project) = project_by_key(conn, id)? else {
                return Ok(None);
            };
            refresh_item_count(conn, &mut project);
            Ok(Some(project))
        })
    }

    /// All projects, default first, then case-insensitive name order.
    /// `item_count` is recomputed from the live rows on the way out and the
    /// cached column refreshed when it drifted.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, name, created_ms, modified_ms, is_default, item_count
                 FROM records WHERE type='project'",
            )?;
            let rows = stmt.query_map([], project_row)?;
            let mut projects = rows.collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            for project in &mut projects {
                refresh_item_count(conn, project);
            }
            projects.sort_by(|a, b| {
                b.is_default
                    .cmp(&a.is_default)
                    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                    .then_with(|| a.key.cmp(&b.key))
            });
            Ok(projects)
        })
    }
}

// Cache refresh is best effort: a failure downgrades to the stale cached
// value with a warning instead of failing the listing.
fn refresh_item_count(conn: &Connection, project: &mut Project) {
    let counted: Result<i64, rusqlite::Error> = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE type='content' AND project_id=?1",
        params![project.key],
        |row| row.get(0),
    );
    match counted {
        Ok(count) => {
            if count != project.item_count {
                if let Err(err) = conn.execute(
                    "UPDATE records SET item_count=?2 WHERE key=?1 AND type='project'",
                    params![project.key, count],
                ) {
                    tracing::warn!(project = %project.key, error = %err, "item count cache refresh failed");
                }
            }
            project.item_count = count;
        }
        Err(err) => {
            tracing::warn!(project = %project.key, error = %err, "item count recompute failed");
        }
    }
}

fn project_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        key: row.get(0)?,
        name: row.get(1)?,
        created_ms: row.get(2)?,
        modified_ms: row.get(3)?,
        is_default: row.get::<_, i64>(4)? != 0,
        item_count: row.get(5)?,
    })
}

fn project_by_key(conn: &Connection, key: &str) -> Result<Option<Project>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT key, name, created_ms, modified_ms, is_default, item_count
             FROM records WHERE key=?1 AND type='project'",
            params![key],
            project_row,
        )
        .optional()?)
}

fn project_name_taken(
    conn: &Connection,
    name: &str,
    exclude_key: Option<&str>,
) -> Result<bool, StoreError> {
    let taken = conn
        .query_row(
            r#"
            SELECT 1 FROM records
            WHERE type='project' AND lower(name)=lower(?1) AND (?2 IS NULL OR key<>?2)
            LIMIT 1
            "#,
            params![name, exclude_key],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(taken)
}

pub(super) fn project_exists_tx(conn: &Connection, key: &str) -> Result<bool, StoreError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM records WHERE key=?1 AND type='project'",
            params![key],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

/// The default project is created by the partitioning migration; a store
/// without one is corrupt.
pub(super) fn default_project_id_tx(conn: &Connection) -> Result<String, StoreError> {
    let key: Option<String> = conn
        .query_row(
            "SELECT key FROM records WHERE type='project' AND is_default=1 LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    key.ok_or(StoreError::Corrupt("default project missing after migration"))
}
