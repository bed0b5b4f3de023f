#![forbid(unsafe_code)]

use super::projects::{default_project_id_tx, project_exists_tx};
use super::{OrderUpdate, SaveContentRequest, StorageEngine, StoreError, next_counter_tx, now_ms};
use cs_core::model::{ContentItem, MediaEntry, RecordKind};
use cs_core::{ordering, validate};
use rusqlite::{Connection, OptionalExtension, params};

impl StorageEngine {
    /// Upserts a content item. A missing `id` generates a fresh key; an
    /// unknown explicit `id` inserts under that key. Links are filtered,
    /// media normalized and validated, `modified_ms` stamped. `created_ms`
    /// is immutable once the item exists.
    pub fn save_content(
        &self,
        id: Option<&str>,
        request: SaveContentRequest,
    ) -> Result<ContentItem, StoreError> {
        let media = normalize_media(request.media)?;
        let links = validate::filter_links(&request.links);
        let now = now_ms();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let existing = match id {
                Some(id) => content_by_key(&tx, id)?,
                None => None,
            };

            let project_id = match &request.project_id {
                Some(project_id) => {
                    if !project_exists_tx(&tx, project_id)? {
                        return Err(StoreError::UnknownProject(project_id.clone()));
                    }
                    project_id.clone()
                }
                // Edits keep their partition; fresh items land in the
                // default project.
                None => match &existing {
                    Some(existing) => existing.project_id.clone(),
                    None => default_project_id_tx(&tx)?,
                },
            };

            let (key, created_ms) = match (&existing, id) {
                (Some(existing), _) => (existing.key.clone(), existing.created_ms),
                (None, Some(id)) => (id.to_string(), request.created_ms.unwrap_or(now)),
                (None, None) => {
                    let seq = next_counter_tx(&tx, "content_seq")?;
                    (format!("itm_{seq:06}"), request.created_ms.unwrap_or(now))
                }
            };

            let item = ContentItem {
                key,
                text: request.text,
                links,
                media,
                project_id,
                content_type: request.content_type,
                order: request.order,
                created_ms,
                modified_ms: now,
            };
            put_content(&tx, &item)?;
            tx.commit()?;
            Ok(item)
        })
    }

    pub fn get_content(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        self.with_conn(|conn| content_by_key(conn, id))
    }

    /// All content items, or one project's, in listing order (manual order
    /// first, then most-recently-modified).
    pub fn list_content(&self, project: Option<&str>) -> Result<Vec<ContentItem>, StoreError> {
        let mut items = self.with_conn(|conn| match project {
            Some(project_id) => query_content(
                conn,
                "SELECT key, text, links_json, media_json, project_id, content_type, ord, created_ms, modified_ms
                 FROM records WHERE type='content' AND project_id=?1",
                params![project_id],
            ),
            None => query_content(
                conn,
                "SELECT key, text, links_json, media_json, project_id, content_type, ord, created_ms, modified_ms
                 FROM records WHERE type='content'",
                params![],
            ),
        })?;
        items.sort_by(ordering::listing_order);
        Ok(items)
    }

    /// Applies a manual reorder batch. Entries whose key no longer exists
    /// are skipped, not an error; returns how many rows were touched.
    pub fn update_order(&self, batch: &[OrderUpdate]) -> Result<usize, StoreError> {
        let now = now_ms();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut applied = 0usize;
            for update in batch {
                let touched = tx.execute(
                    "UPDATE records SET ord=?2, modified_ms=?3 WHERE key=?1 AND type='content'",
                    params![update.key, update.order, now],
                )?;
                if touched == 0 {
                    tracing::warn!(key = %update.key, "order update skipped, record vanished");
                } else {
                    applied += 1;
                }
            }
            tx.commit()?;
            Ok(applied)
        })
    }

    /// Removes the item and, with it, every embedded media entry in one
    /// atomic row delete.
    pub fn delete_content(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM records WHERE key=?1 AND type='content'",
                params![id],
            )?;
            if deleted == 0 {
                return Err(StoreError::UnknownContent(id.to_string()));
            }
            Ok(())
        })
    }

    /// Writes a snapshot back verbatim: key, timestamps and partition are
    /// preserved, no re-validation or re-stamping. Undo/redo only.
    pub(super) fn restore_item(&self, item: &ContentItem) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            put_content(&tx, item)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Row delete that tolerates an already-missing key, for inverse
    /// application where the end state is what matters.
    pub(super) fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM records WHERE key=?1 AND type='content'",
                params![key],
            )?;
            Ok(())
        })
    }
}

/// Fills entry ids and MIME defaults, carries `table_image_index` through
/// untouched, and rejects entries that violate the binary rules.
fn normalize_media(mut media: Vec<MediaEntry>) -> Result<Vec<MediaEntry>, StoreError> {
    // Fresh ids start past the highest assigned one so re-saving an item
    // keeps existing entry ids stable.
    let mut next_id = media
        .iter()
        .filter_map(|entry| entry.id.strip_prefix("med_")?.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max + 1);

    for entry in &mut media {
        if entry.id.is_empty() {
            entry.id = format!("med_{next_id:03}");
            next_id += 1;
        }
        if entry.payload.is_some() && !entry.kind.is_binary() {
            return Err(StoreError::InvalidInput(
                "binary payload on a non-binary media entry",
            ));
        }
        match &entry.mime_type {
            // Table entries never pass: they carry structured data, not a
            // typed byte stream.
            Some(mime) => {
                if !validate::is_allowed_mime(entry.kind, mime) {
                    return Err(StoreError::UnsupportedMime {
                        kind: entry.kind.as_str(),
                        mime: mime.clone(),
                    });
                }
            }
            None => entry.mime_type = validate::default_mime(entry.kind).map(str::to_string),
        }
        if entry.size.is_none() {
            entry.size = entry.payload.as_ref().map(|payload| payload.len() as u64);
        }
    }
    Ok(media)
}

struct RawContentRow {
    key: String,
    text: Option<String>,
    links_json: Option<String>,
    media_json: Option<String>,
    project_id: Option<String>,
    content_type: Option<String>,
    order: Option<i64>,
    created_ms: i64,
    modified_ms: i64,
}

fn content_from_raw(raw: RawContentRow) -> Result<ContentItem, StoreError> {
    Ok(ContentItem {
        key: raw.key,
        text: raw.text.unwrap_or_default(),
        links: raw
            .links_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_default(),
        media: raw
            .media_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_default(),
        project_id: raw
            .project_id
            .ok_or(StoreError::Corrupt("content row missing project reference"))?,
        content_type: raw.content_type,
        order: raw.order,
        created_ms: raw.created_ms,
        modified_ms: raw.modified_ms,
    })
}

fn content_by_key(conn: &Connection, key: &str) -> Result<Option<ContentItem>, StoreError> {
    let raw = conn
        .query_row(
            "SELECT key, text, links_json, media_json, project_id, content_type, ord, created_ms, modified_ms
             FROM records WHERE key=?1 AND type=?2",
            params![key, RecordKind::Content.as_str()],
            raw_content_row,
        )
        .optional()?;
    raw.map(content_from_raw).transpose()
}

fn query_content(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ContentItem>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, raw_content_row)?;
    let mut items = Vec::new();
    for raw in rows {
        items.push(content_from_raw(raw?)?);
    }
    Ok(items)
}

fn raw_content_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContentRow> {
    Ok(RawContentRow {
        key: row.get(0)?,
        text: row.get(1)?,
        links_json: row.get(2)?,
        media_json: row.get(3)?,
        project_id: row.get(4)?,
        content_type: row.get(5)?,
        order: row.get(6)?,
        created_ms: row.get(7)?,
        modified_ms: row.get(8)?,
    })
}

fn put_content(conn: &Connection, item: &ContentItem) -> Result<(), StoreError> {
    let links_json = serde_json::to_string(&item.links)?;
    let media_json = serde_json::to_string(&item.media)?;
    conn.execute(
        r#"
        INSERT INTO records(key, type, text, links_json, media_json, project_id, content_type, ord, created_ms, modified_ms)
        VALUES (?1, 'content', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(key) DO UPDATE SET
          text=excluded.text,
          links_json=excluded.links_json,
          media_json=excluded.media_json,
          project_id=excluded.project_id,
          content_type=excluded.content_type,
          ord=excluded.ord,
          created_ms=excluded.created_ms,
          modified_ms=excluded.modified_ms
        "#,
        params![
            item.key,
            item.text,
            links_json,
            media_json,
            item.project_id,
            item.content_type,
            item.order,
            item.created_ms,
            item.modified_ms
        ],
    )?;
    Ok(())
}
