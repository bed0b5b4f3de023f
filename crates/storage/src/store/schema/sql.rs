#![forbid(unsafe_code)]

pub(super) const PRAGMAS: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA foreign_keys=ON;
"#;

// Bookkeeping tables exist at every schema generation: the version marker
// and the durable active-project pointer live in `meta`, key sequences in
// `counters`.
pub(super) const META: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS counters (
  name TEXT PRIMARY KEY,
  value INTEGER NOT NULL
);
"#;

// The unified keyed collection. Content items and projects share the table
// behind the `type` discriminator; project-only columns stay NULL/0 on
// content rows and vice versa. Embedded media and links are JSON columns,
// binary payloads base64-encoded inside the JSON.
pub(super) const RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS records (
  key TEXT PRIMARY KEY,
  type TEXT NOT NULL,
  text TEXT,
  links_json TEXT,
  media_json TEXT,
  project_id TEXT,
  content_type TEXT,
  ord INTEGER,
  name TEXT,
  is_default INTEGER NOT NULL DEFAULT 0,
  item_count INTEGER NOT NULL DEFAULT 0,
  created_ms INTEGER NOT NULL,
  modified_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_type ON records(type);
CREATE INDEX IF NOT EXISTS idx_records_created ON records(created_ms);
CREATE INDEX IF NOT EXISTS idx_records_modified ON records(modified_ms);
"#;

pub(super) const PROJECT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_records_project ON records(project_id);
"#;
