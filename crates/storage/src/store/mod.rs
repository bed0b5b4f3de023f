#![forbid(unsafe_code)]

mod connection;
mod content;
mod error;
mod history;
mod projects;
mod requests;
mod schema;
mod session;

pub use error::StoreError;
pub use history::{ActionKind, UndoAction};
pub use requests::{OrderUpdate, SaveContentRequest};
pub use schema::{DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME, SCHEMA_VERSION};
pub use session::{MemorySessionStore, SessionStore};

use connection::{ConnectionManager, Maintenance};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

const DB_FILE_NAME: &str = "clipstash.db";

/// Engine construction knobs. Production uses the defaults; tests shrink
/// the windows, disable the background thread and inject a session store.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Inactivity window after which the live connection is closed.
    pub idle_timeout: Duration,
    /// Keep-alive / maintenance tick, shorter than the idle window.
    pub keep_alive_interval: Duration,
    /// Whether to spawn the background maintenance thread.
    pub maintenance: bool,
    /// Per-project undo stack cap; oldest actions are evicted first.
    pub history_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(20),
            maintenance: true,
            history_limit: 50,
        }
    }
}

/// The unified local storage engine: durable record store with project
/// partitioning plus the session-scoped undo/redo ledger. One instance per
/// process; all state (connection slot, timers, session ledger) lives in
/// private fields rather than module globals.
pub struct StorageEngine {
    storage_dir: PathBuf,
    conn: Arc<ConnectionManager>,
    session: Mutex<Box<dyn SessionStore>>,
    history_limit: usize,
    action_seq: AtomicU64,
    // Kept for its Drop: stops the maintenance thread with the engine.
    _maintenance: Option<Maintenance>,
}

impl StorageEngine {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_options(
            storage_dir,
            EngineOptions::default(),
            Box::new(MemorySessionStore::default()),
        )
    }

    /// The connection itself stays unopened until the first storage call;
    /// schema migrations run on that first open.
    pub fn open_with_options(
        storage_dir: impl AsRef<Path>,
        options: EngineOptions,
        session: Box<dyn SessionStore>,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;
        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Arc::new(ConnectionManager::new(db_path, options.idle_timeout));
        let maintenance = options
            .maintenance
            .then(|| Maintenance::spawn(Arc::clone(&conn), options.keep_alive_interval));
        Ok(Self {
            storage_dir,
            conn,
            session: Mutex::new(session),
            history_limit: options.history_limit,
            action_seq: AtomicU64::new(0),
            _maintenance: maintenance,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    /// Closes the connection if it has been idle for the configured window.
    /// Exposed so hosts (and tests) can drive teardown with their own clock.
    pub fn close_if_idle(&self, now: Instant) -> bool {
        self.conn.close_if_idle(now)
    }

    /// Idempotent; safe to call with no live connection.
    pub fn force_close(&self) {
        self.conn.force_close();
    }

    /// Emits one keep-alive signal; returns whether a connection was live.
    pub fn ping(&self) -> bool {
        self.conn.ping()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.conn.with_conn(f)
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut dyn SessionStore) -> T) -> T {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(session.as_mut())
    }
}

fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value=excluded.value
        "#,
        params![name, next],
    )?;
    Ok(next)
}

fn meta_get_tx(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT value FROM meta WHERE key=?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn meta_set_tx(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO meta(key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value=excluded.value
        "#,
        params![key, value],
    )?;
    Ok(())
}
