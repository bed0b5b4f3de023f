#![forbid(unsafe_code)]

use super::StoreError;
use super::schema;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Owns the single lazily-opened connection to the database file.
pub(super) struct ConnectionManager {
    db_path: PathBuf,
    idle_timeout: Duration,
    slot: Mutex<Slot>,
}

struct Slot {
    conn: Option<Connection>,
    last_used: Instant,
}

impl ConnectionManager {
    pub(super) fn new(db_path: PathBuf, idle_timeout: Duration) -> Self {
        Self {
            db_path,
            idle_timeout,
            slot: Mutex::new(Slot {
                conn: None,
                last_used: Instant::now(),
            }),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the live connection, opening one (and migrating the
    /// schema) first if none exists. Callers racing the first open serialize
    /// on the slot lock, so exactly one open happens and every caller
    /// observes the same handle. An open failure leaves the slot empty and
    /// the next call retries from scratch.
    pub(super) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut slot = self.lock_slot();
        if slot.conn.is_none() {
            tracing::debug!(path = %self.db_path.display(), "opening store");
            slot.conn = Some(schema::open_with_migrations(&self.db_path)?);
        }
        slot.last_used = Instant::now();
        let Some(conn) = slot.conn.as_mut() else {
            return Err(StoreError::Corrupt("connection slot empty after open"));
        };
        f(conn)
    }

    pub(super) fn is_open(&self) -> bool {
        self.lock_slot().conn.is_some()
    }

    /// Closes the handle once it has gone unused for the idle window.
    /// Returns whether a close happened.
    pub(super) fn close_if_idle(&self, now: Instant) -> bool {
        let mut slot = self.lock_slot();
        if slot.conn.is_some() && now.duration_since(slot.last_used) >= self.idle_timeout {
            slot.conn = None;
            tracing::debug!("closed idle connection");
            return true;
        }
        false
    }

    /// Idempotent; tolerates an absent handle.
    pub(super) fn force_close(&self) {
        self.lock_slot().conn = None;
    }

    /// Keep-alive signal: a no-op statement on the live handle, without
    /// resetting the idle window. Returns whether a handle was live.
    pub(super) fn ping(&self) -> bool {
        let slot = self.lock_slot();
        match slot.conn.as_ref() {
            Some(conn) => {
                if let Err(err) = conn.query_row("SELECT 1", [], |_| Ok(())) {
                    tracing::warn!(error = %err, "keep-alive ping failed");
                } else {
                    tracing::trace!("keep-alive ping");
                }
                true
            }
            None => false,
        }
    }
}

/// Background timer driving keep-alive pings and idle teardown. Owned by
/// the engine; stopping it joins the thread.
pub(super) struct Maintenance {
    shared: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Maintenance {
    pub(super) fn spawn(manager: Arc<ConnectionManager>, interval: Duration) -> Self {
        let shared = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            let (stop_flag, signal) = &*thread_shared;
            let mut stopped = stop_flag.lock().unwrap_or_else(PoisonError::into_inner);
            while !*stopped {
                let (guard, _) = signal
                    .wait_timeout(stopped, interval)
                    .unwrap_or_else(PoisonError::into_inner);
                stopped = guard;
                if *stopped {
                    break;
                }
                manager.ping();
                manager.close_if_idle(Instant::now());
            }
        });
        Self {
            shared,
            handle: Some(handle),
        }
    }

    fn stop(&mut self) {
        let (stop_flag, signal) = &*self.shared;
        *stop_flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Maintenance {
    fn drop(&mut self) {
        self.stop();
    }
}
