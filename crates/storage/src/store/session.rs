#![forbid(unsafe_code)]

use std::collections::HashMap;

/// Transient string key-value store backing the undo/redo ledger.
///
/// Implementations hold session-lifetime state only: nothing written here
/// may outlive the process, and the engine never mirrors it into the
/// durable database.
pub trait SessionStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// Default in-memory session store. Dropping the engine wipes it, which is
/// exactly the lifetime the ledger wants.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
