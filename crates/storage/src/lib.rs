#![forbid(unsafe_code)]

mod store;

pub use store::{
    ActionKind, DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME, EngineOptions, MemorySessionStore,
    OrderUpdate, SCHEMA_VERSION, SaveContentRequest, SessionStore, StorageEngine, StoreError,
    UndoAction,
};
