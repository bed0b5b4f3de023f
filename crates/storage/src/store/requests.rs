#![forbid(unsafe_code)]

use cs_core::model::MediaEntry;
use serde::{Deserialize, Serialize};

/// Payload for a content upsert. The engine fills in everything the caller
/// leaves out: key generation, link filtering, media normalization,
/// timestamps, default project.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveContentRequest {
    pub text: String,
    pub links: Vec<String>,
    pub media: Vec<MediaEntry>,
    pub project_id: Option<String>,
    pub content_type: Option<String>,
    pub order: Option<i64>,
    /// Only honored on first insert; `created_ms` is immutable afterwards.
    pub created_ms: Option<i64>,
}

/// One entry of a manual reorder batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub key: String,
    pub order: i64,
}
