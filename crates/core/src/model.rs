#![forbid(unsafe_code)]

use crate::codec;
use serde::{Deserialize, Serialize};

/// Discriminator for the two record kinds sharing the unified collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Content,
    Project,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Content => "content",
            RecordKind::Project => "project",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "content" => Some(RecordKind::Content),
            "project" => Some(RecordKind::Project),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    /// Generic media entry with no dedicated whitelist.
    Media,
    Table,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Media => "media",
            MediaKind::Table => "table",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            "media" => Some(MediaKind::Media),
            "table" => Some(MediaKind::Table),
            _ => None,
        }
    }

    /// Table entries carry structured data, everything else carries bytes.
    pub fn is_binary(self) -> bool {
        !matches!(self, MediaKind::Table)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One attachment or structured table embedded inside a [`ContentItem`].
/// Entries have no lifecycle of their own: they are stored inside the parent
/// row and die with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub id: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(
        default,
        with = "codec::base64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_image_index: Option<usize>,
}

/// A captured or authored unit of content. The serialized form doubles as
/// the undo snapshot format, so every field must round-trip through serde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub key: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaEntry>,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub created_ms: i64,
    pub modified_ms: i64,
}

/// A named partition of content items. `item_count` is a cache recomputed on
/// demand, never a source of truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
    pub created_ms: i64,
    pub modified_ms: i64,
    pub is_default: bool,
    pub item_count: i64,
}

/// Placeholder token embedded in a table cell in place of an image.
pub fn table_image_token(index: usize) -> String {
    format!("[[image:{index}]]")
}

pub fn parse_table_image_token(cell: &str) -> Option<usize> {
    let rest = cell.trim().strip_prefix("[[image:")?;
    let digits = rest.strip_suffix("]]")?;
    digits.parse().ok()
}

/// Resolves a table cell placeholder to the sibling image entry carrying the
/// matching `table_image_index`. Tokens that resolve to nothing are treated
/// as decorative by callers.
pub fn resolve_table_image(media: &[MediaEntry], index: usize) -> Option<&MediaEntry> {
    media.iter().find(|entry| {
        entry.kind == MediaKind::Image && entry.table_image_index == Some(index)
    })
}
