#![forbid(unsafe_code)]

use crate::model::MediaKind;
use url::Url;

pub const PROJECT_NAME_MIN: usize = 2;
pub const PROJECT_NAME_MAX: usize = 50;

// Characters rejected in project names. The name may end up in export file
// paths, so the usual filesystem-unsafe set is excluded up front.
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    Empty,
    TooShort,
    TooLong,
    InvalidChar(char),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "name is empty"),
            Self::TooShort => write!(f, "name must be at least {PROJECT_NAME_MIN} characters"),
            Self::TooLong => write!(f, "name must be at most {PROJECT_NAME_MAX} characters"),
            Self::InvalidChar(ch) => write!(f, "name contains forbidden character {ch:?}"),
        }
    }
}

impl std::error::Error for NameError {}

/// Validates a project name against length and character rules. Uniqueness
/// is a store-level concern and is checked there.
pub fn validate_project_name(name: &str) -> Result<(), NameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let length = name.chars().count();
    if length < PROJECT_NAME_MIN {
        return Err(NameError::TooShort);
    }
    if length > PROJECT_NAME_MAX {
        return Err(NameError::TooLong);
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_NAME_CHARS.contains(ch)) {
        return Err(NameError::InvalidChar(ch));
    }
    Ok(())
}

pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

pub const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "audio/webm",
];

pub const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/webm", "video/ogg"];

/// Whitelist check per top-level media kind. Generic media is the fallback
/// bucket and accepts any declared MIME; tables never carry one.
pub fn is_allowed_mime(kind: MediaKind, mime: &str) -> bool {
    match kind {
        MediaKind::Image => IMAGE_MIME_TYPES.contains(&mime),
        MediaKind::Audio => AUDIO_MIME_TYPES.contains(&mime),
        MediaKind::Video => VIDEO_MIME_TYPES.contains(&mime),
        MediaKind::Media => true,
        MediaKind::Table => false,
    }
}

pub fn default_mime(kind: MediaKind) -> Option<&'static str> {
    match kind {
        MediaKind::Image => Some("image/png"),
        MediaKind::Audio => Some("audio/mpeg"),
        MediaKind::Video => Some("video/mp4"),
        MediaKind::Media | MediaKind::Table => None,
    }
}

/// Keeps absolute http/https URLs, silently dropping everything else.
pub fn filter_links(links: &[String]) -> Vec<String> {
    links
        .iter()
        .filter_map(|raw| {
            let trimmed = raw.trim();
            let parsed = Url::parse(trimmed).ok()?;
            if matches!(parsed.scheme(), "http" | "https") {
                Some(trimmed.to_string())
            } else {
                None
            }
        })
        .collect()
}
