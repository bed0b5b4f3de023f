#![forbid(unsafe_code)]

use cs_core::validate::NameError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    InvalidName(NameError),
    DuplicateProjectName(String),
    UnsupportedMime {
        kind: &'static str,
        mime: String,
    },
    UnknownContent(String),
    UnknownProject(String),
    DefaultProjectProtected,
    LastProjectProtected,
    Corrupt(&'static str),
}

impl StoreError {
    /// Stable taxonomy bucket for callers that dispatch on error class
    /// rather than variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Sql(_) => "STORAGE_UNAVAILABLE",
            Self::InvalidInput(_)
            | Self::InvalidName(_)
            | Self::DuplicateProjectName(_)
            | Self::UnsupportedMime { .. }
            | Self::DefaultProjectProtected
            | Self::LastProjectProtected => "VALIDATION",
            Self::UnknownContent(_) | Self::UnknownProject(_) => "NOT_FOUND",
            Self::Json(_) | Self::Corrupt(_) => "STATE_CORRUPTION",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidName(err) => write!(f, "invalid project name: {err}"),
            Self::DuplicateProjectName(name) => {
                write!(f, "project name already in use: {name:?}")
            }
            Self::UnsupportedMime { kind, mime } => {
                write!(f, "unsupported mime type for {kind}: {mime}")
            }
            Self::UnknownContent(id) => write!(f, "unknown content item: {id}"),
            Self::UnknownProject(id) => write!(f, "unknown project: {id}"),
            Self::DefaultProjectProtected => write!(f, "the default project cannot be deleted"),
            Self::LastProjectProtected => write!(f, "the last remaining project cannot be deleted"),
            Self::Corrupt(message) => write!(f, "storage state corrupt: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<NameError> for StoreError {
    fn from(value: NameError) -> Self {
        Self::InvalidName(value)
    }
}
