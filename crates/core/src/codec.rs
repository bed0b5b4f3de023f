#![forbid(unsafe_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// The binary/text boundary. Every byte payload that crosses into a text
/// medium (JSON columns, the session ledger) passes through here; nothing
/// else in the workspace touches base64 directly.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    InvalidBase64,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBase64 => write!(f, "invalid base64 payload"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(text).map_err(|_| DecodeError::InvalidBase64)
}

/// Serde adapter for `Option<Vec<u8>>` fields stored as base64 text.
pub mod base64_opt {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(payload: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match payload {
            Some(bytes) => serializer.serialize_str(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text: Option<String> = Option::deserialize(deserializer)?;
        match text {
            Some(text) => super::decode(&text)
                .map(Some)
                .map_err(|err| D::Error::custom(err.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_every_byte_value() {
        let bytes: Vec<u8> = (0u16..=255).map(|value| value as u8).collect();
        assert_eq!(decode(&encode(&bytes)), Ok(bytes));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(decode("not base64!!"), Err(DecodeError::InvalidBase64));
    }

    #[test]
    fn empty_payload_is_legal() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode(""), Ok(Vec::new()));
    }
}
