//! Media identifiers.
//!
//! A media id is a time-sortable UUIDv7 rendered as a type-tagged string:
//! `media_` followed by 26 characters of lowercase Crockford base32. The
//! database stores the raw UUID; the physical object name is the rendered id
//! plus the file extension (`media_01h2xcejqtf2nbrexx3vqjhp41.mp4`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

pub const MEDIA_ID_PREFIX: &str = "media";

const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";
const ENCODED_LEN: usize = 26;
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("wrong id format: {0}")]
    WrongFormat(String),
    #[error("wrong media name: {0}")]
    WrongMediaName(String),
}

/// Identifier of a stored media object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct MediaId(Uuid);

impl MediaId {
    /// Mint a fresh id. Ids minted later sort after ids minted earlier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Accept the typed form, a bare UUID, or a media name (`id.ext`).
    pub fn resolve(input: &str) -> Result<Self, IdError> {
        if let Ok(uuid) = Uuid::parse_str(input) {
            return Ok(Self(uuid));
        }
        if input.contains('.') {
            return input.parse::<MediaName>().map(|name| name.id);
        }
        input.parse()
    }

    pub fn with_extension(self, extension: impl Into<String>) -> MediaName {
        MediaName {
            id: self,
            extension: extension.into(),
        }
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MediaId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MediaId> for Uuid {
    fn from(id: MediaId) -> Self {
        id.0
    }
}

impl Display for MediaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}_{}", MEDIA_ID_PREFIX, encode_base32(self.0.as_u128()))
    }
}

impl FromStr for MediaId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s
            .strip_prefix(MEDIA_ID_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or_else(|| IdError::WrongFormat(s.to_string()))?;
        let value = decode_base32(suffix).ok_or_else(|| IdError::WrongFormat(s.to_string()))?;
        Ok(Self(Uuid::from_u128(value)))
    }
}

impl Serialize for MediaId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MediaId::resolve(&raw).map_err(serde::de::Error::custom)
    }
}

/// Physical object name of a media: `{media_id}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaName {
    pub id: MediaId,
    pub extension: String,
}

impl MediaName {
    pub fn new(id: MediaId, extension: impl Into<String>) -> Result<Self, IdError> {
        let extension = extension.into();
        validate_extension(&extension)?;
        Ok(Self { id, extension })
    }
}

impl Display for MediaName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}", self.id, self.extension)
    }
}

impl FromStr for MediaName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, extension) = s
            .split_once('.')
            .ok_or_else(|| IdError::WrongMediaName(s.to_string()))?;
        let id = MediaId::from_str(id).map_err(|_| IdError::WrongMediaName(s.to_string()))?;
        validate_extension(extension).map_err(|_| IdError::WrongMediaName(s.to_string()))?;
        Ok(Self {
            id,
            extension: extension.to_string(),
        })
    }
}

impl Serialize for MediaName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn validate_extension(extension: &str) -> Result<(), IdError> {
    if extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(IdError::WrongFormat(format!("extension '{}'", extension)));
    }
    Ok(())
}

fn encode_base32(value: u128) -> String {
    let mut out = String::with_capacity(ENCODED_LEN);
    for i in 0..ENCODED_LEN {
        let shift = 5 * (ENCODED_LEN - 1 - i);
        let index = ((value >> shift) & 0x1f) as usize;
        out.push(ALPHABET[index] as char);
    }
    out
}

fn decode_base32(input: &str) -> Option<u128> {
    let bytes = input.as_bytes();
    if bytes.len() != ENCODED_LEN {
        return None;
    }
    // 26 * 5 = 130 bits, so the leading character carries only 3 bits.
    if bytes[0] > b'7' {
        return None;
    }
    let mut value: u128 = 0;
    for &b in bytes {
        let digit = ALPHABET.iter().position(|&c| c == b)? as u128;
        value = (value << 5) | digit;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_id_display_shape() {
        let id = MediaId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("media_"));
        assert_eq!(rendered.len(), "media_".len() + ENCODED_LEN);
    }

    #[test]
    fn test_media_id_parses_its_own_rendering() {
        let id = MediaId::new();
        let parsed: MediaId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_known_encoding() {
        let id = MediaId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "media_00000000000000000000000000");
        let max = MediaId::from_uuid(Uuid::from_u128(u128::MAX));
        assert_eq!(max.to_string(), "media_7zzzzzzzzzzzzzzzzzzzzzzzzz");
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = MediaId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = MediaId::new();
        assert!(first.to_string() < second.to_string());
        assert!(first < second);
    }

    #[test]
    fn test_rejects_wrong_format() {
        assert!("image_00000000000000000000000000".parse::<MediaId>().is_err());
        assert!("media_8zzzzzzzzzzzzzzzzzzzzzzzzz".parse::<MediaId>().is_err());
        assert!("media_0000".parse::<MediaId>().is_err());
        assert!("media_0000000000000000000000000u".parse::<MediaId>().is_err());
        assert!("media00000000000000000000000000".parse::<MediaId>().is_err());
    }

    #[test]
    fn test_resolve_accepts_all_forms() {
        let id = MediaId::new();
        assert_eq!(MediaId::resolve(&id.to_string()).unwrap(), id);
        assert_eq!(MediaId::resolve(&id.as_uuid().to_string()).unwrap(), id);
        assert_eq!(MediaId::resolve(&format!("{}.mp4", id)).unwrap(), id);
        assert!(MediaId::resolve("not-an-id").is_err());
    }

    #[test]
    fn test_media_name_round_trip_and_validation() {
        let id = MediaId::new();
        let name = id.with_extension("m3u8");
        let parsed: MediaName = name.to_string().parse().unwrap();
        assert_eq!(parsed, name);
        assert!(format!("{}.", id).parse::<MediaName>().is_err());
        assert!(format!("{}.../etc", id).parse::<MediaName>().is_err());
        assert!("media_x.mp4".parse::<MediaName>().is_err());
    }

    #[test]
    fn test_serde_uses_typed_form() {
        let id = MediaId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: MediaId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
