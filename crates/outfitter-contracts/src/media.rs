use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::OutfitError;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// A self-describing embeddable image, `data:<mime>;base64,<payload>`.
///
/// The payload is kept as the exact base64 text that was parsed so that
/// consuming and emitting a data URI is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUri {
    mime_type: String,
    payload: String,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            mime_type: if mime_type.trim().is_empty() {
                DEFAULT_IMAGE_MIME.to_string()
            } else {
                mime_type.trim().to_string()
            },
            payload: payload.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, BASE64.encode(bytes))
    }

    pub fn parse(raw: &str) -> Result<Self, OutfitError> {
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| OutfitError::validation("image payload is not a data URI"))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| OutfitError::validation("data URI has no payload separator"))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| OutfitError::validation("data URI is not base64 encoded"))?;
        if mime_type.contains(';') {
            return Err(OutfitError::validation(format!(
                "unsupported data URI parameters: {meta}"
            )));
        }
        Ok(Self::new(mime_type, payload))
    }

    /// Accepts either a full data URI or a bare base64 payload, in which case
    /// `fallback_mime` describes it.
    pub fn from_payload(raw: &str, fallback_mime: &str) -> Result<Self, OutfitError> {
        if raw.starts_with("data:") {
            return Self::parse(raw);
        }
        if raw.trim().is_empty() {
            return Err(OutfitError::validation("image payload is empty"));
        }
        Ok(Self::new(fallback_mime, raw.trim()))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 text without the `data:` header.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, OutfitError> {
        BASE64
            .decode(self.payload.as_bytes())
            .map_err(|err| OutfitError::upstream_decode(format!("invalid base64 image: {err}")))
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

impl FromStr for DataUri {
    type Err = OutfitError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for DataUri {
    type Error = OutfitError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<DataUri> for String {
    fn from(value: DataUri) -> Self {
        value.to_string()
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}
