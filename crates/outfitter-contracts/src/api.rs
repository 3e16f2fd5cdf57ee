//! Wire shapes of the `fashion-advice` and `virtual-tryon` endpoints.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Category;
use crate::closet::StorableClothingItem;
use crate::errors::OutfitError;
use crate::session::DecodedLook;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForApi {
    pub base64: String,
    pub mime_type: String,
    pub category: Category,
}

impl From<&StorableClothingItem> for ItemForApi {
    fn from(item: &StorableClothingItem) -> Self {
        Self {
            base64: item.base64.clone(),
            mime_type: item.mime_type.clone(),
            category: item.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarForApi {
    pub base64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceOptions {
    #[serde(default)]
    pub suggest_new_items: bool,
    #[serde(default)]
    pub include_shoes: bool,
    #[serde(default)]
    pub include_accessories: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FashionAdviceRequest {
    #[serde(default)]
    pub items: Vec<ItemForApi>,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub custom_prompt: String,
    #[serde(flatten)]
    pub options: AdviceOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualTryOnRequest {
    #[serde(default)]
    pub avatar: Option<AvatarForApi>,
    #[serde(default)]
    pub items: Vec<ItemForApi>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookPayload {
    pub image: Option<String>,
    pub description: String,
}

impl From<&DecodedLook> for LookPayload {
    fn from(look: &DecodedLook) -> Self {
        Self {
            image: look.image.as_ref().map(ToString::to_string),
            description: look.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryOnPayload {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Status and JSON body produced by an endpoint handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointReply {
    pub status: u16,
    pub body: Value,
}

impl EndpointReply {
    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(err) => Self::error(500, format!("failed to encode response: {err}")),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Reads an endpoint answer. A non-2xx status is an error whatever the body
/// looks like; its `{error}` message is surfaced when present.
pub fn decode_endpoint_reply<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, OutfitError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorPayload>(body)
            .map(|payload| payload.error)
            .ok()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("server error (status {status})"));
        return Err(OutfitError::Upstream { status, message });
    }
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        return Err(OutfitError::upstream_decode(payload.error));
    }
    serde_json::from_str(body)
        .map_err(|err| OutfitError::upstream_decode(format!("unexpected endpoint response: {err}")))
}
