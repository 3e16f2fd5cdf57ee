use outfitter_contracts::media::{DataUri, DEFAULT_IMAGE_MIME};
use outfitter_contracts::session::DecodedLook;
use outfitter_contracts::OutfitError;
use serde_json::Value;

/// One unit of a model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Image(DataUri),
    Text(String),
}

impl ResponsePart {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }
}

/// Reads `candidates[0].content.parts` of a `generateContent` answer.
///
/// Texts are kept verbatim. Empty texts and empty inline payloads are
/// dropped, as are `thought` parts. A blocked prompt with no candidate is an error naming the reason.
pub fn parts_from_gemini_payload(payload: &Value) -> Result<Vec<ResponsePart>, OutfitError> {
    let candidate = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first());
    let Some(candidate) = candidate else {
        if let Some(reason) = payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            return Err(OutfitError::upstream_decode(format!(
                "the model blocked the request ({reason})"
            )));
        }
        return Ok(Vec::new());
    };

    let parts = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        if let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        {
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_IMAGE_MIME);
            out.push(ResponsePart::Image(DataUri::new(mime_type, data)));
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            if !text.is_empty() {
                out.push(ResponsePart::text(text));
            }
        }
    }
    Ok(out)
}

/// Pairs each text part with the image that precedes it.
///
/// An image replaces any image still waiting for its text. A text closes a
/// look with whatever image is pending, possibly none. A trailing image with
/// no text after it produces nothing.
#[derive(Debug, Default)]
pub struct AdviceDecoder {
    pending_image: Option<DataUri>,
    looks: Vec<DecodedLook>,
    texts: Vec<String>,
}

impl AdviceDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, part: ResponsePart) {
        match part {
            ResponsePart::Image(image) => {
                if let Some(discarded) = self.pending_image.replace(image) {
                    tracing::debug!(
                        mime_type = discarded.mime_type(),
                        "image part without description replaced by the next image"
                    );
                }
            }
            ResponsePart::Text(text) => {
                self.looks.push(DecodedLook {
                    image: self.pending_image.take(),
                    description: text.clone(),
                });
                self.texts.push(text);
            }
        }
    }

    pub fn looks(&self) -> &[DecodedLook] {
        &self.looks
    }

    pub fn finish(self) -> Result<Vec<DecodedLook>, OutfitError> {
        if self.pending_image.is_some() {
            tracing::debug!("trailing image part without description dropped");
        }
        if !self.looks.is_empty() {
            return Ok(self.looks);
        }
        if !self.texts.is_empty() {
            return Ok(vec![DecodedLook {
                image: None,
                description: self.texts.join("\n"),
            }]);
        }
        Err(OutfitError::upstream_decode(
            "the model returned no looks; try again with a different selection",
        ))
    }
}

pub fn decode_advice_parts(
    parts: impl IntoIterator<Item = ResponsePart>,
) -> Result<Vec<DecodedLook>, OutfitError> {
    let mut decoder = AdviceDecoder::new();
    for part in parts {
        decoder.feed(part);
    }
    decoder.finish()
}

/// First image wins; a text-only answer is the model explaining a refusal.
pub fn decode_try_on_parts(parts: &[ResponsePart]) -> Result<DataUri, OutfitError> {
    if let Some(image) = parts.iter().find_map(|part| match part {
        ResponsePart::Image(image) => Some(image.clone()),
        ResponsePart::Text(_) => None,
    }) {
        return Ok(image);
    }
    if let Some(text) = parts.iter().find_map(|part| match part {
        ResponsePart::Text(text) => Some(text.as_str()),
        ResponsePart::Image(_) => None,
    }) {
        return Err(OutfitError::upstream_decode(text));
    }
    Err(OutfitError::upstream_decode(
        "the model did not return a try-on image",
    ))
}
