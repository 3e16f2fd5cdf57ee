use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use outfitter_contracts::api::{decode_endpoint_reply, ItemForApi, LookPayload, TryOnPayload};
use outfitter_contracts::catalog::{Avatar, StyleCatalog};
use outfitter_contracts::closet::{ClosetStore, KeyValueStorage};
use outfitter_contracts::events::{ActivityKind, ActivityLog};
use outfitter_contracts::media::DataUri;
use outfitter_contracts::session::{DecodedLook, Look, Session};
use outfitter_contracts::OutfitError;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

mod decode;
mod endpoint;
mod request;

pub use decode::{
    decode_advice_parts, decode_try_on_parts, parts_from_gemini_payload, AdviceDecoder,
    ResponsePart,
};
pub use endpoint::{
    dispatch, handle_fashion_advice, handle_virtual_try_on, FASHION_ADVICE_ROUTE,
    VIRTUAL_TRY_ON_ROUTE,
};
pub use request::{
    advice_instruction, AdviceRequest, ModelRequest, TryOnRequest, LOOKS_PER_REQUEST,
};

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_PROXY_BASE: &str = "http://localhost:3000";
const DRYRUN_IMAGE_SIZE: u32 = 64;

/// Raw answer of a provider, before decoding.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub provider_request: Map<String, Value>,
    pub warnings: Vec<String>,
    pub parts: Vec<ResponsePart>,
}

pub trait StylistProvider: Send + Sync {
    fn name(&self) -> &str;
    fn advise(&self, request: &AdviceRequest) -> Result<ProviderReply>;
    fn try_on(&self, request: &TryOnRequest) -> Result<ProviderReply>;
}

#[derive(Default)]
pub struct StylistProviderRegistry {
    providers: BTreeMap<String, Box<dyn StylistProvider>>,
}

impl StylistProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: StylistProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn StylistProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry() -> StylistProviderRegistry {
    let mut providers = StylistProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new());
    providers.register(ProxyProvider::new());
    providers
}

struct DryrunProvider;

impl StylistProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn advise(&self, request: &AdviceRequest) -> Result<ProviderReply> {
        let pieces = request
            .categories()
            .iter()
            .map(|category| category.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut parts = Vec::new();
        for idx in 0..LOOKS_PER_REQUEST {
            let png = dryrun_png(request.instruction(), idx as u64)?;
            parts.push(ResponsePart::Image(DataUri::from_bytes("image/png", &png)));
            parts.push(ResponsePart::text(format!(
                "Look {}: a {} combination of your {}.",
                idx + 1,
                request.style(),
                pieces
            )));
        }
        Ok(ProviderReply {
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": {
                    "items": request.items().len(),
                    "style": request.style(),
                    "options": request.options(),
                }
            })),
            warnings: Vec::new(),
            parts,
        })
    }

    fn try_on(&self, request: &TryOnRequest) -> Result<ProviderReply> {
        let png = dryrun_png(request.instruction(), request.items().len() as u64)?;
        Ok(ProviderReply {
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": { "items": request.items().len() }
            })),
            warnings: Vec::new(),
            parts: vec![ResponsePart::Image(DataUri::from_bytes("image/png", &png))],
        })
    }
}

struct GeminiProvider {
    api_base: String,
    model: String,
    timeout_s: f64,
    http: HttpClient,
}

impl GeminiProvider {
    fn new() -> Self {
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: non_empty_env("OUTFITTER_GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            timeout_s: request_timeout_seconds(),
            http: HttpClient::new(),
        }
    }

    fn api_key() -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Images go first as inline data, then the instruction text.
    fn build_payload(request: &ModelRequest) -> Value {
        let mut parts = request
            .images
            .iter()
            .map(|image| {
                json!({
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": image.payload(),
                    }
                })
            })
            .collect::<Vec<_>>();
        parts.push(json!({ "text": request.instruction }));
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": request.response_modalities },
        })
    }

    fn generate(&self, request: &ModelRequest) -> Result<ProviderReply> {
        let Some(api_key) = Self::api_key() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(&self.model);
        let payload = Self::build_payload(request);

        tracing::debug!(
            endpoint = %endpoint,
            images = request.images.len(),
            "sending generateContent request"
        );
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(Duration::from_secs_f64(self.timeout_s))
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let parts = parts_from_gemini_payload(&response_payload)?;

        let mut warnings = Vec::new();
        if let Some(reason) = response_payload
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .filter(|reason| *reason != "STOP")
        {
            warnings.push(format!("Gemini finished with reason {reason}."));
        }

        Ok(ProviderReply {
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "model": self.model,
                "images": request.images.len(),
                "response_modalities": request.response_modalities,
            })),
            warnings,
            parts,
        })
    }
}

impl StylistProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn advise(&self, request: &AdviceRequest) -> Result<ProviderReply> {
        self.generate(&request.model_request())
    }

    fn try_on(&self, request: &TryOnRequest) -> Result<ProviderReply> {
        self.generate(&request.model_request())
    }
}

/// Talks to a deployed `/api/fashion-advice` + `/api/virtual-tryon` pair.
struct ProxyProvider {
    api_base: String,
    timeout_s: f64,
    http: HttpClient,
}

impl ProxyProvider {
    fn new() -> Self {
        Self {
            api_base: non_empty_env("OUTFITTER_PROXY_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PROXY_BASE.to_string()),
            timeout_s: request_timeout_seconds(),
            http: HttpClient::new(),
        }
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<(String, T)> {
        let endpoint = format!("{}{}", self.api_base, path);
        let response = self
            .http
            .post(&endpoint)
            .timeout(Duration::from_secs_f64(self.timeout_s))
            .json(body)
            .send()
            .with_context(|| format!("proxy request failed ({endpoint})"))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .context("proxy response body read failed")?;
        let parsed = decode_endpoint_reply(status, &text)?;
        Ok((endpoint, parsed))
    }
}

impl StylistProvider for ProxyProvider {
    fn name(&self) -> &str {
        "proxy"
    }

    fn advise(&self, request: &AdviceRequest) -> Result<ProviderReply> {
        let (endpoint, looks): (String, Vec<LookPayload>) =
            self.post("/api/fashion-advice", &request.to_api())?;
        Ok(ProviderReply {
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "items": request.items().len(),
            })),
            warnings: Vec::new(),
            parts: parts_from_look_payloads(looks)?,
        })
    }

    fn try_on(&self, request: &TryOnRequest) -> Result<ProviderReply> {
        let (endpoint, payload): (String, TryOnPayload) =
            self.post("/api/virtual-tryon", &request.to_api())?;
        let image = DataUri::parse(&payload.image)
            .map_err(|err| OutfitError::upstream_decode(format!("try-on image: {err}")))?;
        Ok(ProviderReply {
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "items": request.items().len(),
            })),
            warnings: Vec::new(),
            parts: vec![ResponsePart::Image(image)],
        })
    }
}

/// Lays endpoint looks back out as `[image?, text]` parts.
fn parts_from_look_payloads(looks: Vec<LookPayload>) -> Result<Vec<ResponsePart>, OutfitError> {
    let mut parts = Vec::with_capacity(looks.len() * 2);
    for look in looks {
        if let Some(image) = look.image.as_deref().filter(|value| !value.is_empty()) {
            let image = DataUri::parse(image)
                .map_err(|err| OutfitError::upstream_decode(format!("look image: {err}")))?;
            parts.push(ResponsePart::Image(image));
        }
        parts.push(ResponsePart::Text(look.description));
    }
    Ok(parts)
}

/// Runs requests against one provider and turns the answers into looks.
pub struct Stylist {
    provider_name: String,
    providers: StylistProviderRegistry,
    styles: StyleCatalog,
    activity: Option<ActivityLog>,
}

impl Stylist {
    pub fn new(provider_name: &str) -> Result<Self> {
        Self::with_registry(provider_name, default_provider_registry())
    }

    pub fn with_registry(provider_name: &str, providers: StylistProviderRegistry) -> Result<Self> {
        let provider_name = provider_name.trim().to_ascii_lowercase();
        if providers.get(&provider_name).is_none() {
            bail!(
                "unknown provider '{provider_name}' (available: {})",
                providers.names().join(", ")
            );
        }
        Ok(Self {
            provider_name,
            providers,
            styles: StyleCatalog::default(),
            activity: None,
        })
    }

    pub fn with_styles(mut self, styles: StyleCatalog) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn styles(&self) -> &StyleCatalog {
        &self.styles
    }

    pub fn activity(&self) -> Option<&ActivityLog> {
        self.activity.as_ref()
    }

    fn provider(&self) -> Result<&dyn StylistProvider, OutfitError> {
        self.providers
            .get(&self.provider_name)
            .ok_or_else(|| OutfitError::Transport(format!("provider '{}' missing", self.provider_name)))
    }

    pub fn advise(&self, request: &AdviceRequest) -> Result<Vec<DecodedLook>, OutfitError> {
        self.note(
            ActivityKind::AdviceRequested,
            json!({
                "provider": self.provider_name,
                "items": request.items().len(),
                "style": request.style(),
                "options": request.options(),
            }),
        );
        let looks = self
            .provider()?
            .advise(request)
            .map_err(into_outfit_error)
            .and_then(|reply| {
                self.log_warnings(&reply);
                decode_advice_parts(reply.parts)
            });
        match looks {
            Ok(looks) => {
                self.note(
                    ActivityKind::LooksDecoded,
                    json!({
                        "count": looks.len(),
                        "with_image": looks.iter().filter(|look| look.image.is_some()).count(),
                    }),
                );
                Ok(looks)
            }
            Err(err) => Err(self.failed("advise", err)),
        }
    }

    pub fn try_on(&self, request: &TryOnRequest) -> Result<DataUri, OutfitError> {
        self.note(
            ActivityKind::TryOnRequested,
            json!({
                "provider": self.provider_name,
                "items": request.items().len(),
            }),
        );
        let image = self
            .provider()?
            .try_on(request)
            .map_err(into_outfit_error)
            .and_then(|reply| {
                self.log_warnings(&reply);
                decode_try_on_parts(&reply.parts)
            });
        match image {
            Ok(image) => {
                self.note(
                    ActivityKind::TryOnCompleted,
                    json!({ "mime_type": image.mime_type() }),
                );
                Ok(image)
            }
            Err(err) => Err(self.failed("try_on", err)),
        }
    }

    /// Builds an advice request from the generator selection and replaces the
    /// session's looks with the answer. A validation failure leaves the
    /// session untouched; any later failure leaves it with no looks.
    pub fn generate_looks<S: KeyValueStorage>(
        &self,
        closet: &ClosetStore<S>,
        session: &mut Session,
    ) -> Result<usize, OutfitError> {
        let items = closet
            .selected(&session.generator_selection)
            .into_iter()
            .map(ItemForApi::from)
            .collect();
        let request = AdviceRequest::new(
            items,
            &session.style,
            &session.custom_prompt,
            session.options,
            &self.styles,
        )?;
        session.looks.clear();
        let looks = self.advise(&request)?;
        Ok(session.looks.replace(looks).len())
    }

    /// Dresses `avatar` in the try-on selection and keeps the result in the
    /// session.
    pub fn try_on_selection<S: KeyValueStorage>(
        &self,
        closet: &ClosetStore<S>,
        avatar: Option<&Avatar>,
        session: &mut Session,
    ) -> Result<DataUri, OutfitError> {
        let items = closet
            .selected(&session.try_on_selection)
            .into_iter()
            .map(ItemForApi::from)
            .collect();
        let request = TryOnRequest::new(avatar.map(|avatar| &avatar.image_data), items)?;
        session.try_on_result = None;
        let image = self.try_on(&request)?;
        session.try_on_result = Some(image.clone());
        Ok(image)
    }

    fn log_warnings(&self, reply: &ProviderReply) {
        for warning in &reply.warnings {
            tracing::warn!(provider = %self.provider_name, "{warning}");
        }
    }

    fn failed(&self, operation: &str, err: OutfitError) -> OutfitError {
        tracing::warn!(
            provider = %self.provider_name,
            operation,
            kind = err.kind(),
            error = %err,
            "stylist request failed"
        );
        self.note(
            ActivityKind::RequestFailed,
            json!({
                "operation": operation,
                "error_kind": err.kind(),
                "error": err.to_string(),
            }),
        );
        err
    }

    fn note(&self, kind: ActivityKind, payload: Value) {
        if let Some(activity) = &self.activity {
            activity.note(kind, map_object(payload));
        }
    }
}

/// Writes every look image as `<look id>.<ext>` plus a `looks.json` index.
pub fn write_look_artifacts(dir: &Path, looks: &[Look]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut written = Vec::new();
    let mut index = Vec::with_capacity(looks.len());
    for look in looks {
        let image_file = match &look.image {
            Some(image) => {
                let path = dir.join(format!("{}.{}", look.id, image.file_extension()));
                let bytes = image
                    .decode_bytes()
                    .with_context(|| format!("look {} has an unreadable image", look.id))?;
                fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                let name = path
                    .file_name()
                    .and_then(|value| value.to_str())
                    .map(str::to_string);
                written.push(path);
                name
            }
            None => None,
        };
        index.push(json!({
            "id": look.id,
            "description": look.description,
            "isFavorited": look.is_favorited,
            "image": image_file,
        }));
    }
    let index_path = dir.join("looks.json");
    fs::write(&index_path, serde_json::to_string_pretty(&index)?)
        .with_context(|| format!("failed to write {}", index_path.display()))?;
    written.push(index_path);
    Ok(written)
}

/// Keeps a domain error found anywhere in the chain; anything else means the
/// request never produced an answer.
fn into_outfit_error(err: anyhow::Error) -> OutfitError {
    if let Some(outfit) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<OutfitError>())
    {
        return outfit.clone();
    }
    OutfitError::Transport(error_chain_text(&err, 512))
}

fn request_timeout_seconds() -> f64 {
    value_as_f64(
        non_empty_env("OUTFITTER_REQUEST_TIMEOUT")
            .map(Value::String)
            .as_ref(),
        90.0,
        15.0,
        300.0,
    )
}

fn value_as_f64(value: Option<&Value>, default: f64, min: f64, max: f64) -> f64 {
    let parsed = value.and_then(|row| match row {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    });
    parsed.unwrap_or(default).clamp(min, max)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(OutfitError::Upstream {
            status: code,
            message: upstream_error_message(&body),
        }
        .into());
    }
    let parsed: Value = serde_json::from_str(&body).map_err(|err| {
        OutfitError::upstream_decode(format!("{provider} returned invalid JSON payload: {err}"))
    })?;
    Ok(parsed)
}

/// `{"error": {"message": …}}` or `{"error": "…"}` when present, else the
/// raw body.
fn upstream_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|payload| {
        payload
            .pointer("/error/message")
            .or_else(|| payload.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match message {
        Some(message) if !message.trim().is_empty() => truncate_text(message.trim(), 512),
        _ => truncate_text(body.trim(), 512),
    }
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn dryrun_png(instruction: &str, seed: u64) -> Result<Vec<u8>> {
    let (r, g, b) = color_from_prompt(instruction, seed);
    let mut image = RgbImage::new(DRYRUN_IMAGE_SIZE, DRYRUN_IMAGE_SIZE);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("failed to encode dryrun image")?;
    Ok(bytes)
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
