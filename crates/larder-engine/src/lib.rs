//! Provider backends and pipeline orchestration. Public operations never
//! error: failures degrade to empty results or silence and are recorded
//! in the session event log.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use larder_contracts::events::{EventWriter, KitchenEvent};
use larder_contracts::inventory::{Inventory, KitchenLocation, PreviewImage};
use larder_contracts::parse::{ingredient_names_from_response, recipe_records_from_response};
use larder_contracts::prompts;
use larder_contracts::recipes::{DietaryRestriction, GenerationMode, Recipe};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use uuid::Uuid;

pub mod speech;

pub use speech::{resolve_speech_backend, NoopSpeech, SpeechBackend};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OPENAI_TEXT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GEMINI_TEXT_MODEL: &str = "gemini-3-pro-preview";

/// Provider credentials and overrides, read from the environment once per
/// process and injected everywhere else.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub text_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            text_model: None,
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: first_non_empty_env(&["OPENAI_API_KEY", "OPENAI_API_KEY_BACKUP"]),
            openai_api_base: first_non_empty_env(&["OPENAI_API_BASE", "OPENAI_BASE_URL"])
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            text_model: non_empty_env("LARDER_TEXT_MODEL"),
            gemini_api_key: first_non_empty_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            gemini_api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_non_empty_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty_env(key))
}

/// One chat-style completion: a prompt, optionally paired with an image
/// and a response schema for backends that honor one.
pub struct ChatRequest<'a> {
    pub prompt: &'a str,
    pub image: Option<&'a PreviewImage>,
    pub schema: Option<&'a Value>,
}

pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}

/// Credential-order resolution, committed once at engine construction:
/// chat-completion first, structured generation second, none means every
/// call resolves empty. No call-time fallthrough to the next candidate.
pub fn resolve_chat_backend(config: &ProviderConfig) -> Option<Box<dyn ChatBackend>> {
    if let Some(api_key) = config.openai_api_key.clone() {
        return Some(Box::new(OpenAiChatBackend::new(config, api_key)));
    }
    if let Some(api_key) = config.gemini_api_key.clone() {
        return Some(Box::new(GeminiChatBackend::new(config, api_key)));
    }
    None
}

/// OpenAI-compatible `chat/completions` backend.
pub struct OpenAiChatBackend {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl OpenAiChatBackend {
    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        Self {
            api_base: config.openai_api_base.clone(),
            api_key,
            model: config
                .text_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_TEXT_MODEL.to_string()),
            http: HttpClient::new(),
        }
    }
}

impl ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let endpoint = format!("{}/chat/completions", self.api_base);
        let mut content = Vec::new();
        if let Some(image) = request.image {
            let encoded = BASE64.encode(&image.bytes);
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:{};base64,{encoded}", image.mime) },
            }));
        }
        content.push(json!({ "type": "text", "text": request.prompt }));
        let payload = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": content,
            }],
            "stream": false,
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .with_context(|| format!("OpenAI chat request failed ({endpoint})"))?;
        let parsed = response_json_or_error("OpenAI chat", response)?;

        let text = extract_chat_message_text(&parsed);
        if text.trim().is_empty() {
            bail!("OpenAI chat response carried no message text");
        }
        Ok(text)
    }
}

/// Gemini `generateContent` backend, asked for JSON output directly.
pub struct GeminiChatBackend {
    api_base: String,
    api_key: String,
    model: String,
    http: HttpClient,
}

impl GeminiChatBackend {
    pub fn new(config: &ProviderConfig, api_key: String) -> Self {
        Self {
            api_base: config.gemini_api_base.clone(),
            api_key,
            model: config
                .text_model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_TEXT_MODEL.to_string()),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ChatBackend for GeminiChatBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let endpoint = self.endpoint_for_model();
        let mut parts = Vec::new();
        if let Some(image) = request.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime,
                    "data": BASE64.encode(&image.bytes),
                }
            }));
        }
        parts.push(json!({ "text": request.prompt }));
        let mut generation_config = json!({ "responseMimeType": "application/json" });
        if let Some(schema) = request.schema {
            generation_config["responseSchema"] = schema.clone();
        }
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": generation_config,
        });

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let parsed = response_json_or_error("Gemini", response)?;

        let text = extract_gemini_text(&parsed);
        if text.trim().is_empty() {
            bail!("Gemini response carried no text parts");
        }
        Ok(text)
    }
}

fn extract_chat_message_text(payload: &Value) -> String {
    let content = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));
    match content {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(chunks)) => chunks
            .iter()
            .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join(""),
        _ => String::new(),
    }
}

fn extract_gemini_text(payload: &Value) -> String {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<&str>>()
                .join("")
        })
        .unwrap_or_default()
}

fn scan_response_schema() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

fn plan_response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "description": { "type": "STRING" },
                "difficulty": {
                    "type": "STRING",
                    "enum": ["Quick Win", "Staple", "Weekend Project"],
                },
                "prepTime": { "type": "STRING" },
                "calories": { "type": "NUMBER" },
                "kidFriendlyReason": { "type": "STRING" },
                "ingredients": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": { "type": "STRING" },
                            "amount": { "type": "STRING" },
                            "isAvailable": { "type": "BOOLEAN" },
                        },
                        "required": ["name", "isAvailable"],
                    },
                },
                "steps": { "type": "ARRAY", "items": { "type": "STRING" } },
                "dietaryTags": { "type": "ARRAY", "items": { "type": "STRING" } },
            },
            "required": [
                "id", "title", "difficulty", "prepTime", "ingredients",
                "steps", "kidFriendlyReason",
            ],
        },
    })
}

pub(crate) fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let clipped: String = value.chars().take(max_chars).collect();
    format!("{clipped}…")
}

/// Decode a photo, flatten alpha onto white, cap the longest edge, and
/// re-encode as JPEG. Undecodable files fall back to their raw bytes.
pub fn prepare_scan_image(path: &Path) -> Result<PreviewImage> {
    const MAX_DIM: u32 = 1024;

    if let Ok(decoded) = image::open(path) {
        let rgba = decoded.to_rgba8();
        let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = u16::from(pixel[3]);
            let blend = |channel: u8| -> u8 {
                (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
            };
            flattened.put_pixel(
                x,
                y,
                Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
            );
        }
        let resized = DynamicImage::ImageRgba8(flattened)
            .resize(MAX_DIM, MAX_DIM, FilterType::Triangle)
            .to_rgb8();
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
        if encoder.encode_image(&DynamicImage::ImageRgb8(resized)).is_ok() {
            return Ok(PreviewImage {
                mime: "image/jpeg".to_string(),
                bytes,
            });
        }
    }

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read photo {}", path.display()))?;
    Ok(PreviewImage {
        mime: guess_image_mime(path).to_string(),
        bytes,
    })
}

fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}

/// Source of the illustrative-image cache-busting token, in [0, 1000).
pub trait ImageTokenSource: Send {
    fn next_token(&mut self) -> u32;
}

/// Default token source: fresh draw per recipe from uuid v4 bytes.
pub struct UuidTokenSource;

impl ImageTokenSource for UuidTokenSource {
    fn next_token(&mut self) -> u32 {
        let bytes = *Uuid::new_v4().as_bytes();
        (u32::from(bytes[0]) << 8 | u32::from(bytes[1])) % 1000
    }
}

/// Deterministic token source for tests: 0, 1, 2, ...
pub struct SequentialTokenSource {
    next: u32,
}

impl SequentialTokenSource {
    pub fn new() -> Self {
        Self { next: 0 }
    }
}

impl Default for SequentialTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageTokenSource for SequentialTokenSource {
    fn next_token(&mut self) -> u32 {
        let token = self.next % 1000;
        self.next += 1;
        token
    }
}

/// Finalize parsed records: provider fields pass through unchanged, only
/// the mode stamp and image reference are written here.
pub fn materialize_recipes(
    records: Vec<Recipe>,
    mode: GenerationMode,
    tokens: &mut dyn ImageTokenSource,
) -> Vec<Recipe> {
    let theme = match mode {
        GenerationMode::Lunchbox => "lunchbox",
        GenerationMode::Standard => "meal",
    };
    records
        .into_iter()
        .map(|mut recipe| {
            recipe.is_lunchbox = mode == GenerationMode::Lunchbox;
            recipe.image = format!(
                "https://loremflickr.com/400/300/food,cooking,kids,{theme}?lock={}",
                tokens.next_token()
            );
            recipe
        })
        .collect()
}

/// The pipeline facade the session loop drives.
pub struct KitchenEngine {
    chat: Option<Box<dyn ChatBackend>>,
    speech: Box<dyn SpeechBackend>,
    events: EventWriter,
    tokens: Box<dyn ImageTokenSource>,
}

impl KitchenEngine {
    pub fn new(config: &ProviderConfig, events: EventWriter) -> Self {
        Self {
            chat: resolve_chat_backend(config),
            speech: resolve_speech_backend(config),
            events,
            tokens: Box::new(UuidTokenSource),
        }
    }

    /// Test/bench entry: explicit backends and token source.
    pub fn with_backends(
        chat: Option<Box<dyn ChatBackend>>,
        speech: Box<dyn SpeechBackend>,
        events: EventWriter,
        tokens: Box<dyn ImageTokenSource>,
    ) -> Self {
        Self {
            chat,
            speech,
            events,
            tokens,
        }
    }

    pub fn chat_backend_name(&self) -> Option<&str> {
        self.chat.as_deref().map(ChatBackend::name)
    }

    pub fn speech_backend_name(&self) -> &str {
        self.speech.name()
    }

    /// Analyze one location photo into ingredient names. Failure degrades
    /// to an empty list; the reason lands in the event log only.
    pub fn scan_image(&self, location: KitchenLocation, image: &PreviewImage) -> Vec<String> {
        self.emit(KitchenEvent::ScanStarted { location });
        match self.try_scan(location, image) {
            Ok(names) => {
                self.emit(KitchenEvent::ScanCompleted {
                    location,
                    found: names.len(),
                });
                names
            }
            Err(err) => {
                self.pipeline_error("scan", &err);
                Vec::new()
            }
        }
    }

    fn try_scan(&self, location: KitchenLocation, image: &PreviewImage) -> Result<Vec<String>> {
        let Some(chat) = self.chat.as_deref() else {
            return Ok(Vec::new());
        };
        let prompt = prompts::scan_prompt(location);
        let schema = scan_response_schema();
        let raw = chat.complete(&ChatRequest {
            prompt: &prompt,
            image: Some(image),
            schema: Some(&schema),
        })?;
        Ok(ingredient_names_from_response(&raw))
    }

    /// Generate and materialize a recipe batch. Zero recipes is the
    /// caller's uniform "failed or returned nothing" signal.
    pub fn generate_recipes(
        &mut self,
        inventory: &Inventory,
        restrictions: &[DietaryRestriction],
        kid_ages: &[u32],
        mode: GenerationMode,
    ) -> Vec<Recipe> {
        self.emit(KitchenEvent::PlanStarted { mode });
        match self.try_generate(inventory, restrictions, kid_ages, mode) {
            Ok(recipes) => recipes,
            Err(err) => {
                self.pipeline_error("plan", &err);
                Vec::new()
            }
        }
    }

    fn try_generate(
        &mut self,
        inventory: &Inventory,
        restrictions: &[DietaryRestriction],
        kid_ages: &[u32],
        mode: GenerationMode,
    ) -> Result<Vec<Recipe>> {
        let Some(chat) = self.chat.as_deref() else {
            return Ok(Vec::new());
        };
        let prompt = prompts::plan_prompt(inventory, restrictions, kid_ages, mode);
        let schema = plan_response_schema();
        let raw = chat.complete(&ChatRequest {
            prompt: &prompt,
            image: None,
            schema: Some(&schema),
        })?;
        let parsed = recipe_records_from_response(&raw);
        self.emit(KitchenEvent::PlanCompleted {
            mode,
            accepted: parsed.recipes.len(),
            rejected: parsed.rejected,
        });
        Ok(materialize_recipes(parsed.recipes, mode, self.tokens.as_mut()))
    }

    /// Narrate one cooking step. Failure is an event, never an error.
    pub fn speak_step(&self, step: &str) {
        let line = prompts::narration_line(step);
        self.emit(KitchenEvent::NarrationStarted {
            backend: self.speech.name().to_string(),
        });
        match self.speech.speak(&line) {
            Ok(()) => self.emit(KitchenEvent::NarrationFinished),
            Err(err) => self.emit(KitchenEvent::NarrationFailed {
                reason: format!("{err:#}"),
            }),
        }
    }

    fn pipeline_error(&self, operation: &str, err: &anyhow::Error) {
        self.emit(KitchenEvent::PipelineError {
            operation: operation.to_string(),
            reason: format!("{err:#}"),
        });
    }

    // Event-log trouble must not take an otherwise-successful operation
    // down with it.
    fn emit(&self, event: KitchenEvent) {
        let _ = self.events.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use larder_contracts::events::EventWriter;
    use larder_contracts::inventory::{Inventory, KitchenLocation, PreviewImage};
    use larder_contracts::recipes::GenerationMode;
    use serde_json::{json, Value};

    use super::{
        extract_chat_message_text, extract_gemini_text, materialize_recipes,
        resolve_chat_backend, ChatBackend, ChatRequest, KitchenEngine, NoopSpeech,
        ProviderConfig, SequentialTokenSource,
    };

    struct CannedChat {
        reply: Result<String, String>,
    }

    impl ChatBackend for CannedChat {
        fn name(&self) -> &str {
            "canned"
        }

        fn complete(&self, _request: &ChatRequest<'_>) -> anyhow::Result<String> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(reason) => anyhow::bail!("{reason}"),
            }
        }
    }

    fn engine_with_reply(
        temp: &tempfile::TempDir,
        reply: Option<Result<String, String>>,
    ) -> KitchenEngine {
        let events = EventWriter::new(temp.path().join("events.jsonl"), "test-session");
        KitchenEngine::with_backends(
            reply.map(|reply| Box::new(CannedChat { reply }) as Box<dyn ChatBackend>),
            Box::new(NoopSpeech),
            events,
            Box::new(SequentialTokenSource::new()),
        )
    }

    fn recipe_batch_json() -> String {
        json!([
            {
                "id": "r-1",
                "title": "Frikkadels",
                "difficulty": "Quick Win",
                "prepTime": "20 min",
                "kidFriendlyReason": "Bite-sized.",
                "ingredients": [
                    {"name": "beef mince", "isAvailable": true},
                    {"name": "breadcrumbs", "isAvailable": false}
                ],
                "steps": ["Mix", "Fry"]
            },
            {
                "id": "r-2",
                "title": "Pizza scrolls",
                "difficulty": "Staple",
                "prepTime": "25 min",
                "kidFriendlyReason": "Hand-sized.",
                "ingredients": [{"name": "flour", "isAvailable": true}],
                "steps": ["Roll", "Bake"]
            }
        ])
        .to_string()
    }

    #[test]
    fn resolver_prefers_chat_completion_credential() {
        let config = ProviderConfig {
            openai_api_key: Some("sk-test".to_string()),
            gemini_api_key: Some("g-test".to_string()),
            ..ProviderConfig::default()
        };
        let backend = resolve_chat_backend(&config).expect("backend");
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn resolver_falls_back_to_structured_generation_credential() {
        let config = ProviderConfig {
            gemini_api_key: Some("g-test".to_string()),
            ..ProviderConfig::default()
        };
        let backend = resolve_chat_backend(&config).expect("backend");
        assert_eq!(backend.name(), "gemini");
    }

    #[test]
    fn resolver_yields_nothing_without_credentials() {
        assert!(resolve_chat_backend(&ProviderConfig::default()).is_none());
    }

    #[test]
    fn response_schemas_mirror_the_wire_contract() {
        let scan = super::scan_response_schema();
        assert_eq!(scan["type"], json!("ARRAY"));
        assert_eq!(scan["items"]["type"], json!("STRING"));

        let plan = super::plan_response_schema();
        let required = plan["items"]["required"].as_array().expect("required");
        for field in [
            "id",
            "title",
            "difficulty",
            "prepTime",
            "ingredients",
            "kidFriendlyReason",
        ] {
            assert!(required.contains(&json!(field)), "missing {field}");
        }
        assert_eq!(
            plan["items"]["properties"]["difficulty"]["enum"],
            json!(["Quick Win", "Staple", "Weekend Project"])
        );
    }

    #[test]
    fn pipeline_requests_carry_response_schemas() {
        use std::sync::{Arc, Mutex};

        struct RecordingChat {
            schemas: Arc<Mutex<Vec<bool>>>,
        }

        impl ChatBackend for RecordingChat {
            fn name(&self) -> &str {
                "recording"
            }

            fn complete(&self, request: &ChatRequest<'_>) -> anyhow::Result<String> {
                self.schemas
                    .lock()
                    .expect("lock")
                    .push(request.schema.is_some());
                Ok("[]".to_string())
            }
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let schemas = Arc::new(Mutex::new(Vec::new()));
        let events = EventWriter::new(temp.path().join("events.jsonl"), "test-session");
        let mut engine = KitchenEngine::with_backends(
            Some(Box::new(RecordingChat {
                schemas: Arc::clone(&schemas),
            })),
            Box::new(NoopSpeech),
            events,
            Box::new(SequentialTokenSource::new()),
        );

        engine.generate_recipes(&Inventory::new(), &[], &[], GenerationMode::Standard);
        let photo = PreviewImage {
            mime: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        };
        engine.scan_image(KitchenLocation::Fridge, &photo);

        assert_eq!(*schemas.lock().expect("lock"), vec![true, true]);
    }

    #[test]
    fn generate_is_empty_when_no_backend_is_configured() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_with_reply(&temp, None);
        let recipes = engine.generate_recipes(
            &Inventory::new(),
            &[],
            &[],
            GenerationMode::Standard,
        );
        assert!(recipes.is_empty());
    }

    #[test]
    fn generate_resolves_empty_on_backend_failure_and_logs_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_with_reply(&temp, Some(Err("connection reset".to_string())));
        let recipes = engine.generate_recipes(
            &Inventory::new(),
            &[],
            &[4],
            GenerationMode::Standard,
        );
        assert!(recipes.is_empty());

        let log = fs::read_to_string(temp.path().join("events.jsonl")).expect("events");
        let errors: Vec<Value> = log
            .lines()
            .map(|line| serde_json::from_str(line).expect("event json"))
            .filter(|event: &Value| event["type"] == json!("pipeline_error"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["operation"], json!("plan"));
    }

    #[test]
    fn generate_resolves_empty_on_unparsable_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_with_reply(&temp, Some(Ok("no json here".to_string())));
        let recipes = engine.generate_recipes(
            &Inventory::new(),
            &[],
            &[],
            GenerationMode::Standard,
        );
        assert!(recipes.is_empty());
    }

    #[test]
    fn lunchbox_mode_stamps_every_recipe() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_with_reply(&temp, Some(Ok(recipe_batch_json())));
        let recipes = engine.generate_recipes(
            &Inventory::new(),
            &[],
            &[],
            GenerationMode::Lunchbox,
        );
        assert_eq!(recipes.len(), 2);
        assert!(recipes.iter().all(|recipe| recipe.is_lunchbox));
    }

    #[test]
    fn standard_mode_leaves_lunchbox_unset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_with_reply(&temp, Some(Ok(recipe_batch_json())));
        let recipes = engine.generate_recipes(
            &Inventory::new(),
            &[],
            &[],
            GenerationMode::Standard,
        );
        assert!(recipes.iter().all(|recipe| !recipe.is_lunchbox));
    }

    #[test]
    fn availability_flags_pass_through_materialization() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut inventory = Inventory::new();
        // The local inventory disagrees with the provider on purpose; the
        // provider's judgment must win.
        inventory.add_item(KitchenLocation::Pantry, "breadcrumbs");
        let mut engine = engine_with_reply(&temp, Some(Ok(recipe_batch_json())));
        let recipes = engine.generate_recipes(&inventory, &[], &[], GenerationMode::Standard);
        let frikkadels = &recipes[0];
        assert!(frikkadels.ingredients[0].is_available);
        assert!(!frikkadels.ingredients[1].is_available);
    }

    #[test]
    fn materializer_tokens_come_from_the_injected_source() {
        let records: Vec<_> = serde_json::from_str(&recipe_batch_json()).expect("records");
        let mut tokens = SequentialTokenSource::new();
        let recipes = materialize_recipes(records, GenerationMode::Lunchbox, &mut tokens);
        assert_eq!(
            recipes[0].image,
            "https://loremflickr.com/400/300/food,cooking,kids,lunchbox?lock=0"
        );
        assert_eq!(
            recipes[1].image,
            "https://loremflickr.com/400/300/food,cooking,kids,lunchbox?lock=1"
        );
    }

    #[test]
    fn scan_resolves_empty_without_backend_or_on_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let photo = PreviewImage {
            mime: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        };

        let engine = engine_with_reply(&temp, None);
        assert!(engine.scan_image(KitchenLocation::Fridge, &photo).is_empty());

        let engine = engine_with_reply(&temp, Some(Err("timeout".to_string())));
        assert!(engine.scan_image(KitchenLocation::Fridge, &photo).is_empty());
    }

    #[test]
    fn scan_parses_prose_wrapped_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = engine_with_reply(
            &temp,
            Some(Ok("Sure! Here you go: [\"eggs\", \"milk\"]".to_string())),
        );
        let photo = PreviewImage {
            mime: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        };
        assert_eq!(
            engine.scan_image(KitchenLocation::Fridge, &photo),
            vec!["eggs", "milk"]
        );
    }

    #[test]
    fn speak_step_never_errors_and_logs_the_outcome() {
        struct FailingSpeech;
        impl super::SpeechBackend for FailingSpeech {
            fn name(&self) -> &str {
                "failing"
            }
            fn speak(&self, _text: &str) -> anyhow::Result<()> {
                anyhow::bail!("no audio device")
            }
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let events = EventWriter::new(temp.path().join("events.jsonl"), "test-session");
        let engine = KitchenEngine::with_backends(
            None,
            Box::new(FailingSpeech),
            events,
            Box::new(SequentialTokenSource::new()),
        );
        engine.speak_step("Boil the pasta.");

        let log = fs::read_to_string(temp.path().join("events.jsonl")).expect("events");
        assert!(log.contains("narration_failed"));
        assert!(log.contains("no audio device"));
    }

    #[test]
    fn chat_text_extraction_handles_string_and_chunked_content() {
        let plain = json!({
            "choices": [{ "message": { "content": " [\"eggs\"] " } }]
        });
        assert_eq!(extract_chat_message_text(&plain), "[\"eggs\"]");

        let chunked = json!({
            "choices": [{ "message": { "content": [
                { "type": "text", "text": "[\"eg" },
                { "type": "text", "text": "gs\"]" }
            ]}}]
        });
        assert_eq!(extract_chat_message_text(&chunked), "[\"eggs\"]");
        assert_eq!(extract_chat_message_text(&json!({})), "");
    }

    #[test]
    fn gemini_text_extraction_joins_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[\"mi" }, { "text": "lk\"]" }] }
            }]
        });
        assert_eq!(extract_gemini_text(&payload), "[\"milk\"]");
        assert_eq!(extract_gemini_text(&json!({})), "");
    }
}
