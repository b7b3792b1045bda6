//! # Generation Facade Module
//!
//! Boundary wrapper around the external AI backend (image + chat
//! completion, OpenAI-compatible endpoints) and the translation service.
//!
//! Every operation here is at-most-once and never retried: on any
//! failure the caller gets a [`GenerationError`] and decides whether to
//! ask the user to try again. Failures never escape as panics.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Chat-completion model used for `/text` requests.
pub const TEXT_MODEL: &str = "gpt-4";

/// Default base URL of the OpenAI-compatible generation backend.
pub const DEFAULT_API_BASE: &str = "http://localhost:1337";

/// Free translation endpoint, same one the translation SDK talks to.
const TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Per-request deadline applied at the facade boundary.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Image-generation model catalog: `(backend key, display name)`.
///
/// Ordered so that a two-column keyboard pairs them the way the model
/// menu lays them out, with the odd final model on its own row.
pub const MODELS: &[(&str, &str)] = &[
    ("flux", "Flux"),
    ("Prodia", "Prodia"),
    ("flux-pro", "Flux Pro"),
    ("stability-ai", "Stability AI"),
    ("flux-realism", "Flux Realism"),
    ("Pixart", "Pixart"),
    ("flux-3d", "Flux 3D"),
    ("PixartLCM", "Pixart LCM"),
    ("ProdiaStableDiffusionXL", "Prodia Stable Diffusion XL"),
];

/// Whether `key` names a model from the catalog.
pub fn is_known_model(key: &str) -> bool {
    MODELS.iter().any(|(k, _)| *k == key)
}

/// Display name for a catalog model, falling back to the raw key.
pub fn model_display_name(key: &str) -> &str {
    MODELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
        .unwrap_or(key)
}

/// Failure reasons for generation and translation calls.
///
/// Lets callers tell "try again" (timeout, network) apart from
/// "the backend rejected this request" (bad model name, refused prompt).
#[derive(Debug, Clone)]
pub enum GenerationError {
    /// The request did not complete within the facade deadline.
    Timeout,
    /// The backend answered with a non-success status.
    Backend(String),
    /// The request never reached the backend.
    Network(String),
    /// The backend answered but the response body was not understood.
    Parse(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Timeout => write!(f, "Generation request timed out"),
            GenerationError::Backend(msg) => write!(f, "Backend rejected request: {msg}"),
            GenerationError::Network(msg) => write!(f, "Network error: {msg}"),
            GenerationError::Parse(msg) => write!(f, "Unexpected backend response: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: String,
}

/// Client for the generation backend and the translation service.
pub struct GenerationClient {
    http: reqwest::Client,
    api_base: String,
}

impl GenerationClient {
    /// Create a client against the given OpenAI-compatible base URL.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Generate an image for `prompt` with the named model.
    ///
    /// Returns the URL of the generated image. At-most-once, no retry.
    pub async fn generate_image(
        &self,
        prompt: &str,
        model: &str,
    ) -> Result<String, GenerationError> {
        debug!(model, prompt_len = prompt.len(), "Requesting image generation");

        let body = json!({
            "model": model,
            "prompt": prompt,
            "response_format": "url",
        });

        let response = self
            .post_json(&format!("{}/v1/images/generations", self.api_base), &body)
            .await?;

        parse_image_response(&response)
    }

    /// Run a chat completion for `prompt` and return the reply text.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(prompt_len = prompt.len(), "Requesting chat completion");

        let body = json!({
            "model": TEXT_MODEL,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .post_json(&format!("{}/v1/chat/completions", self.api_base), &body)
            .await?;

        parse_chat_response(&response)
    }

    /// Translate `text` from `source` to `target` locale.
    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, GenerationError> {
        debug!(source, target, text_len = text.len(), "Requesting translation");

        let request = self
            .http
            .get(TRANSLATE_ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send();

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request)
            .await
            .map_err(|_| GenerationError::Timeout)?
            .map_err(map_request_error)?;

        let body = read_success_body(response).await?;
        parse_translation_response(&body)
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, GenerationError> {
        let request = self.http.post(url).json(body).send();

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request)
            .await
            .map_err(|_| {
                warn!(url, "Generation request hit the facade deadline");
                GenerationError::Timeout
            })?
            .map_err(map_request_error)?;

        read_success_body(response).await
    }
}

/// Map transport-level failures onto the error taxonomy.
fn map_request_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Network(err.to_string())
    }
}

/// Check the HTTP status and return the body of a successful response.
async fn read_success_body(response: reqwest::Response) -> Result<String, GenerationError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GenerationError::Network(e.to_string()))?;

    if status.is_success() {
        Ok(body)
    } else {
        warn!(%status, "Backend returned an error status");
        Err(GenerationError::Backend(format!(
            "status {status}: {}",
            body.chars().take(200).collect::<String>()
        )))
    }
}

fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::Parse("completion had no choices".to_string()))
}

fn parse_image_response(body: &str) -> Result<String, GenerationError> {
    let response: ImageResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    response
        .data
        .into_iter()
        .next()
        .map(|datum| datum.url)
        .ok_or_else(|| GenerationError::Parse("image response had no data".to_string()))
}

/// The translation endpoint answers with nested arrays; the translated
/// text is split across `[0][n][0]` segments.
fn parse_translation_response(body: &str) -> Result<String, GenerationError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    let segments = value
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| GenerationError::Parse("missing translation segments".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
        .collect();

    if translated.is_empty() {
        Err(GenerationError::Parse(
            "translation segments were empty".to_string(),
        ))
    } else {
        Ok(translated)
    }
}
