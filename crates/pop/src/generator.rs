//! Content generation from a prompt.
//!
//! Generate mode lets a user produce the content they register from the
//! prompt itself. The generator reports which model answered, and that model
//! and version end up in the proof metadata.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::error::{ClientError, Result};

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_GEMINI_MODEL_VERSION: &str = "2.0";

/// Text produced for a prompt, and who produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub content: String,
    pub model: String,
    pub model_version: String,
}

/// Produces content from a prompt.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedContent>;
}

/// Build the generator selected by `config`, if any.
pub fn build_content_generator(config: &GeneratorConfig) -> Result<Option<Arc<dyn ContentGenerator>>> {
    config.validate()?;
    match config {
        GeneratorConfig::Disabled => Ok(None),
        GeneratorConfig::Gemini {
            endpoint,
            model,
            model_version,
            api_key,
            timeout,
        } => {
            let api_key = api_key
                .clone()
                .ok_or_else(|| ClientError::Config("missing gemini api key".into()))?;
            let generator = GeminiGenerator::new(endpoint.clone(), api_key, *timeout)?
                .with_model(model.clone(), model_version.clone());
            Ok(Some(Arc::new(generator)))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Google Gemini `generateContent` client.
pub struct GeminiGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    model_version: String,
}

impl GeminiGenerator {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            model_version: DEFAULT_GEMINI_MODEL_VERSION.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, version: impl Into<String>) -> Self {
        self.model = model.into();
        self.model_version = version.into();
        self
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedContent> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "Unknown error".to_string());

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(ClientError::Network(format!("gemini {}: {}", status, message)));
            }
            return Err(ClientError::Generation(format!("Gemini API error: {}", message)));
        }

        let parsed = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ClientError::Generation(format!("unreadable gemini response: {}", e)))?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ClientError::Generation("no content generated".into()))?;

        info!(model = %self.model, chars = content.chars().count(), "generated content");
        Ok(GeneratedContent {
            content,
            model: self.model.clone(),
            model_version: self.model_version.clone(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the same content for every prompt and remembers the prompts.
pub struct FixedGenerator {
    output: GeneratedContent,
    prompts: Mutex<Vec<String>>,
}

impl FixedGenerator {
    pub fn new(content: impl Into<String>, model: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            output: GeneratedContent {
                content: content.into(),
                model: model.into(),
                model_version: model_version.into(),
            },
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for FixedGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedContent> {
        self.prompts
            .lock()
            .map_err(|_| ClientError::Generation("generator lock poisoned".into()))?
            .push(prompt.to_string());
        debug!(prompt_chars = prompt.chars().count(), "fixed generator answered");
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::serve;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[derive(Clone, Default)]
    struct Seen {
        keys: Arc<Mutex<Vec<String>>>,
        bodies: Arc<Mutex<Vec<Value>>>,
    }

    async fn answer(
        axum::extract::State(seen): axum::extract::State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        seen.keys.lock().unwrap().push(key);
        seen.bodies.lock().unwrap().push(body);
        Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Roses are red." }] } }]
        }))
    }

    #[tokio::test]
    async fn test_gemini_request_and_answer() {
        let seen = Seen::default();
        let app = Router::new()
            .route("/models/{call}", post(answer))
            .with_state(seen.clone());
        let base = serve(app).await;

        let generator = GeminiGenerator::new(format!("{}/models", base), "key-123", Duration::from_secs(5))
            .unwrap();
        let generated = generator.generate("write a poem").await.unwrap();

        assert_eq!(generated.content, "Roses are red.");
        assert_eq!(generated.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(generated.model_version, DEFAULT_GEMINI_MODEL_VERSION);
        assert_eq!(seen.keys.lock().unwrap().as_slice(), ["key-123"]);

        let body = seen.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "write a poem");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[tokio::test]
    async fn test_gemini_url_names_the_model() {
        let app = Router::new().route(
            "/models/{call}",
            post(|axum::extract::Path(call): axum::extract::Path<String>| async move {
                Json(json!({ "candidates": [{ "content": { "parts": [{ "text": call }] } }] }))
            }),
        );
        let base = serve(app).await;

        let generator = GeminiGenerator::new(format!("{}/models/", base), "k", Duration::from_secs(5))
            .unwrap()
            .with_model("gemini-pro", "1.0");
        let generated = generator.generate("p").await.unwrap();

        assert_eq!(generated.content, "gemini-pro:generateContent");
        assert_eq!(generated.model_version, "1.0");
    }

    #[tokio::test]
    async fn test_gemini_empty_answer_is_generation_error() {
        let app = Router::new().route(
            "/models/{call}",
            post(|| async { Json(json!({ "candidates": [] })) }),
        );
        let base = serve(app).await;

        let generator = GeminiGenerator::new(format!("{}/models", base), "k", Duration::from_secs(5)).unwrap();
        let err = generator.generate("p").await.unwrap_err();
        assert!(matches!(err, ClientError::Generation(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_gemini_error_statuses() {
        let app = Router::new()
            .route(
                "/bad/{call}",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": { "message": "API key not valid" } })),
                    )
                }),
            )
            .route(
                "/busy/{call}",
                post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        let base = serve(app).await;

        let bad = GeminiGenerator::new(format!("{}/bad", base), "k", Duration::from_secs(5)).unwrap();
        match bad.generate("p").await.unwrap_err() {
            ClientError::Generation(message) => assert!(message.contains("API key not valid")),
            other => panic!("unexpected error: {}", other),
        }

        let busy = GeminiGenerator::new(format!("{}/busy", base), "k", Duration::from_secs(5)).unwrap();
        assert!(busy.generate("p").await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_fixed_generator_records_prompts() {
        let generator = FixedGenerator::new("output", "test-model", "0.1");
        let first = generator.generate("one").await.unwrap();
        generator.generate("two").await.unwrap();

        assert_eq!(first.content, "output");
        assert_eq!(first.model, "test-model");
        assert_eq!(generator.prompts(), vec!["one", "two"]);
    }

    #[test]
    fn test_build_respects_config() {
        assert!(build_content_generator(&GeneratorConfig::Disabled).unwrap().is_none());

        let keyless = GeneratorConfig::Gemini {
            endpoint: DEFAULT_GEMINI_ENDPOINT.into(),
            model: DEFAULT_GEMINI_MODEL.into(),
            model_version: DEFAULT_GEMINI_MODEL_VERSION.into(),
            api_key: None,
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(build_content_generator(&keyless), Err(ClientError::Config(_))));
        assert!(build_content_generator(&GeneratorConfig::gemini("key")).unwrap().is_some());
    }
}
