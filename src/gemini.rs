use crate::config::{optional, parse_or, required, Lookup};
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";
const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
const DEFAULT_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub generate_url: String,
    pub timeout: Duration,
}

// Keeps the API key out of logs
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("embeddings_url", &self.embeddings_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("generate_url", &self.generate_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    pub fn from_lookup(lookup: Lookup, timeout: Duration) -> Result<Self> {
        let api_key = required(lookup, "GEMINI_API_KEY")?;
        let embeddings_url = optional(lookup, "GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string());
        let embedding_model = optional(lookup, "GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        let generate_url = optional(lookup, "GEMINI_GENERATE_URL")
            .unwrap_or_else(|| DEFAULT_GENERATE_URL.to_string());
        let embedding_dimension =
            parse_or(lookup, "EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?;
        if embedding_dimension == 0 {
            return Err(RagError::Configuration(
                "EMBEDDING_DIMENSION must be greater than zero".to_string(),
            ));
        }

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            embedding_model,
            embedding_dimension,
            generate_url,
            timeout,
        })
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client with the configured per-request timeout
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(GeminiClient { config, client })
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Call `embedContent` and return the raw vector
    pub(crate) async fn embed_content(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            content: Content {
                parts: vec![Part { text }],
                role: None,
            },
        };

        let body = self
            .post(&self.config.embeddings_url, &request)
            .await
            .map_err(RagError::EmbeddingService)?;

        let response: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::EmbeddingService(format!("malformed response: {}", e)))?;
        response.into_values()
    }

    /// Call `generateContent` with a single user turn
    pub(crate) async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
                role: Some("user"),
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let body = self
            .post(&self.config.generate_url, &request)
            .await
            .map_err(RagError::CompletionService)?;

        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::CompletionService(format!("malformed response: {}", e)))?;
        response.into_text()
    }

    /// POST a JSON body and return the response text, or a description of the failure
    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        request: &T,
    ) -> std::result::Result<String, String> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = response.status();
        let body = response.text().await;

        if !status.is_success() {
            let body = body.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("API request failed: {} {}", status, body));
        }

        body.map_err(describe_transport_error)
    }
}

fn describe_transport_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        format!("request failed: {}", err)
    }
}

// Request/response structures for the Gemini REST API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: Option<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    #[serde(default)]
    values: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_values(self) -> Result<Vec<f32>> {
        match self.embedding {
            Some(data) if !data.values.is_empty() => Ok(data.values),
            _ => Err(RagError::EmbeddingService(
                "malformed response: missing embedding values".to_string(),
            )),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(RagError::CompletionBlocked(format!("prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RagError::CompletionBlocked("no candidates returned".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();
        let text = text.trim();

        if text.is_empty() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "unknown".to_string());
            return Err(RagError::CompletionBlocked(format!(
                "empty generation (finish reason: {})",
                reason
            )));
        }

        Ok(text.to_string())
    }
}
