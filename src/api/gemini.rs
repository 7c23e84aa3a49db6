use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http_client::create_api_client;
use crate::error::{HarvestError, Result};
use crate::summary::{decode_summary, response_schema, BillSummary, Summarizer, SYSTEM_PROMPT};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.text)
    }
}

/// Gemini `generateContent` client producing [`BillSummary`] values.
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout_secs: u64) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(HarvestError::NoApiKey);
        }
        let http_client = create_api_client(timeout_secs, concat!("vozcivica/", env!("CARGO_PKG_VERSION")))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(&self, text: &str) -> Result<BillSummary> {
        if text.trim().is_empty() {
            return Err(HarvestError::InvalidInput("no text to summarize".to_string()));
        }

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: SYSTEM_PROMPT }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        info!("Requesting summary from {} ({} chars)", self.model, text.len());
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(HarvestError::RateLimit);
        }
        if status.is_server_error() {
            return Err(HarvestError::ServerError(format!("Gemini returned status {}", status)));
        }
        if !status.is_success() {
            let url = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            debug!("Gemini error body: {}", body);
            return Err(HarvestError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let payload: GenerateResponse = response.json().await?;
        let answer = payload
            .first_text()
            .ok_or_else(|| HarvestError::SummaryDecode("response has no candidate text".to_string()))?;
        decode_summary(&answer)
    }
}
