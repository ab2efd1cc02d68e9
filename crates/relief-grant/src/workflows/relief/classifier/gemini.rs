use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::prompt::{build_prompt, response_schema, ClassifierPayload};
use super::{ClassifierError, ClassifierVerdict, EligibilityClassifier};
use crate::config::ClassifierConfig;
use crate::workflows::relief::evaluation::GrantPolicyConfig;

/// Gemini `generateContent` client returning schema-constrained eligibility verdicts.
#[derive(Clone)]
pub struct GeminiClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    policy: GrantPolicyConfig,
}

impl std::fmt::Debug for GeminiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClassifier")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiClassifier {
    pub fn new(config: &ClassifierConfig, policy: GrantPolicyConfig) -> Result<Self, ClassifierError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ClassifierError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| ClassifierError::Unavailable(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            policy,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body(&self, payload: &ClassifierPayload) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: build_prompt(payload, &self.policy),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }

    async fn send(&self, body: &GenerateContentRequest) -> Result<String, ClassifierError> {
        debug!(url = %self.url(), "sending eligibility request to Gemini");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        debug!(%status, "Gemini responded");

        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

fn transport_error(err: reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Unavailable(err.to_string())
    }
}

/// Pull the first text part out of a `generateContent` response body.
fn extract_text(raw: &str) -> Result<String, ClassifierError> {
    let response: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|err| ClassifierError::Malformed(err.to_string()))?;

    if let Some(usage) = &response.usage_metadata {
        info!(
            prompt_tokens = ?usage.prompt_token_count,
            response_tokens = ?usage.candidates_token_count,
            total_tokens = ?usage.total_token_count,
            "Gemini token usage"
        );
    }

    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text.filter(|text| !text.trim().is_empty()))
        .ok_or_else(|| ClassifierError::Malformed("response contained no text candidates".to_string()))
}

#[async_trait]
impl EligibilityClassifier for GeminiClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        payload: &ClassifierPayload,
    ) -> Result<ClassifierVerdict, ClassifierError> {
        let body = self.request_body(payload);
        let raw = self.send(&body).await?;
        let text = extract_text(&raw)?;
        ClassifierVerdict::parse(&text)
    }
}
