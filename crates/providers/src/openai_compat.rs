//! OpenAI-compatible generation backend.
//!
//! Works with: OpenAI, Azure OpenAI, OpenRouter, Ollama, vLLM and any
//! endpoint exposing `/chat/completions` and `/embeddings`.
//!
//! A skill invocation renders the skill's prompt template with the call's
//! arguments and sends it as a single user message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_config::OpenAiConfig;
use switchyard_core::error::GenerationError;
use switchyard_core::provider::{Embedder, GenerationBackend};
use switchyard_core::skill::{SkillArguments, SkillLibrary, SkillSettings};
use tracing::{debug, warn};

/// Azure OpenAI REST api-version used for deployment URLs.
const AZURE_API_VERSION: &str = "2024-06-01";

/// How requests authenticate and address models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    /// `Authorization: Bearer` and `model` in the body
    OpenAi,
    /// `api-key` header and the model as a deployment in the URL
    Azure,
}

/// An OpenAI-compatible generation backend.
pub struct OpenAiBackend {
    name: String,
    base_url: String,
    api_key: String,
    flavor: Flavor,
    chat_model: String,
    embedding_model: String,
    defaults: SkillSettings,
    skills: SkillLibrary,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend for a plain OpenAI-compatible endpoint.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        skills: SkillLibrary,
    ) -> Result<Self, GenerationError> {
        let client = build_client(Duration::from_secs(120))?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            flavor: Flavor::OpenAi,
            chat_model: chat_model.into(),
            embedding_model: "text-embedding-3-large".into(),
            defaults: SkillSettings::default(),
            skills,
            client,
        })
    }

    /// Build from configuration. Endpoints containing `.azure` use the
    /// Azure deployment URL shape and `api-key` header.
    pub fn from_config(config: &OpenAiConfig, skills: SkillLibrary) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GenerationError::NotConfigured("no OpenAI API key configured".into()))?;

        let flavor = if config.is_azure() { Flavor::Azure } else { Flavor::OpenAi };
        let client = build_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            name: match flavor {
                Flavor::Azure => "azure".into(),
                Flavor::OpenAi => "openai".into(),
            },
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            flavor,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            defaults: SkillSettings {
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_tokens,
            },
            skills,
            client,
        })
    }

    /// Use a different embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn url(&self, operation: &str, model: &str) -> String {
        match self.flavor {
            Flavor::OpenAi => format!("{}/{}", self.base_url, operation),
            Flavor::Azure => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                self.base_url, model, operation, AZURE_API_VERSION
            ),
        }
    }

    fn chat_body(&self, prompt: String, settings: &SkillSettings) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [ApiMessage { role: "user".into(), content: Some(prompt) }],
            "temperature": settings.temperature,
            "top_p": settings.top_p,
            "max_tokens": settings.max_tokens,
        });
        if self.flavor == Flavor::OpenAi {
            body["model"] = serde_json::json!(self.chat_model);
        }
        body
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response, GenerationError> {
        let request = self.client.post(url).header("Content-Type", "application/json");
        let request = match self.flavor {
            Flavor::OpenAi => request.header("Authorization", format!("Bearer {}", self.api_key)),
            Flavor::Azure => request.header("api-key", &self.api_key),
        };

        let response = request.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(e.to_string())
            } else {
                GenerationError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(GenerationError::RateLimited { retry_after_secs: 5 });
        }

        if status == 401 || status == 403 {
            return Err(GenerationError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(backend = %self.name, status, body = %error_body, "Backend returned error");
            return Err(GenerationError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("failed to create HTTP client: {e}")))
}

/// Pull the generated text out of a chat completion.
fn extract_text(response: ApiResponse) -> Result<String, GenerationError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::MalformedResponse("No choices in response".into()))?;

    choice
        .message
        .content
        .ok_or_else(|| GenerationError::MalformedResponse("Choice has no content".into()))
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, skill: &str, args: &SkillArguments) -> Result<String, GenerationError> {
        let skill = self
            .skills
            .get(skill)
            .ok_or_else(|| GenerationError::UnknownSkill(skill.to_string()))?;

        let settings = skill.settings.as_ref().unwrap_or(&self.defaults);
        let body = self.chat_body(skill.render(args), settings);
        let url = self.url("chat/completions", &self.chat_model);

        debug!(backend = %self.name, skill = %skill.name, model = %self.chat_model, "Invoking skill");

        let response = self.post(&url, &body).await?;
        let api_response: ApiResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        extract_text(api_response)
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        if self.flavor == Flavor::Azure {
            return Ok(true);
        }
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Embedder for OpenAiBackend {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, GenerationError> {
        let url = self.url("embeddings", &self.embedding_model);

        let mut body = serde_json::json!({
            "input": inputs,
            "encoding_format": "float",
        });
        if self.flavor == Flavor::OpenAi {
            body["model"] = serde_json::json!(self.embedding_model);
        }

        debug!(
            backend = %self.name,
            model = %self.embedding_model,
            count = inputs.len(),
            "Sending embedding request"
        );

        let response = self.post(&url, &body).await?;
        let api_resp: EmbeddingApiResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Failed to parse embedding response: {e}"))
        })?;

        if api_resp.data.len() != inputs.len() {
            return Err(GenerationError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                api_resp.data.len()
            )));
        }

        Ok(api_resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

// --- API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
