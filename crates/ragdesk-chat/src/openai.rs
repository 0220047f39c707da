use std::time::Duration;

use ragdesk_core::config::GenerationSettings;
use ragdesk_core::traits::GenerationService;
use ragdesk_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Generation client for any OpenAI-compatible `/chat/completions` endpoint
/// (llama.cpp server, vLLM, Ollama, hosted APIs).
pub struct OpenAiCompatClient {
    endpoint: String,
    model_name: String,
    api_key: Option<String>,
    default_max_tokens: u32,
    default_temperature: f64,
    http_client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, model_name: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::upstream("generation", e))?;
        Ok(Self {
            endpoint: chat_endpoint(base_url),
            model_name: model_name.to_string(),
            api_key,
            default_max_tokens: 512,
            default_temperature: 0.2,
            http_client,
        })
    }

    /// Builds the client from settings; the API key, if any, is read from the
    /// environment variable named by `api_key_env`.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = match &settings.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                Error::InvalidConfig(format!("generation.api_key_env names '{var}', which is not set"))
            })?),
            None => None,
        };
        let mut client = Self::new(
            &settings.base_url,
            &settings.model,
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )?;
        client.default_max_tokens = settings.max_tokens;
        client.default_temperature = settings.temperature;
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            max_tokens: Some(self.default_max_tokens),
            temperature: Some(self.default_temperature),
        }
    }
}

impl GenerationService for OpenAiCompatClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        debug!(prompt = %prompt, "generation prompt");
        let mut req = self.http_client.post(&self.endpoint).json(&self.request(prompt));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().map_err(|e| {
            error!(endpoint = %self.endpoint, "generation request failed: {e}");
            Error::upstream("generation", e)
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(Error::upstream("generation", format!("API error ({status}): {body}")));
        }

        let response: ChatResponse = resp.json().map_err(|e| Error::upstream("generation", e))?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
