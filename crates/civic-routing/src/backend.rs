//! Chat-completions seam used by the classifier.
//!
//! The HTTP backend speaks the OpenAI-compatible `/chat/completions` shape and
//! blocks the caller until the service answers or fails. A disabled backend
//! always errors, which sends every classification down the keyword path.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI backend is disabled")]
    Disabled,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("empty reply from AI service")]
    EmptyReply,
    #[error("malformed AI reply: {0}")]
    MalformedReply(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user turn carrying a prompt and a base64 JPEG as a data URL.
    pub fn user_with_image(text: impl Into<String>, image_base64: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{image_base64}"),
                    },
                },
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Ask the service for a bare JSON object.
    pub json_reply: bool,
}

pub trait ChatBackend: Send + Sync {
    /// Sends one chat request and returns the text of the first choice.
    fn chat(&self, request: &ChatRequest) -> Result<String, AiError>;
}

pub struct DisabledBackend;

impl ChatBackend for DisabledBackend {
    fn chat(&self, _request: &ChatRequest) -> Result<String, AiError> {
        Err(AiError::Disabled)
    }
}

pub struct HttpChatBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpChatBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if request.json_reply {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

impl ChatBackend for HttpChatBackend {
    fn chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .map_err(|e| AiError::Http(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AiError::Http(format!("HTTP {status}: {body}")));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| AiError::Http(format!("failed to parse response: {e}")))?;

        let text = response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AiError::EmptyReply);
        }
        Ok(text.to_string())
    }
}

/// Picks the backend for a configuration. A disabled config or a missing API
/// key yields [`DisabledBackend`].
pub fn backend_from_config(config: &AiConfig) -> Box<dyn ChatBackend> {
    if !config.enabled {
        info!("AI routing disabled by configuration");
        return Box::new(DisabledBackend);
    }
    match env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Box::new(HttpChatBackend::new(
            config.base_url.clone(),
            config.model.clone(),
            key,
        )),
        _ => {
            info!(
                env = %config.api_key_env,
                "no API key set, AI routing falls back to keywords"
            );
            Box::new(DisabledBackend)
        }
    }
}
