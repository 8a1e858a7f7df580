//! Ollama client - OpenAI-compatible chat completions
//!
//! Works against a local Ollama server or any server exposing
//! `/chat/completions`. Streaming is disabled; each request returns one reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::ports::outbound::{LlmPort, LlmRequest, LlmResponse, MessageRole};

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Response contained no message content")]
    EmptyResponse,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OllamaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }

    fn build_body(&self, request: &LlmRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: role_name(m.role).to_string(),
            content: m.content.clone(),
        }));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl LlmPort for OllamaClient {
    type Error = OllamaError;

    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, Self::Error> {
        let body = self.build_body(&request);
        let mut http = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let reply = completion.into_response(&self.model)?;
        debug!(tokens = reply.tokens_used, "Completion received");
        Ok(reply)
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

/// Reasoning models may leave `content` empty and answer in `reasoning_content`
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

impl ChatCompletionResponse {
    fn into_response(self, requested_model: &str) -> Result<LlmResponse, OllamaError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| {
                c.message
                    .content
                    .filter(|s| !s.trim().is_empty())
                    .or(c.message.reasoning_content)
            })
            .ok_or(OllamaError::EmptyResponse)?;
        Ok(LlmResponse {
            content,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            tokens_used: self.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}
