//! Answer generation against an external model server.
//!
//! Defines the [`Generator`] trait and [`ChatCompletionsGenerator`], which
//! calls an OpenAI-compatible `chat/completions` endpoint (Ollama exposes one
//! at `http://localhost:11434/v1/chat/completions`).
//!
//! # Request / Response
//!
//! ```json
//! // request
//! { "model": "qwen2.5:0.5b", "messages": [{ "role": "user", "content": "<prompt>" }] }
//! // response (only this path is read)
//! { "choices": [{ "message": { "content": "<answer>" } }] }
//! ```
//!
//! One round trip per call: no retry, no streaming. The client carries a
//! request timeout and a connect timeout from `[generation]`, so an
//! unreachable server fails instead of hanging.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;

/// Failure modes of a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Network failure, timeout, non-2xx status, or undecodable body.
    #[error("error querying model: {0}")]
    Transport(String),
    /// The response envelope has no usable answer.
    #[error("model response does not contain a valid answer")]
    EmptyResponse,
}

/// Produces an answer for a fully assembled prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

/// [`Generator`] backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsGenerator {
    /// Builds the HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_key_env` names an unset variable or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match config.api_key_env.as_deref() {
            Some(var) => match std::env::var(var) {
                Ok(key) => Some(key),
                Err(_) => bail!("{} environment variable not set", var),
            },
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            GenerationError::Transport(format!(
                "connection error (is the model server running at {}?): {}",
                self.url, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Transport(format!(
                "model server returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("invalid response body: {}", e)))?;

        parse_chat_response(&json)
    }
}

/// Extracts `choices[0].message.content`, rejecting missing or blank answers.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .ok_or(GenerationError::EmptyResponse)
}
