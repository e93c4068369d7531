//! Streaming OpenAI-compatible chat completion backends (LM Studio, OpenRouter)
//!
//! Both speak the same SSE format:
//! - `data: {"choices":[{"delta":{"content":"..."}}]}` for text fragments
//! - `data: [DONE]` to signal stream end
//!
//! Fragments are accumulated into one document before `generate` returns. A
//! stream that closes before `[DONE]` or a `finish_reason` is a transport failure.

use super::backend::{Backend, BackendError};
use crate::config::{ConfigError, LmStudioConfig, OPENROUTER_API_KEY_ENV, OpenRouterConfig};
use crate::prompt::GenerationRequest;
use crate::store::GenerationResult;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

/// Chat completion backend that drains a streamed response
pub struct ChatBackend {
    name: &'static str,
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    /// Some providers report mid-stream failures in-band
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

impl ChatBackend {
    /// Backend for a locally running LM Studio server
    pub fn lmstudio(config: &LmStudioConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: "lmstudio",
            client: super::build_client(config.timeout_secs, HeaderMap::new())?,
            endpoint: completions_url(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Backend for OpenRouter, with attribution headers on every call
    pub fn openrouter(config: &OpenRouterConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential(OPENROUTER_API_KEY_ENV))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.referer)
                .map_err(|_| ConfigError::Header("HTTP-Referer"))?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.title).map_err(|_| ConfigError::Header("X-Title"))?,
        );

        Ok(Self {
            name: "openrouter",
            client: super::build_client(config.timeout_secs, headers)?,
            endpoint: completions_url(&config.base_url),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Backend for ChatBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.persona,
                },
                ChatMessage {
                    role: "user",
                    content: &request.instruction,
                },
            ],
            temperature: self.temperature,
            stream: true,
        };

        let builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);

        let mut event_source = EventSource::new(builder).map_err(|e| {
            BackendError::Transport(format!("failed to create event source: {}", e))
        })?;

        // Closed on every path so the event source never reconnects
        let outcome = drain(&mut event_source).await;
        event_source.close();

        let html = outcome?;
        ::log::debug!("{} stream complete: {} bytes", self.name, html.len());
        Ok(GenerationResult::new(html))
    }
}

/// Reads the stream to its end, accumulating content fragments
async fn drain(event_source: &mut EventSource) -> Result<String, BackendError> {
    let mut html = String::new();
    let mut finished = false;

    while let Some(event) = event_source.next().await {
        match event {
            Ok(Event::Open) => continue,
            Ok(Event::Message(message)) => {
                if message.data.trim() == "[DONE]" {
                    finished = true;
                    break;
                }
                finished |= append_chunk(&mut html, &message.data)?;
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        ::log::debug!("Failed to read error body for status {}: {}", status, e);
                        String::new()
                    }
                };
                return Err(BackendError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(reqwest_eventsource::Error::InvalidContentType(content_type, _)) => {
                return Err(BackendError::Protocol(format!(
                    "expected an event stream, got {:?}",
                    content_type
                )));
            }
            Err(e) => return Err(BackendError::Transport(format!("stream error: {}", e))),
        }
    }

    if !finished {
        return Err(BackendError::Transport(
            "stream ended before completion".to_string(),
        ));
    }
    Ok(html)
}

/// Parses one SSE payload and appends its content delta
///
/// Returns whether the chunk carried a `finish_reason`.
fn append_chunk(html: &mut String, data: &str) -> Result<bool, BackendError> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| BackendError::Protocol(format!("failed to parse stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(BackendError::Protocol(format!("provider error in stream: {}", error)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(false);
    };
    if let Some(content) = choice.delta.content {
        html.push_str(&content);
    }
    Ok(choice.finish_reason.is_some())
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
