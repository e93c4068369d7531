use super::backend::{Backend, BackendError};
use crate::config::{ConfigError, GOOGLE_API_KEY_ENV, GoogleConfig};
use crate::prompt::GenerationRequest;
use crate::store::GenerationResult;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Direct request/response backend for the Google Generative Language API
pub struct GoogleBackend {
    client: Client,
    api_url: String,
    api_key: String,
    generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
    safety_settings: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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

impl GoogleBackend {
    pub fn new(config: &GoogleConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingCredential(GOOGLE_API_KEY_ENV))?;

        Ok(Self {
            client: super::build_client(config.timeout_secs, HeaderMap::new())?,
            api_url: config.api_url.clone(),
            api_key,
            generation: GenerationConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
                stop_sequences: Vec::new(),
            },
        })
    }
}

#[async_trait]
impl Backend for GoogleBackend {
    fn name(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, BackendError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: &request.instruction,
                }],
            }],
            generation_config: &self.generation,
            safety_settings: Vec::new(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_text(&text).map(GenerationResult::new)
    }
}

/// Pulls the first candidate's first text part out of a success body
fn extract_text(body: &str) -> Result<String, BackendError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::Protocol(format!("malformed response body: {}", e)))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| BackendError::Protocol("response has no candidate text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/v1beta/models/gemini-test:generateContent";

    fn backend(server_url: &str) -> GoogleBackend {
        GoogleBackend::new(&GoogleConfig {
            api_url: format!("{}{}", server_url, PATH),
            api_key: Some("test-key".to_string()),
            ..GoogleConfig::default()
        })
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            persona: "persona".to_string(),
            instruction: "Generate a complete HTML page for https://a.test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_extracts_first_part() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{"text": "Generate a complete HTML page for https://a.test"}]}],
                "generationConfig": {
                    "temperature": 0.7,
                    "topK": 1,
                    "topP": 1.0,
                    "maxOutputTokens": 2048,
                    "stopSequences": []
                },
                "safetySettings": []
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"<html>first</html>"},{"text":"second"}]}}]}"#,
            )
            .create_async()
            .await;

        let result = backend(&server.url()).generate(&request()).await.unwrap();
        assert_eq!(result.raw_html, "<html>first</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = backend(&server.url()).generate(&request()).await.unwrap_err();
        match err {
            BackendError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"OTHER"}}"#)
            .create_async()
            .await;

        let err = backend(&server.url()).generate(&request()).await.unwrap_err();
        assert!(matches!(err, BackendError::Protocol(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let err = backend("http://127.0.0.1:1")
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {:?}", err);
    }

    #[test]
    fn test_extract_text_shapes() {
        assert!(matches!(extract_text("not json"), Err(BackendError::Protocol(_))));
        assert!(matches!(
            extract_text(r#"{"candidates":[]}"#),
            Err(BackendError::Protocol(_))
        ));
        assert!(matches!(
            extract_text(r#"{"candidates":[{"content":{"parts":[]}}]}"#),
            Err(BackendError::Protocol(_))
        ));
        assert_eq!(
            extract_text(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#).unwrap(),
            "ok"
        );
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let result = GoogleBackend::new(&GoogleConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential(GOOGLE_API_KEY_ENV))
        ));
    }
}
