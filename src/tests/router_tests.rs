use crate::backends::{Backend, BackendError};
use crate::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::prompt::{GenerationRequest, PromptBuilder};
use crate::server::{AppState, router};
use crate::store::{GenerationResult, PageStore};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::sync::Arc;
use tower::ServiceExt;

/// Answers every request with the same page, or the same failure
struct FixedBackend {
    reply: Result<&'static str, u16>,
}

#[async_trait]
impl Backend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResult, BackendError> {
        match self.reply {
            Ok(html) => Ok(GenerationResult::new(html)),
            Err(status) => Err(BackendError::Http {
                status,
                body: "upstream unavailable".to_string(),
            }),
        }
    }
}

fn app(reply: Result<&'static str, u16>, server: ServerConfig) -> (axum::Router, Arc<PageStore>) {
    let store = Arc::new(PageStore::new());
    let pipeline = Pipeline::new(
        PromptBuilder::default(),
        Arc::new(FixedBackend { reply }),
        Arc::clone(&store),
    );
    let state = AppState::new(Arc::new(pipeline), &server).unwrap();
    (router(state), store)
}

async fn get(app: axum::Router, uri: &str, host: Option<&str>) -> (StatusCode, Option<String>, String) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(host) = host {
        builder = builder.header(header::HOST, host);
    }
    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_browse_returns_rewritten_html() {
    let (app, store) = app(Ok(r#"<a href="c">next</a>"#), ServerConfig::default());

    let (status, content_type, body) = get(
        app,
        "/browse?url=https%3A%2F%2Fexample.test%2Fa%2Fb",
        Some("sim.local:5001"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(
        body.contains("http://sim.local:5001/browse?url=https%3A%2F%2Fexample.test%2Fa%2Fc"),
        "body was {}",
        body
    );
    assert_eq!(store.history("https://example.test/a/b").await.len(), 1);
}

#[tokio::test]
async fn test_public_url_overrides_host_header() {
    let server = ServerConfig {
        public_url: Some("https://web.sim.example/".to_string()),
        ..ServerConfig::default()
    };
    let (app, _) = app(Ok(r#"<a href="/x">x</a>"#), server);

    let (status, _, body) = get(app, "/browse?url=https://a.test/", Some("internal:5001")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("https://web.sim.example/browse?url=https%3A%2F%2Fa.test%2Fx"));
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let (app, store) = app(Ok("<p>unused</p>"), ServerConfig::default());

    let (status, _, body) = get(app, "/browse", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "No URL provided");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_invalid_url_is_bad_request() {
    let (app, _) = app(Ok("<p>unused</p>"), ServerConfig::default());

    let (status, _, body) = get(app, "/browse?url=just-some-words", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "Invalid URL format");
}

#[tokio::test]
async fn test_backend_failure_is_server_error() {
    let (app, store) = app(Err(500), ServerConfig::default());

    let (status, _, body) = get(app, "/browse?url=https://down.test/", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json["error"],
        "API request failed with status 500: upstream unavailable"
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_repeated_url_parameter_uses_first_value() {
    let (app, store) = app(Ok("<p>first</p>"), ServerConfig::default());

    let (status, _, body) = get(
        app,
        "/browse?url=https://a.test/&url=https://b.test/",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("first"));
    assert_eq!(store.history("https://a.test/").await.len(), 1);
    assert!(store.history("https://b.test/").await.is_empty());
}

#[tokio::test]
async fn test_links_fall_back_to_configured_port_without_host() {
    let server = ServerConfig {
        port: 6060,
        ..ServerConfig::default()
    };
    let (app, _) = app(Ok(r#"<a href="/x">x</a>"#), server);

    let (_, _, body) = get(app, "/browse?url=https://a.test/", None).await;

    assert!(body.contains("http://localhost:6060/browse?url="));
}

#[tokio::test]
async fn test_index_page_has_browse_form() {
    let (app, _) = app(Ok("<p>unused</p>"), ServerConfig::default());

    let (status, _, body) = get(app, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"action="/browse""#));
    assert!(body.contains(r#"name="url""#));
}
