use crate::config::{ConfigError, ServerConfig};
use crate::pipeline::{Pipeline, PipelineError};
use crate::rewrite::{LinkRewriter, URL_PARAM};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use url::Url;

/// Path of the browse entry point that rewritten links call back into
pub const BROWSE_PATH: &str = "/browse";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>WebSim Explorer</title>
<style>
body { font-family: sans-serif; max-width: 40rem; margin: 4rem auto; }
form { display: flex; gap: .5rem; }
input[type=url] { flex: 1; padding: .5rem; }
</style>
</head>
<body>
<h1>WebSim Explorer</h1>
<p>Enter any URL. The page behind it is imagined on the spot, and every link on it leads somewhere new.</p>
<form action="/browse" method="get">
<input type="url" name="url" placeholder="https://example.com/" required>
<button type="submit">Go</button>
</form>
</body>
</html>
"#;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    public_entry_point: Option<Url>,
    fallback_entry_point: Url,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: &ServerConfig) -> Result<Self, ConfigError> {
        let public_entry_point = config
            .public_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .and_then(|base| base.join(BROWSE_PATH.trim_start_matches('/')))
                    .map_err(|_| ConfigError::PublicUrl(raw.to_string()))
            })
            .transpose()?;

        let fallback = format!("http://localhost:{}{}", config.port, BROWSE_PATH);
        let fallback_entry_point =
            Url::parse(&fallback).map_err(|_| ConfigError::PublicUrl(fallback))?;

        Ok(Self {
            pipeline,
            public_entry_point,
            fallback_entry_point,
        })
    }

    /// Absolute URL of the browse endpoint as seen by the client
    fn entry_point(&self, headers: &HeaderMap) -> Url {
        if let Some(url) = &self.public_entry_point {
            return url.clone();
        }

        let Some(authority) = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
        else {
            return self.fallback_entry_point.clone();
        };
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .filter(|proto| *proto == "https")
            .unwrap_or("http");

        match Url::parse(&format!("{}://{}{}", scheme, authority, BROWSE_PATH)) {
            Ok(url) => url,
            Err(_) => {
                ::log::warn!("Ignoring unusable Host header {:?}", authority);
                self.fallback_entry_point.clone()
            }
        }
    }
}

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(BROWSE_PATH, get(browse))
        .with_state(state)
}

/// Binds the listener and serves until the process is stopped
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    ::log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn browse(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let rewriter = LinkRewriter::new(state.entry_point(&headers));

    // Repeated parameters are tolerated; the first `url` wins
    let url = params
        .iter()
        .find(|(name, _)| name == URL_PARAM)
        .map(|(_, value)| value.as_str());

    match state.pipeline.browse(url, &rewriter).await {
        Ok(page) => Html(page.processed_html).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
