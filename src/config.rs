use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while assembling the startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingCredential(&'static str),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid public URL {0:?}")]
    PublicUrl(String),

    #[error("invalid header value for {0}")]
    Header(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Configuration for the Google Generative Language backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// generateContent endpoint
    #[serde(default = "default_google_api_url")]
    pub api_url: String,

    /// API key; read from `GOOGLE_AI_API_KEY` when absent
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds (none by default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Configuration for a locally hosted OpenAI-compatible server (LM Studio)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmStudioConfig {
    #[serde(default = "default_lmstudio_base_url")]
    pub base_url: String,

    #[serde(default = "default_lmstudio_api_key")]
    pub api_key: String,

    #[serde(default = "default_lmstudio_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Configuration for the OpenRouter chat completions API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// API key; read from `OPENROUTER_API_KEY` when absent
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_openrouter_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sent as `HTTP-Referer` on every call
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Sent as `X-Title` on every call
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Enum containing all backend configuration types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Direct HTTP JSON backend
    Google(GoogleConfig),

    /// Local streaming chat backend
    LmStudio(LmStudioConfig),

    /// Remote streaming chat backend
    OpenRouter(OpenRouterConfig),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Absolute base URL used for rewritten links; derived from the Host header when unset
    #[serde(default)]
    pub public_url: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Replaces the built-in persona when set
    #[serde(default)]
    pub persona: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            server: ServerConfig::default(),
            persona: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Fill missing credentials from the process environment
    pub fn resolve_credentials(&mut self) -> Result<(), ConfigError> {
        self.resolve_credentials_with(|key| std::env::var(key).ok())
    }

    /// Fill missing credentials using `lookup`, failing when one stays absent
    pub fn resolve_credentials_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &mut self.backend {
            BackendConfig::Google(cfg) => {
                cfg.api_key =
                    non_empty(cfg.api_key.take()).or_else(|| non_empty(lookup(GOOGLE_API_KEY_ENV)));
                if cfg.api_key.is_none() {
                    return Err(ConfigError::MissingCredential(GOOGLE_API_KEY_ENV));
                }
            }
            BackendConfig::LmStudio(_) => {}
            BackendConfig::OpenRouter(cfg) => {
                cfg.api_key =
                    non_empty(cfg.api_key.take()).or_else(|| non_empty(lookup(OPENROUTER_API_KEY_ENV)));
                if cfg.api_key.is_none() {
                    return Err(ConfigError::MissingCredential(OPENROUTER_API_KEY_ENV));
                }
            }
        }
        Ok(())
    }
}

impl BackendConfig {
    /// Short name used in logs and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Google(_) => "google",
            BackendConfig::LmStudio(_) => "lmstudio",
            BackendConfig::OpenRouter(_) => "openrouter",
        }
    }
}

/// Environment variable holding the Google API key
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_AI_API_KEY";

/// Environment variable holding the OpenRouter API key
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_backend() -> BackendConfig {
    BackendConfig::LmStudio(LmStudioConfig::default())
}

fn default_google_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro-latest:generateContent"
        .to_string()
}

fn default_lmstudio_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_lmstudio_api_key() -> String {
    "lm-studio".to_string()
}

fn default_lmstudio_model() -> String {
    "model-identifier".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openrouter_model() -> String {
    "google/gemini-2.0-flash-exp:free".to_string()
}

fn default_referer() -> String {
    "https://websim-local.devpod".to_string()
}

fn default_title() -> String {
    "WebSimAI".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    1
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_url: default_google_api_url(),
            api_key: None,
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: None,
        }
    }
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            base_url: default_lmstudio_base_url(),
            api_key: default_lmstudio_api_key(),
            model: default_lmstudio_model(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            api_key: None,
            model: default_openrouter_model(),
            temperature: default_temperature(),
            referer: default_referer(),
            title: default_title(),
            timeout_secs: None,
        }
    }
}
