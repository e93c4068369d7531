use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Raw output of exactly one backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub raw_html: String,
}

impl GenerationResult {
    pub fn new(raw_html: impl Into<String>) -> Self {
        Self {
            raw_html: raw_html.into(),
        }
    }
}

/// Append-only record of every page generated, keyed by the requested URL
#[derive(Debug, Default)]
pub struct PageStore {
    pages: RwLock<HashMap<String, Vec<GenerationResult>>>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a generation to the history of `url`
    pub async fn record(&self, url: &str, result: GenerationResult) {
        let mut pages = self.pages.write().await;
        let history = pages.entry(url.to_string()).or_default();
        history.push(result);
        ::log::debug!("Stored generation {} for {}", history.len(), url);
    }

    /// All generations for `url`, oldest first
    pub async fn history(&self, url: &str) -> Vec<GenerationResult> {
        let pages = self.pages.read().await;
        pages.get(url).cloned().unwrap_or_default()
    }

    /// Most recent generation for `url`
    pub async fn latest(&self, url: &str) -> Option<GenerationResult> {
        let pages = self.pages.read().await;
        pages.get(url).and_then(|history| history.last().cloned())
    }

    /// Number of distinct URLs recorded
    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }

    /// Total number of generations across all URLs
    pub async fn generation_count(&self) -> usize {
        self.pages.read().await.values().map(Vec::len).sum()
    }
}
