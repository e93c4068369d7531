use crate::backends::{Backend, BackendError};
use crate::prompt::PromptBuilder;
use crate::rewrite::{LinkRewriter, RenderedPage};
use crate::store::PageStore;
use crate::target::{InvalidUrl, NavigationTarget};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a browse request produced no page
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("Invalid URL format")]
    InvalidUrl(#[from] InvalidUrl),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl PipelineError {
    /// Whether the caller, rather than the backend, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::MissingUrl | PipelineError::InvalidUrl(_))
    }
}

/// URL in, browsable HTML out
pub struct Pipeline {
    prompts: PromptBuilder,
    backend: Arc<dyn Backend>,
    store: Arc<PageStore>,
}

impl Pipeline {
    pub fn new(prompts: PromptBuilder, backend: Arc<dyn Backend>, store: Arc<PageStore>) -> Self {
        Self {
            prompts,
            backend,
            store,
        }
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }

    /// Generates the page for `raw_url` with links pointing back through `rewriter`
    pub async fn browse(
        &self,
        raw_url: Option<&str>,
        rewriter: &LinkRewriter,
    ) -> Result<RenderedPage, PipelineError> {
        let raw_url = raw_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(PipelineError::MissingUrl)?;

        let target = NavigationTarget::interpret(raw_url)?;
        let request = self.prompts.build(&target, raw_url);

        ::log::info!("Generating {} via {}", raw_url, self.backend.name());
        let started = Instant::now();

        let result = match self.backend.generate(&request).await {
            Ok(result) => result,
            Err(e) => {
                ::log::error!("Error in content generation for {}: {}", raw_url, e);
                return Err(e.into());
            }
        };

        ::log::info!(
            "Generated {} bytes for {} in {:.2} seconds",
            result.raw_html.len(),
            raw_url,
            started.elapsed().as_secs_f64()
        );

        let page = rewriter.rewrite(&result.raw_html, raw_url);
        self.store.record(raw_url, result).await;

        Ok(page)
    }
}
