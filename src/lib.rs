// Re-export modules
pub mod backends;
pub mod config;
pub mod pipeline;
pub mod prompt;
pub mod rewrite;
pub mod server;
pub mod store;
pub mod target;

#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use backends::{Backend, BackendError};
pub use pipeline::{Pipeline, PipelineError};
pub use prompt::{GenerationRequest, PromptBuilder};
pub use rewrite::{LinkRewriter, RenderedPage};
pub use store::{GenerationResult, PageStore};
pub use target::{InvalidUrl, NavigationTarget};
