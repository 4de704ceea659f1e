use anyhow::Result;
use async_trait::async_trait;

/// A language model backend, seen as text in and text out.
///
/// The request protocol lives behind this trait; the analysis pipeline only
/// renders prompts and caches whatever comes back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Model: Send + Sync {
    /// Send a single prompt and return the completion text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the name of the model
    fn name(&self) -> &str;
}
