use crate::error::Result;
use crate::gemini::GeminiClient;

/// Generates text for a prompt. Stateless: no conversation memory is kept.
#[allow(async_fn_in_trait)]
pub trait Completer {
    /// Returns non-empty generated text, or a completion error
    async fn complete(&self, prompt: &str) -> Result<String>;
}

impl Completer for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt).await
    }
}
