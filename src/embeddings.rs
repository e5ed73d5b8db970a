use crate::error::{RagError, Result};
use crate::gemini::GeminiClient;
use log::debug;

/// Representation of a vector embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Turns text into a fixed-length vector
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Embed a single non-empty text. No retries are attempted.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(RagError::EmbeddingService(
                "cannot embed empty text".to_string(),
            ));
        }

        let embedding = Embedding::new(self.embed_content(text).await?);
        check_dimension(embedding.dimension(), self.config().embedding_dimension)?;

        debug!(
            "Embedded {} chars into {} dimensions",
            text.len(),
            embedding.dimension()
        );
        Ok(embedding)
    }
}

fn check_dimension(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(RagError::EmbeddingService(format!(
            "malformed response: expected {} dimensions, got {}",
            expected, actual
        )));
    }
    Ok(())
}
