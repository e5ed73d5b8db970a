use thiserror::Error;

/// Errors raised by the retrieval and generation clients
#[derive(Debug, Error)]
pub enum RagError {
    /// Network, authentication or decoding failure of the embedding service
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The vector store could not be reached
    #[error("vector store connection error: {0}")]
    StoreConnection(String),

    /// The vector store rejected the query (missing index, dimension mismatch)
    #[error("vector store query error: {0}")]
    StoreQuery(String),

    /// Network, authentication or decoding failure of the completion service
    #[error("completion service error: {0}")]
    CompletionService(String),

    /// The completion service answered but produced no text (e.g. safety filtering)
    #[error("completion service returned no text: {0}")]
    CompletionBlocked(String),

    /// Missing or invalid process configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, RagError>;
