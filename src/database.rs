use crate::config::{optional, required, Lookup};
use crate::embeddings::Embedding;
use crate::error::{RagError, Result};
use log::{debug, info, warn};
use qdrant_client::qdrant::{
    vectors_config, with_payload_selector, CollectionInfo, PayloadIncludeSelector, ScoredPoint,
    SearchParams, SearchPoints, WithPayloadSelector,
};
use qdrant_client::{Qdrant, QdrantError};
use std::time::Duration;

const DEFAULT_TEXT_FIELD: &str = "text";

/// Configuration for Qdrant
#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Collection holding the pre-indexed chunks
    pub collection: String,
    /// Named vector to search; `None` uses the collection's default vector
    pub vector_name: Option<String>,
    /// Payload field holding the chunk text
    pub text_field: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("vector_name", &self.vector_name)
            .field("text_field", &self.text_field)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl QdrantConfig {
    pub fn from_lookup(lookup: Lookup, timeout: Duration) -> Result<Self> {
        let url = required(lookup, "QDRANT_URL")?;
        let api_key = optional(lookup, "QDRANT_API_KEY");
        let collection = required(lookup, "QDRANT_COLLECTION")?;
        let vector_name = optional(lookup, "QDRANT_VECTOR_NAME");
        let text_field =
            optional(lookup, "QDRANT_TEXT_FIELD").unwrap_or_else(|| DEFAULT_TEXT_FIELD.to_string());

        Ok(QdrantConfig {
            url,
            api_key,
            collection,
            vector_name,
            text_field,
            timeout,
        })
    }
}

/// A retrieved passage and its similarity score (higher is more similar)
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    pub text: String,
    pub score: f32,
}

impl ContextChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        ContextChunk {
            text: text.into(),
            score,
        }
    }
}

/// Similarity search over the pre-populated document store
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Return at most `k` chunks, most similar first. An empty store yields an empty result.
    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ContextChunk>>;
}

/// Client for interacting with Qdrant
pub struct QdrantClient {
    client: Qdrant,
    collection: String,
    vector_name: Option<String>,
    text_field: String,
    candidate_multiplier: usize,
}

impl QdrantClient {
    /// Create a new Qdrant client. `candidate_multiplier` sets how many candidates the
    /// HNSW index explores per requested result.
    pub fn new(config: QdrantConfig, candidate_multiplier: usize) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .skip_compatibility_check()
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build Qdrant client: {}", e)))?;

        Ok(QdrantClient {
            client,
            collection: config.collection,
            vector_name: config.vector_name,
            text_field: config.text_field,
            candidate_multiplier: candidate_multiplier.max(1),
        })
    }

    /// Check that the collection exists and its vectors have the expected dimension
    pub async fn verify_index(&self, expected_dimension: usize) -> Result<()> {
        let response = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| startup_error(classify_error(e, &self.collection)))?;

        let info = response.result.ok_or_else(|| {
            RagError::Configuration(format!("collection {} has no info", self.collection))
        })?;

        check_index(
            &info,
            &self.collection,
            self.vector_name.as_deref(),
            expected_dimension,
        )?;
        info!(
            "Using collection {} ({} points, {} dimensions)",
            self.collection,
            info.points_count.unwrap_or(0),
            expected_dimension
        );
        Ok(())
    }

    fn search_request(&self, query: &Embedding, k: usize) -> SearchPoints {
        let num_candidates = candidate_count(k, self.candidate_multiplier);

        SearchPoints {
            collection_name: self.collection.clone(),
            vector: query.values.clone(),
            vector_name: self.vector_name.clone(),
            limit: k as u64,
            params: Some(SearchParams {
                hnsw_ef: Some(num_candidates),
                exact: Some(false),
                ..Default::default()
            }),
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Include(
                    PayloadIncludeSelector {
                        fields: vec![self.text_field.clone()],
                    },
                )),
            }),
            ..Default::default()
        }
    }
}

impl VectorStore for QdrantClient {
    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ContextChunk>> {
        if k == 0 {
            return Err(RagError::StoreQuery("k must be greater than zero".to_string()));
        }

        let request = self.search_request(query, k);
        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| classify_error(e, &self.collection))?;

        let chunks = chunks_from_points(response.result, &self.text_field, k);
        debug!(
            "Retrieved {} chunks from {} (k={})",
            chunks.len(),
            self.collection,
            k
        );
        Ok(chunks)
    }
}

/// Project scored points to chunks, keeping store order and at most `k` entries
fn chunks_from_points(points: Vec<ScoredPoint>, text_field: &str, k: usize) -> Vec<ContextChunk> {
    points
        .into_iter()
        .filter_map(|point| {
            let text = point.payload.get(text_field).and_then(|v| v.as_str());
            match text {
                Some(text) => Some(ContextChunk::new(text.to_string(), point.score)),
                None => {
                    warn!("Skipping point without a `{}` payload field", text_field);
                    None
                }
            }
        })
        .take(k)
        .collect()
}

/// Size of the candidate list for the HNSW search, saturating instead of overflowing
fn candidate_count(k: usize, multiplier: usize) -> u64 {
    u64::try_from(k.saturating_mul(multiplier)).unwrap_or(u64::MAX)
}

/// A missing collection or vector at startup is a configuration problem
fn startup_error(err: RagError) -> RagError {
    match err {
        RagError::StoreQuery(msg) => RagError::Configuration(msg),
        other => other,
    }
}

/// Ensure the searched vector exists and matches the embedding dimension
fn check_index(
    info: &CollectionInfo,
    collection: &str,
    vector_name: Option<&str>,
    expected_dimension: usize,
) -> Result<()> {
    match vector_size(info, vector_name) {
        Some(size) if size == expected_dimension as u64 => Ok(()),
        Some(size) => Err(RagError::Configuration(format!(
            "collection {} stores {}-dimensional vectors but the embedding model produces {}",
            collection, size, expected_dimension
        ))),
        None => Err(RagError::Configuration(format!(
            "collection {} has no vector named {}",
            collection,
            vector_name.unwrap_or("<default>")
        ))),
    }
}

/// Vector size of the default vector, or of the named one
fn vector_size(info: &CollectionInfo, vector_name: Option<&str>) -> Option<u64> {
    let config = info
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;

    match (config, vector_name) {
        (vectors_config::Config::Params(params), None) => Some(params.size),
        (vectors_config::Config::ParamsMap(map), Some(name)) => {
            map.map.get(name).map(|params| params.size)
        }
        _ => None,
    }
}

/// Split Qdrant failures into "the query was rejected" and "the store is unreachable"
fn classify_error(err: QdrantError, collection: &str) -> RagError {
    match err {
        QdrantError::ResponseError { status }
            if matches!(
                status.code(),
                tonic::Code::NotFound | tonic::Code::InvalidArgument | tonic::Code::FailedPrecondition
            ) =>
        {
            RagError::StoreQuery(format!(
                "query against collection {} rejected: {}",
                collection,
                status.message()
            ))
        }
        e => RagError::StoreConnection(format!(
            "failed to search collection {}: {}",
            collection, e
        )),
    }
}
