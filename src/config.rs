use crate::database::QdrantConfig;
use crate::error::{RagError, Result};
use crate::gemini::GeminiConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 20;
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of configuration values, keyed by variable name
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a variable from the process environment. Blank values count as unset.
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn required(lookup: Lookup, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| RagError::Configuration(format!("{} is not set", key)))
}

pub(crate) fn optional(lookup: Lookup, key: &str) -> Option<String> {
    lookup(key)
}

pub(crate) fn parse_or<T: FromStr>(lookup: Lookup, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RagError::Configuration(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

fn positive(key: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(RagError::Configuration(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}

/// Retrieval and answer settings
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the model
    pub top_k: usize,
    /// Candidate oversampling factor for the approximate index
    pub candidate_multiplier: usize,
    /// Language the model is asked to answer in
    pub language: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            top_k: DEFAULT_TOP_K,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl RetrievalConfig {
    pub fn from_lookup(lookup: Lookup) -> Result<Self> {
        let top_k = positive("RAG_TOP_K", parse_or(lookup, "RAG_TOP_K", DEFAULT_TOP_K)?)?;
        let candidate_multiplier = positive(
            "RAG_CANDIDATE_MULTIPLIER",
            parse_or(lookup, "RAG_CANDIDATE_MULTIPLIER", DEFAULT_CANDIDATE_MULTIPLIER)?,
        )?;
        let language =
            optional(lookup, "RAG_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(RetrievalConfig {
            top_k,
            candidate_multiplier,
            language,
        })
    }

    /// Override `top_k`, keeping the positivity check
    pub fn with_top_k(mut self, top_k: usize) -> Result<Self> {
        self.top_k = positive("top_k", top_k)?;
        Ok(self)
    }
}

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub qdrant: QdrantConfig,
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    /// Load the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: Lookup) -> Result<Self> {
        let timeout = Duration::from_secs(parse_or(
            lookup,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        if timeout.is_zero() {
            return Err(RagError::Configuration(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(AppConfig {
            gemini: GeminiConfig::from_lookup(lookup, timeout)?,
            qdrant: QdrantConfig::from_lookup(lookup, timeout)?,
            retrieval: RetrievalConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("GEMINI_API_KEY", "secret"),
        ("QDRANT_URL", "http://localhost:6334"),
        ("QDRANT_COLLECTION", "pdf_vectors"),
    ];

    #[test]
    fn test_defaults_applied() {
        let lookup = lookup_from(&REQUIRED);
        let config = AppConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.candidate_multiplier, 20);
        assert_eq!(config.retrieval.language, "English");
        assert_eq!(config.gemini.embedding_dimension, 768);
        assert_eq!(config.gemini.timeout, Duration::from_secs(30));
        assert_eq!(config.qdrant.collection, "pdf_vectors");
        assert_eq!(config.qdrant.text_field, "text");
        assert!(config.qdrant.vector_name.is_none());
        assert!(config.qdrant.api_key.is_none());
    }

    #[test]
    fn test_missing_required_keys() {
        for missing in ["GEMINI_API_KEY", "QDRANT_URL", "QDRANT_COLLECTION"] {
            let pairs: Vec<(&str, &str)> = REQUIRED
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();
            let lookup = lookup_from(&pairs);
            let err = AppConfig::from_lookup(&lookup).unwrap_err();
            match err {
                RagError::Configuration(msg) => assert!(msg.contains(missing)),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        for (key, value) in [
            ("RAG_TOP_K", "five"),
            ("RAG_TOP_K", "0"),
            ("RAG_CANDIDATE_MULTIPLIER", "0"),
            ("EMBEDDING_DIMENSION", "-3"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let lookup = lookup_from(&pairs);
            assert!(
                matches!(AppConfig::from_lookup(&lookup), Err(RagError::Configuration(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_overrides_read() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("RAG_TOP_K", "3"),
            ("RAG_CANDIDATE_MULTIPLIER", "10"),
            ("RAG_LANGUAGE", "Spanish"),
            ("QDRANT_VECTOR_NAME", "embedding"),
            ("QDRANT_TEXT_FIELD", "texto"),
        ]);
        let lookup = lookup_from(&pairs);
        let config = AppConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.candidate_multiplier, 10);
        assert_eq!(config.retrieval.language, "Spanish");
        assert_eq!(config.qdrant.vector_name.as_deref(), Some("embedding"));
        assert_eq!(config.qdrant.text_field, "texto");
    }

    #[test]
    fn test_with_top_k_rejects_zero() {
        assert!(RetrievalConfig::default().with_top_k(0).is_err());
        assert_eq!(RetrievalConfig::default().with_top_k(8).unwrap().top_k, 8);
    }
}
