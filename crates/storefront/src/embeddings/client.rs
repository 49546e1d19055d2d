//! OpenAI-compatible embedding client.
//!
//! Uses the `text-embedding-3-small` model (1536 dimensions). Query texts are
//! cached for ten minutes so repeated assistant searches skip the API.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::EmbeddingConfig;

use super::EmbeddingError;

const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const QUERY_CACHE_CAPACITY: u64 = 2_000;
const QUERY_CACHE_TTL: Duration = Duration::from_secs(600);

/// Width of every stored and query vector.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Client for generating text embeddings.
///
/// Cheap to clone; clones share the HTTP pool and the query cache.
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<EmbeddingClientInner>,
}

struct EmbeddingClientInner {
    client: reqwest::Client,
    api_url: String,
    query_cache: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingClient {
    /// Create a new embedding client.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::Config` if the API key is not a valid header
    /// value or the HTTP client can't be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|_| EmbeddingError::Config("API key contains invalid characters".to_owned()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let query_cache = Cache::builder()
            .max_capacity(QUERY_CACHE_CAPACITY)
            .time_to_live(QUERY_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(EmbeddingClientInner {
                client,
                api_url: config.api_url.clone(),
                query_cache,
            }),
        })
    }

    /// Embed a shopper query, served from the cache when seen recently.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    pub async fn embed_query(&self, text: &str) -> Result<Arc<Vec<f32>>, EmbeddingError> {
        let key = normalize_query(text);
        if let Some(hit) = self.inner.query_cache.get(&key).await {
            tracing::debug!("Query embedding cache hit");
            return Ok(hit);
        }
        let embedding = Arc::new(self.embed(&key).await?);
        self.inner
            .query_cache
            .insert(key, Arc::clone(&embedding))
            .await;
        Ok(embedding)
    }

    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: EmbeddingInput::One(text),
        };
        let mut embeddings = self.post(&request).await?;
        if embeddings.len() != 1 {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected 1 embedding, got {}",
                embeddings.len()
            )));
        }
        Ok(embeddings.swap_remove(0))
    }

    /// Generate embeddings for multiple texts in a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an invalid response.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: EmbeddingInput::Many(texts),
        };
        let embeddings = self.post(&request).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    async fn post(&self, request: &EmbeddingRequest<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .inner
            .client
            .post(&self.inner.api_url)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: EmbeddingResponse = response.json().await?;
        into_vectors(response)
    }
}

/// Order the response by input index and check every vector's width.
fn into_vectors(response: EmbeddingResponse) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut data = response.data;
    data.sort_by_key(|d| d.index);
    data.into_iter()
        .map(|d| {
            if d.embedding.len() == EMBEDDING_DIMENSIONS {
                Ok(d.embedding)
            } else {
                Err(EmbeddingError::InvalidResponse(format!(
                    "embedding {} has {} dimensions, expected {EMBEDDING_DIMENSIONS}",
                    d.index,
                    d.embedding.len()
                )))
            }
        })
        .collect()
}

/// Cache key: lowercase with collapsed whitespace.
fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    One(&'a str),
    Many(&'a [&'a str]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn data(index: usize, width: usize) -> EmbeddingData {
        EmbeddingData {
            index,
            embedding: vec![0.5; width],
        }
    }

    #[test]
    fn test_into_vectors_sorts_by_index() {
        let mut second = data(1, EMBEDDING_DIMENSIONS);
        second.embedding[0] = 1.0;
        let vectors = into_vectors(EmbeddingResponse {
            data: vec![second, data(0, EMBEDDING_DIMENSIONS)],
        })
        .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[0][0] - 0.5).abs() < f32::EPSILON);
        assert!((vectors[1][0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_into_vectors_rejects_wrong_width() {
        let err = into_vectors(EmbeddingResponse {
            data: vec![data(0, 3)],
        })
        .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[test]
    fn test_request_serialization() {
        let single = serde_json::to_value(EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: EmbeddingInput::One("red dress"),
        })
        .unwrap();
        assert_eq!(single["input"], "red dress");

        let texts = ["a", "b"];
        let batch = serde_json::to_value(EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: EmbeddingInput::Many(&texts),
        })
        .unwrap();
        assert_eq!(batch["input"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Red   Summer\tDress "), "red summer dress");
    }

    #[test]
    fn test_new_rejects_invalid_key() {
        let config = EmbeddingConfig {
            api_key: SecretString::from("bad\nkey"),
            api_url: "https://api.openai.com/v1/embeddings".to_owned(),
        };
        assert!(matches!(
            EmbeddingClient::new(&config),
            Err(EmbeddingError::Config(_))
        ));
    }
}
