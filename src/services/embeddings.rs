use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::{hash_embedding, prepare_text};
use crate::models::Embedding;

/// Errors that can occur when creating embeddings
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing configuration: {0}")]
    Configuration(String),
}

/// Turns text into embedding vectors
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn create_embedding(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Length of every vector this service produces
    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 1],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings API client
pub struct OpenAiEmbeddingService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EmbeddingError::Configuration("OPENAI_API_KEY is not set".into()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn create_embedding(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let text = prepare_text(text);
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: [text.as_str()],
                model: &self.model,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(EmbeddingError::Unauthorized);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            tracing::error!("Embedding request failed: {} - {}", status, message);
            return Err(EmbeddingError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("Missing data array".into()))?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Offline embedder based on feature hashing
///
/// Needs no network access; texts sharing words land close together.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingService {
    dimension: usize,
}

impl HashingEmbeddingService {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbeddingService {
    async fn create_embedding(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(hash_embedding(&prepare_text(text), self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// In-memory cache in front of another embedding service
pub struct CachedEmbeddingService {
    inner: Arc<dyn EmbeddingService>,
    cache: moka::future::Cache<String, Arc<Embedding>>,
}

impl CachedEmbeddingService {
    pub fn new(inner: Arc<dyn EmbeddingService>, max_entries: u64, ttl_secs: u64) -> Self {
        let cache = moka::future::CacheBuilder::new(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl EmbeddingService for CachedEmbeddingService {
    async fn create_embedding(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(hit) = self.cache.get(text).await {
            tracing::trace!("Embedding cache hit");
            return Ok(hit.as_ref().clone());
        }

        let embedding = self.inner.create_embedding(text).await?;
        self.cache
            .insert(text.to_string(), Arc::new(embedding.clone()))
            .await;

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingService for CountingService {
        async fn create_embedding(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1; 4])
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn test_hashing_service_dimension() {
        let service = HashingEmbeddingService::new(16);
        let v = service.create_embedding("hello\nworld").await.unwrap();

        assert_eq!(v.len(), 16);
        assert_eq!(v, service.create_embedding("hello world").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_calls() {
        let inner = Arc::new(CountingService { calls: AtomicUsize::new(0) });
        let cached = CachedEmbeddingService::new(inner.clone(), 100, 60);

        cached.create_embedding("same text").await.unwrap();
        cached.create_embedding("same text").await.unwrap();
        cached.create_embedding("other text").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.dimension(), 4);
    }

    #[test]
    fn test_openai_requires_api_key() {
        let result = OpenAiEmbeddingService::new(
            "https://api.openai.com/v1",
            None,
            "text-embedding-3-small",
            1536,
            Duration::from_secs(5),
        );

        assert!(matches!(result, Err(EmbeddingError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_openai_parses_embedding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "input": ["two lines"],
                "model": "text-embedding-3-small"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25,1.0]}]}"#)
            .create_async()
            .await;

        let service = OpenAiEmbeddingService::new(
            server.url(),
            Some("sk-test".to_string()),
            "text-embedding-3-small",
            3,
            Duration::from_secs(5),
        )
        .unwrap();

        let embedding = service.create_embedding("two\nlines").await.unwrap();

        assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_openai_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _unauthorized = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer bad-key")
            .with_status(401)
            .create_async()
            .await;
        let _overloaded = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let bad = OpenAiEmbeddingService::new(server.url(), Some("bad-key".into()), "m", 3, Duration::from_secs(5)).unwrap();
        assert!(matches!(bad.create_embedding("x").await, Err(EmbeddingError::Unauthorized)));

        let good = OpenAiEmbeddingService::new(server.url(), Some("sk-test".into()), "m", 3, Duration::from_secs(5)).unwrap();
        match good.create_embedding("x").await {
            Err(EmbeddingError::ApiError { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_openai_rejects_wrong_dimension() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[1.0,2.0]}]}"#)
            .create_async()
            .await;

        let service = OpenAiEmbeddingService::new(server.url(), Some("k".into()), "m", 3, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            service.create_embedding("x").await,
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
