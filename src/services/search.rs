use std::sync::Arc;
use thiserror::Error;

use crate::models::{Document, DocumentId, DomainError, SearchResult, StoredDocument};
use crate::services::documents::{DocumentRepository, RepositoryError};
use crate::services::embeddings::{EmbeddingError, EmbeddingService};

/// Errors raised by the document and search use cases
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    InvalidDocument(#[from] DomainError),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Document {0} not found")]
    NotFound(DocumentId),
}

/// Indexes documents and answers similarity queries
pub struct SearchService {
    embeddings: Arc<dyn EmbeddingService>,
    repository: Arc<DocumentRepository>,
}

impl SearchService {
    pub fn new(embeddings: Arc<dyn EmbeddingService>, repository: Arc<DocumentRepository>) -> Self {
        Self { embeddings, repository }
    }

    pub fn repository(&self) -> &DocumentRepository {
        &self.repository
    }

    /// Embed and store a document, returning its new id
    pub async fn index_document(&self, content: &str) -> Result<DocumentId, SearchError> {
        if content.trim().is_empty() {
            return Err(DomainError::EmptyContent.into());
        }

        let embedding = self.embeddings.create_embedding(content).await?;
        let document = Document::new(content, embedding)?;
        self.repository.save(&document).await?;

        tracing::info!("Indexed document {}", document.id);
        Ok(document.id)
    }

    /// Return up to `top_k` documents nearest to the query, closest first
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let embedding = self.embeddings.create_embedding(query).await?;
        let hits = self.repository.find_similar(&embedding, top_k).await?;

        tracing::debug!("Search returned {} results", hits.len());

        Ok(hits
            .into_iter()
            .map(|(doc, distance)| SearchResult {
                id: doc.id.0,
                content: doc.content,
                score: distance,
            })
            .collect())
    }

    pub async fn get_document(&self, id: &DocumentId) -> Result<StoredDocument, SearchError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| SearchError::NotFound(id.clone()))
    }

    pub async fn delete_document(&self, id: &DocumentId) -> Result<(), SearchError> {
        if !self.repository.delete(id).await? {
            return Err(SearchError::NotFound(id.clone()));
        }

        tracing::info!("Deleted document {}", id);
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.repository.count()
    }
}
