use sqlx::Row;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::{FlatIndex, IndexError};
use crate::models::{Document, DocumentId, Embedding, StoredDocument};
use crate::services::database::{Database, DatabaseError};

/// Errors raised by the document repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(DatabaseError::SqlxError(err))
    }
}

/// Outcome of comparing the index with the metadata table at startup
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index entries dropped because no metadata row references them
    pub orphan_vectors: usize,
    /// Metadata rows that have no vector in the index
    pub missing_vectors: usize,
}

/// Document store: metadata in SQLite, vectors in a flat L2 index on disk
///
/// The integer `seq` column of `documents` is the key of each vector. Every
/// mutation persists the index file before the metadata transaction commits,
/// so a failed write leaves neither half behind. Writers hold the index lock
/// for the whole transaction, which also keeps SQLite write transactions from
/// overlapping.
pub struct DocumentRepository {
    db: Database,
    index: RwLock<FlatIndex>,
    index_path: PathBuf,
    /// Vector count as of the last committed mutation; readable without the lock
    count: AtomicUsize,
}

impl DocumentRepository {
    /// Open the repository, loading the index file if it exists
    pub async fn open(
        db: Database,
        index_path: impl Into<PathBuf>,
        dimension: usize,
    ) -> Result<Self, RepositoryError> {
        let index_path = index_path.into();
        let index = FlatIndex::load_or_create(&index_path, dimension)?;

        let repo = Self {
            db,
            count: AtomicUsize::new(index.len()),
            index: RwLock::new(index),
            index_path,
        };

        let report = repo.reconcile().await?;
        if report.orphan_vectors > 0 {
            tracing::warn!("Dropped {} index vectors without metadata", report.orphan_vectors);
        }
        if report.missing_vectors > 0 {
            tracing::warn!(
                "{} documents have no vector and will not appear in search results",
                report.missing_vectors
            );
        }

        Ok(repo)
    }

    pub async fn dimension(&self) -> usize {
        self.index.read().await.dimension()
    }

    /// Number of vectors currently searchable; never waits on a writer
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Store a document and its embedding
    pub async fn save(&self, document: &Document) -> Result<(), RepositoryError> {
        let mut index = self.index.write().await;
        let mut tx = self.db.pool().begin().await?;

        // Replacing an existing id must also drop its old vector
        let previous: Option<i64> = sqlx::query("SELECT seq FROM documents WHERE id = ?")
            .bind(document.id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get("seq"));

        if previous.is_some() {
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(document.id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        let seq = sqlx::query("INSERT INTO documents (id, content, created_at) VALUES (?, ?, ?)")
            .bind(document.id.as_str())
            .bind(&document.content)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        index.add(seq, &document.embedding)?;
        let replaced = previous.and_then(|old_seq| {
            let vector = index.vector(old_seq).map(|v| v.to_vec());
            index.remove(&[old_seq]);
            vector.map(|v| (old_seq, v))
        });

        let rollback = |index: &mut FlatIndex| {
            index.remove(&[seq]);
            if let Some((old_seq, vector)) = &replaced {
                let _ = index.add(*old_seq, vector);
            }
        };

        if let Err(e) = index.save(&self.index_path).await {
            rollback(&mut *index);
            return Err(e.into());
        }

        if let Err(e) = tx.commit().await {
            rollback(&mut *index);
            if let Err(save_err) = index.save(&self.index_path).await {
                tracing::error!("Failed to restore index after aborted save: {}", save_err);
            }
            return Err(e.into());
        }

        self.count.store(index.len(), Ordering::Release);
        tracing::debug!("Saved document {} as vector {}", document.id, seq);
        Ok(())
    }

    /// Look up a document's metadata by id
    pub async fn find_by_id(&self, id: &DocumentId) -> Result<Option<StoredDocument>, RepositoryError> {
        let row = sqlx::query("SELECT id, content, created_at FROM documents WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| StoredDocument {
            id: DocumentId(row.get("id")),
            content: row.get("content"),
            created_at: row.get("created_at"),
        }))
    }

    /// Delete a document, returning whether it existed
    pub async fn delete(&self, id: &DocumentId) -> Result<bool, RepositoryError> {
        let mut index = self.index.write().await;
        let mut tx = self.db.pool().begin().await?;

        let Some(seq) = sqlx::query("SELECT seq FROM documents WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get::<i64, _>("seq"))
        else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM documents WHERE seq = ?")
            .bind(seq)
            .execute(&mut *tx)
            .await?;

        let previous = index.vector(seq).map(|v| v.to_vec());
        index.remove(&[seq]);

        let restore = |index: &mut FlatIndex| {
            if let Some(vector) = &previous {
                // Same dimension as before removal, cannot fail
                let _ = index.add(seq, vector);
            }
        };

        if let Err(e) = index.save(&self.index_path).await {
            restore(&mut *index);
            return Err(e.into());
        }

        if let Err(e) = tx.commit().await {
            restore(&mut *index);
            if let Err(save_err) = index.save(&self.index_path).await {
                tracing::error!("Failed to restore index after aborted delete: {}", save_err);
            }
            return Err(e.into());
        }

        self.count.store(index.len(), Ordering::Release);
        tracing::debug!("Deleted document {} (vector {})", id, seq);
        Ok(true)
    }

    /// Find the documents closest to `embedding`
    ///
    /// Returns `(document, squared L2 distance)` pairs, closest first.
    pub async fn find_similar(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<(StoredDocument, f32)>, RepositoryError> {
        let neighbors = {
            let index = self.index.read().await;
            if index.is_empty() {
                return Ok(Vec::new());
            }
            index.search(embedding, top_k)?
        };

        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let row = sqlx::query("SELECT id, content, created_at FROM documents WHERE seq = ?")
                .bind(neighbor.id)
                .fetch_optional(self.db.pool())
                .await?;

            match row {
                Some(row) => results.push((
                    StoredDocument {
                        id: DocumentId(row.get("id")),
                        content: row.get("content"),
                        created_at: row.get("created_at"),
                    },
                    neighbor.distance,
                )),
                None => tracing::warn!("Vector {} has no metadata row, skipping", neighbor.id),
            }
        }

        Ok(results)
    }

    /// Drop index entries without metadata and count metadata without vectors
    pub async fn reconcile(&self) -> Result<ReconcileReport, RepositoryError> {
        let seqs: HashSet<i64> = sqlx::query("SELECT seq FROM documents")
            .fetch_all(self.db.pool())
            .await?
            .iter()
            .map(|row| row.get("seq"))
            .collect();

        let mut index = self.index.write().await;

        let orphans: Vec<i64> = index
            .ids()
            .iter()
            .copied()
            .filter(|id| !seqs.contains(id))
            .collect();

        let missing_vectors = seqs.iter().filter(|seq| !index.contains(**seq)).count();

        if !orphans.is_empty() {
            index.remove(&orphans);
            index.save(&self.index_path).await?;
        }
        self.count.store(index.len(), Ordering::Release);

        Ok(ReconcileReport {
            orphan_vectors: orphans.len(),
            missing_vectors,
        })
    }
}
