use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::core::distance::l2_squared;

/// On-disk format version of the index file
const INDEX_FORMAT_VERSION: u32 = 1;

/// Errors that can occur when using the vector index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index dimension must be at least 1")]
    ZeroDimension,

    #[error("Unsupported index format version: {0}")]
    UnsupportedVersion(u32),

    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// A single search hit: the stored id and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: i64,
    pub distance: f32,
}

/// Exact nearest-neighbour index over fixed-dimension vectors
///
/// Vectors live in one contiguous buffer; `ids[i]` owns the slice
/// `data[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    version: u32,
    dimension: usize,
    ids: Vec<i64>,
    data: Vec<f32>,
    #[serde(skip)]
    positions: HashMap<i64, usize>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            version: INDEX_FORMAT_VERSION,
            dimension,
            ids: Vec::new(),
            data: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.positions.contains_key(&id)
    }

    /// All stored ids, in storage order
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Add a vector under `id`, replacing any vector already stored for it
    pub fn add(&mut self, id: i64, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dimension(vector)?;

        if let Some(&pos) = self.positions.get(&id) {
            let start = pos * self.dimension;
            self.data[start..start + self.dimension].copy_from_slice(vector);
            return Ok(());
        }

        self.positions.insert(id, self.ids.len());
        self.ids.push(id);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Remove the given ids, returning how many were present
    pub fn remove(&mut self, ids: &[i64]) -> usize {
        let mut removed = 0;

        for id in ids {
            let Some(pos) = self.positions.remove(id) else {
                continue;
            };

            let last = self.ids.len() - 1;
            if pos != last {
                // Move the last vector into the freed slot
                let moved_id = self.ids[last];
                self.ids[pos] = moved_id;
                let (head, tail) = self.data.split_at_mut(last * self.dimension);
                head[pos * self.dimension..(pos + 1) * self.dimension]
                    .copy_from_slice(&tail[..self.dimension]);
                self.positions.insert(moved_id, pos);
            }

            self.ids.pop();
            self.data.truncate(last * self.dimension);
            removed += 1;
        }

        removed
    }

    /// Vector stored for `id`, if any
    pub fn vector(&self, id: i64) -> Option<&[f32]> {
        self.positions.get(&id).map(|&pos| {
            let start = pos * self.dimension;
            &self.data[start..start + self.dimension]
        })
    }

    /// Find the `k` stored vectors closest to `query`
    ///
    /// Results are sorted by ascending distance, ties broken by id. Fewer than
    /// `k` results are returned when the index holds fewer vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimension(query)?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .ids
            .iter()
            .zip(self.data.chunks_exact(self.dimension))
            .map(|(&id, vector)| Neighbor {
                id,
                distance: l2_squared(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Load an index from `path`, or create an empty one if the file is absent
    pub fn load_or_create<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self, IndexError> {
        let path = path.as_ref();
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if !path.exists() {
            tracing::info!("No index file at {}, starting with an empty index", path.display());
            return Ok(Self::new(dimension));
        }

        let bytes = std::fs::read(path)?;
        let index = Self::from_bytes(&bytes)?;

        if index.dimension != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: index.dimension,
            });
        }

        tracing::info!("Loaded index with {} vectors from {}", index.len(), path.display());
        Ok(index)
    }

    /// Decode an index from its bincode representation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut index: FlatIndex = bincode::deserialize(bytes)?;

        if index.version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(index.version));
        }

        index.positions = index
            .ids
            .iter()
            .enumerate()
            .map(|(pos, &id)| (id, pos))
            .collect();

        Ok(index)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        Ok(bincode::serialize(self)?)
    }

    /// Write the index to `path` atomically (temp file, then rename)
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IndexError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = self.to_bytes()?;
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        Ok(())
    }
}
