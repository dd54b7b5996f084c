use sha2::{Digest, Sha256};

use crate::core::distance::normalize;

/// Prepare text for embedding: newlines become spaces
pub fn prepare_text(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Split text into lower-cased alphanumeric tokens
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Embed text by feature hashing its tokens into `dimension` buckets
///
/// Each token is hashed with SHA-256; the first eight bytes pick the bucket
/// and the ninth byte picks the sign. The result is L2-normalised, so
/// texts sharing more tokens end up closer. Text without tokens yields
/// the zero vector.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    if dimension == 0 {
        return vector;
    }

    for token in tokenize(text) {
        let digest = Sha256::digest(token.as_bytes());

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign;
    }

    normalize(&mut vector);
    vector
}
