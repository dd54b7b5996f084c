use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Vector representation of a text
pub type Embedding = Vec<f32>;

/// Identifier of an indexed document (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Errors raised when constructing domain entities
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Document content must not be empty.")]
    EmptyContent,
}

/// A text together with its embedding
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub embedding: Embedding,
}

impl Document {
    /// Create a document with a fresh id
    pub fn new(content: impl Into<String>, embedding: Embedding) -> Result<Self, DomainError> {
        Self::with_id(DocumentId::generate(), content, embedding)
    }

    pub fn with_id(
        id: DocumentId,
        content: impl Into<String>,
        embedding: Embedding,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::EmptyContent);
        }

        Ok(Self { id, content, embedding })
    }
}

/// Stored document metadata, without its vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_verified: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Data needed to create an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub hashed_password: String,
}

/// Stored refresh token; only the hash of the token is kept
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub is_revoked: bool,
}

impl RefreshTokenRecord {
    pub fn is_usable(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

/// Purpose of a signed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Verify,
    Reset,
}

/// JWT payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Fingerprint of the password hash, only on reset tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}
