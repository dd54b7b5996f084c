// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Claims, Document, DocumentId, DomainError, Embedding, NewUser, RefreshTokenRecord, StoredDocument, TokenType, User};
pub use requests::{ForgotPasswordRequest, IndexRequest, LoginForm, RefreshRequest, RegisterRequest, ResetPasswordRequest, SearchRequest, VerifyEmailRequest};
pub use responses::{DocumentResponse, ErrorResponse, HealthResponse, IndexResponse, MessageResponse, RegisterResponse, SearchResponse, SearchResult, TokenResponse, UserResponse};
