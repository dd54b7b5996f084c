// Service exports
pub mod auth;
pub mod database;
pub mod documents;
pub mod email;
pub mod embeddings;
pub mod health;
pub mod search;
pub mod security;
pub mod users;

pub use auth::{AuthError, AuthService};
pub use database::{Database, DatabaseError};
pub use documents::{DocumentRepository, ReconcileReport, RepositoryError};
pub use email::{DisabledEmailSender, EmailError, EmailMessage, EmailSender, EmailService, SmtpEmailSender};
pub use embeddings::{CachedEmbeddingService, EmbeddingError, EmbeddingService, HashingEmbeddingService, OpenAiEmbeddingService};
pub use health::{HealthProbe, ProbeError};
pub use search::{SearchError, SearchService};
pub use security::{PasswordHasher, SecurityError, TokenIssuer, TokenLifetimes};
pub use users::{TokenRepository, UserRepository};
