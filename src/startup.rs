use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{EmbeddingProvider, Settings};
use crate::routes::AppState;
use crate::services::{
    AuthService, CachedEmbeddingService, Database, DatabaseError, DocumentRepository, EmailError, EmailService,
    EmbeddingError, EmbeddingService, HashingEmbeddingService, OpenAiEmbeddingService, PasswordHasher,
    RepositoryError, SearchService, TokenIssuer, TokenLifetimes,
};

/// Failures that stop the service from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Document store: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Embeddings: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Email: {0}")]
    Email(#[from] EmailError),
}

/// Initialize the global tracing subscriber
///
/// `level` seeds the filter unless `RUST_LOG` is set; `format` is `json`
/// or `pretty`.
pub fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let result = if format == "pretty" {
        subscriber.pretty().try_init()
    } else {
        subscriber.json().try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Select the embedding backend and put the cache in front of it
pub fn build_embeddings(settings: &Settings) -> Result<Arc<dyn EmbeddingService>, StartupError> {
    let cfg = &settings.embedding;
    let dimension = settings.index.dimension;

    let inner: Arc<dyn EmbeddingService> = match cfg.provider {
        EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbeddingService::new(
            cfg.base_url.clone(),
            cfg.api_key.clone(),
            cfg.model.clone(),
            dimension,
            Duration::from_secs(cfg.timeout_secs),
        )?),
        EmbeddingProvider::Hashing => {
            tracing::warn!("Using offline hashing embeddings; results are lexical, not semantic");
            Arc::new(HashingEmbeddingService::new(dimension))
        }
    };

    tracing::info!(
        "Embeddings: {:?} (dimension {}, cache {} entries, TTL {}s)",
        cfg.provider,
        dimension,
        cfg.cache_size,
        cfg.cache_ttl_secs
    );

    Ok(Arc::new(CachedEmbeddingService::new(inner, cfg.cache_size, cfg.cache_ttl_secs)))
}

/// Token issuer from the security settings
pub fn build_token_issuer(settings: &Settings) -> TokenIssuer {
    let sec = &settings.security;
    let lifetimes = TokenLifetimes {
        access: chrono::Duration::minutes(sec.access_token_minutes),
        refresh: chrono::Duration::days(sec.refresh_token_days),
        verification: chrono::Duration::hours(sec.verification_token_hours),
        reset: chrono::Duration::minutes(sec.reset_token_minutes),
    };

    match sec.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => TokenIssuer::new(secret, lifetimes),
        None => {
            tracing::warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
            TokenIssuer::with_random_secret(lifetimes)
        }
    }
}

/// Open storage and wire every service into the shared application state
pub async fn build_state(settings: &Settings) -> Result<AppState, StartupError> {
    let db = &settings.database;
    let database = Database::from_settings(
        &db.url,
        db.max_connections,
        db.min_connections,
        db.acquire_timeout_secs,
        db.idle_timeout_secs,
    )
    .await?;

    let repository = DocumentRepository::open(database.clone(), &settings.index.path, settings.index.dimension).await?;
    tracing::info!(
        "Vector index loaded from {} ({} vectors)",
        settings.index.path.display(),
        repository.count()
    );

    let embeddings = build_embeddings(settings)?;
    let search = Arc::new(SearchService::new(embeddings, Arc::new(repository)));

    let auth = AuthService::new(
        database.clone(),
        PasswordHasher::new(settings.security.password_iterations),
        build_token_issuer(settings),
        EmailService::from_settings(settings)?,
    );

    if let Err(e) = auth.tokens().purge_stale().await {
        tracing::warn!("Could not purge stale refresh tokens: {}", e);
    }

    Ok(AppState {
        database,
        search,
        auth,
    })
}
