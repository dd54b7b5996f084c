use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: None,
            min_connections: None,
            acquire_timeout_secs: None,
            idle_timeout_secs: None,
        }
    }
}

fn default_database_url() -> String { "sqlite://data/metadata.db".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            dimension: default_dimension(),
        }
    }
}

fn default_index_path() -> PathBuf { PathBuf::from("data/index.bin") }
fn default_dimension() -> usize { 1536 }

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Hashing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_provider")]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_embedding_timeout(),
            cache_size: default_cache_size(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_provider() -> EmbeddingProvider { EmbeddingProvider::OpenAi }
fn default_model() -> String { "text-embedding-3-small".to_string() }
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_embedding_timeout() -> u64 { 30 }
fn default_cache_size() -> u64 { 10_000 }
fn default_cache_ttl() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySettings {
    /// HMAC secret for JWTs; a random one is generated when unset
    pub jwt_secret: Option<String>,
    #[serde(default = "default_access_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_days")]
    pub refresh_token_days: i64,
    #[serde(default = "default_verify_hours")]
    pub verification_token_hours: i64,
    #[serde(default = "default_reset_minutes")]
    pub reset_token_minutes: i64,
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_minutes: default_access_minutes(),
            refresh_token_days: default_refresh_days(),
            verification_token_hours: default_verify_hours(),
            reset_token_minutes: default_reset_minutes(),
            password_iterations: default_password_iterations(),
        }
    }
}

fn default_access_minutes() -> i64 { 30 }
fn default_refresh_days() -> i64 { 7 }
fn default_verify_hours() -> i64 { 24 }
fn default_reset_minutes() -> i64 { 60 }
fn default_password_iterations() -> u32 { 100_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Sender address; falls back to `smtp_user`
    pub from_email: Option<String>,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_user: None,
            smtp_password: None,
            from_email: None,
            frontend_url: default_frontend_url(),
        }
    }
}

fn default_smtp_port() -> u16 { 587 }
fn default_frontend_url() -> String { "http://localhost:5173".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Well-known environment variables and the config keys they override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("OPENAI_API_KEY", "embedding.api_key"),
    ("JWT_SECRET", "security.jwt_secret"),
    ("SMTP_HOST", "email.smtp_host"),
    ("SMTP_PORT", "email.smtp_port"),
    ("SMTP_USER", "email.smtp_user"),
    ("SMTP_PASSWORD", "email.smtp_password"),
    ("FROM_EMAIL", "email.from_email"),
    ("FRONTEND_URL", "email.frontend_url"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with SEMSEARCH)
    /// 5. Well-known variables such as DATABASE_URL and OPENAI_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., SEMSEARCH__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("SEMSEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_env_overrides(settings, |key| std::env::var(key).ok())?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("SEMSEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Sender address used for outgoing email
    pub fn from_email(&self) -> Option<&str> {
        self.email
            .from_email
            .as_deref()
            .or(self.email.smtp_user.as_deref())
    }
}

/// Layer well-known environment variables over the loaded configuration
fn apply_env_overrides<F>(settings: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder().add_source(settings);

    for (var, key) in ENV_OVERRIDES {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            builder = builder.set_override(*key, value)?;
        }
    }

    builder.build()
}
