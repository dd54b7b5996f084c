use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{Claims, TokenType, User};

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Errors raised by password hashing and token handling
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Unexpected token type: expected {expected:?}, got {actual:?}")]
    WrongTokenType { expected: TokenType, actual: TokenType },
}

/// PBKDF2-HMAC-SHA256 password hasher
///
/// Hashes are stored as `pbkdf2-sha256$<iterations>$<salt hex>$<key hex>`,
/// so the iteration count can change without invalidating old hashes.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations: iterations.max(1) }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
        let key = pbkdf2_sha256(password.as_bytes(), &salt, self.iterations);

        format!(
            "{}${}${}${}",
            HASH_SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(key)
        )
    }

    /// Check a password against a stored hash; malformed hashes never verify
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match verify_password(password, stored) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Rejecting password check: {}", e);
                false
            }
        }
    }

    /// `hash` on the blocking pool, keeping async workers free
    pub async fn hash_in_background(&self, password: &str) -> Result<String, SecurityError> {
        let hasher = *self;
        let password = password.to_string();
        Ok(tokio::task::spawn_blocking(move || hasher.hash(&password)).await?)
    }

    /// `verify` on the blocking pool; a failed task never verifies
    pub async fn verify_in_background(&self, password: &str, stored: &str) -> bool {
        let hasher = *self;
        let password = password.to_string();
        let stored = stored.to_string();

        match tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!("Password check task failed: {}", e);
                false
            }
        }
    }
}

fn verify_password(password: &str, stored: &str) -> Result<bool, SecurityError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(key), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SecurityError::MalformedHash);
    };

    if scheme != HASH_SCHEME {
        return Err(SecurityError::MalformedHash);
    }

    let iterations: u32 = iterations.parse().map_err(|_| SecurityError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| SecurityError::MalformedHash)?;
    let expected = hex::decode(key).map_err(|_| SecurityError::MalformedHash)?;

    let actual = pbkdf2_sha256(password.as_bytes(), &salt, iterations);
    Ok(constant_time_eq(&actual, &expected))
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, KEY_LEN>(password, salt, iterations)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Hex SHA-256 digest; used to store refresh tokens and fingerprint hashes
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random opaque token (64 hex characters)
pub fn generate_refresh_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Short fingerprint of a password hash, embedded in reset tokens
pub fn password_fingerprint(hashed_password: &str) -> String {
    sha256_hex(hashed_password)[..16].to_string()
}

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: chrono::Duration,
    pub refresh: chrono::Duration,
    pub verification: chrono::Duration,
    pub reset: chrono::Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: chrono::Duration::minutes(30),
            refresh: chrono::Duration::days(7),
            verification: chrono::Duration::hours(24),
            reset: chrono::Duration::minutes(60),
        }
    }
}

/// Issues and validates HS256 JWTs
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetimes,
        }
    }

    /// Issuer with a random secret; tokens do not survive a restart
    pub fn with_random_secret(lifetimes: TokenLifetimes) -> Self {
        Self::new(&generate_refresh_token(), lifetimes)
    }

    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }

    fn issue(&self, user: &User, token_type: TokenType, ttl: chrono::Duration, pwd: Option<String>) -> Result<String, SecurityError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
            pwd,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn create_access_token(&self, user: &User) -> Result<String, SecurityError> {
        self.issue(user, TokenType::Access, self.lifetimes.access, None)
    }

    pub fn create_verification_token(&self, user: &User) -> Result<String, SecurityError> {
        self.issue(user, TokenType::Verify, self.lifetimes.verification, None)
    }

    /// Reset tokens carry a fingerprint of the current password hash, so
    /// they stop working once the password changes
    pub fn create_reset_token(&self, user: &User) -> Result<String, SecurityError> {
        let fingerprint = password_fingerprint(&user.hashed_password);
        self.issue(user, TokenType::Reset, self.lifetimes.reset, Some(fingerprint))
    }

    /// Decode and validate a token of any type
    pub fn decode(&self, token: &str) -> Result<Claims, SecurityError> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }

    /// Decode a token and require the given type
    pub fn decode_as(&self, token: &str, expected: TokenType) -> Result<Claims, SecurityError> {
        let claims = self.decode(token)?;
        if claims.token_type != expected {
            return Err(SecurityError::WrongTokenType {
                expected,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_user() -> User {
        User {
            id: "test_user_123".to_string(),
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            hashed_password: "pbkdf2-sha256$1$00$00".to_string(),
            is_verified: false,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_password_hashing_and_verification() {
        let hasher = PasswordHasher::new(1_000);
        let password = "mySuperSecurePassword123";
        let hashed = hasher.hash(password);

        assert_ne!(hashed, password);
        assert!(hashed.starts_with("pbkdf2-sha256$1000$"));
        assert!(hasher.verify(password, &hashed));
        assert!(!hasher.verify("wrongPassword", &hashed));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hasher = PasswordHasher::new(10);
        assert_ne!(hasher.hash("pw"), hasher.hash("pw"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = PasswordHasher::new(10);

        assert!(!hasher.verify("pw", "plain-text"));
        assert!(!hasher.verify("pw", "bcrypt$10$aa$bb"));
        assert!(!hasher.verify("pw", "pbkdf2-sha256$x$aa$bb"));
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        // RFC 7914 section 11 test vector for PBKDF2-HMAC-SHA256
        let key = pbkdf2_sha256(b"passwd", b"salt", 1);
        assert_eq!(
            hex::encode(key),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[tokio::test]
    async fn test_background_hashing_leaves_runtime_free() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        let hasher = PasswordHasher::new(50_000);
        let hashed = hasher.hash_in_background("pw").await.unwrap();
        ticker.abort();

        assert!(ticks.load(Ordering::Relaxed) > 0);
        assert!(hasher.verify_in_background("pw", &hashed).await);
        assert!(!hasher.verify_in_background("other", &hashed).await);
    }

    #[test]
    fn test_jwt_token_creation_and_decoding() {
        let issuer = TokenIssuer::new("secret", TokenLifetimes::default());
        let token = issuer.create_access_token(&test_user()).unwrap();

        let claims = issuer.decode(&token).unwrap();

        assert_eq!(claims.user_id, "test_user_123");
        assert_eq!(claims.email, "test@example.com");
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_decode_invalid_token_fails() {
        let issuer = TokenIssuer::new("secret", TokenLifetimes::default());
        assert!(issuer.decode("this.is.not.a.valid.token").is_err());

        let other = TokenIssuer::new("other-secret", TokenLifetimes::default());
        let token = other.create_access_token(&test_user()).unwrap();
        assert!(issuer.decode(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let lifetimes = TokenLifetimes {
            access: chrono::Duration::minutes(-10),
            ..TokenLifetimes::default()
        };
        let issuer = TokenIssuer::new("secret", lifetimes);
        let token = issuer.create_access_token(&test_user()).unwrap();

        assert!(issuer.decode(&token).is_err());
    }

    #[test]
    fn test_decode_as_checks_type() {
        let issuer = TokenIssuer::new("secret", TokenLifetimes::default());
        let verify = issuer.create_verification_token(&test_user()).unwrap();

        assert!(issuer.decode_as(&verify, TokenType::Verify).is_ok());
        assert!(matches!(
            issuer.decode_as(&verify, TokenType::Access),
            Err(SecurityError::WrongTokenType { .. })
        ));
    }

    #[test]
    fn test_reset_token_carries_fingerprint() {
        let issuer = TokenIssuer::new("secret", TokenLifetimes::default());
        let user = test_user();
        let token = issuer.create_reset_token(&user).unwrap();

        let claims = issuer.decode_as(&token, TokenType::Reset).unwrap();
        assert_eq!(claims.pwd, Some(password_fingerprint(&user.hashed_password)));
    }

    #[test]
    fn test_refresh_tokens_are_random_hex() {
        let a = generate_refresh_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_refresh_token());
        assert_eq!(sha256_hex(&a).len(), 64);
    }
}
