use thiserror::Error;

use crate::models::{Claims, NewUser, TokenResponse, TokenType, User};
use crate::services::database::{Database, DatabaseError};
use crate::services::email::EmailService;
use crate::services::security::{
    generate_refresh_token, password_fingerprint, sha256_hex, PasswordHasher, SecurityError, TokenIssuer,
};
use crate::services::users::{TokenRepository, UserRepository};

/// Errors raised by the account use cases
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already in use.")]
    EmailInUse,

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token.")]
    InvalidRefreshToken,

    #[error("Invalid or expired token.")]
    InvalidToken,

    #[error("Could not validate credentials.")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Security error: {0}")]
    Security(SecurityError),
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(_) => AuthError::EmailInUse,
            other => AuthError::Database(other),
        }
    }
}

impl From<SecurityError> for AuthError {
    fn from(err: SecurityError) -> Self {
        AuthError::Security(err)
    }
}

/// Registration, login, token rotation and password recovery
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    tokens: TokenRepository,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    email: EmailService,
}

impl AuthService {
    pub fn new(db: Database, hasher: PasswordHasher, issuer: TokenIssuer, email: EmailService) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            tokens: TokenRepository::new(db),
            hasher,
            issuer,
            email,
        }
    }

    pub fn tokens(&self) -> &TokenRepository {
        &self.tokens
    }

    /// Create an account and send a verification email
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let hashed_password = self.hasher.hash_in_background(password).await?;
        let user = self
            .users
            .save(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                hashed_password,
            })
            .await?;

        match self.issuer.create_verification_token(&user) {
            Ok(token) => self.email.send_verification_email(&user.email, &user.name, &token),
            Err(e) => tracing::error!("Could not create verification token for {}: {}", user.id, e),
        }

        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify_in_background(password, &user.hashed_password).await {
            tracing::info!("Failed login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Exchange a refresh token for a new pair; the old token is revoked
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let token_hash = sha256_hex(refresh_token);
        let record = self
            .tokens
            .find_refresh_token(&token_hash)
            .await?
            .filter(|r| r.is_usable(chrono::Utc::now()))
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Losing a race with another refresh of the same token counts as reuse
        if !self.tokens.revoke(&token_hash).await? {
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .users
            .find_by_id(&record.user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.issue_tokens(user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self.tokens.revoke(&sha256_hex(refresh_token)).await? {
            tracing::debug!("Refresh token revoked");
        }
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.decode(token, TokenType::Verify)?;
        self.users
            .mark_verified(&claims.user_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => AuthError::InvalidToken,
                other => other.into(),
            })?;

        self.users
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Email a reset link if the account exists; unknown emails are not revealed
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        match self.users.find_by_email(email).await? {
            Some(user) => {
                let token = self.issuer.create_reset_token(&user)?;
                self.email.send_password_reset_email(&user.email, &user.name, &token);
            }
            None => tracing::info!("Password reset requested for unknown email"),
        }
        Ok(())
    }

    /// Set a new password and revoke every refresh token of the user
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let claims = self.decode(token, TokenType::Reset)?;
        let user = self
            .users
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if claims.pwd.as_deref() != Some(password_fingerprint(&user.hashed_password).as_str()) {
            return Err(AuthError::InvalidToken);
        }

        let hashed_password = self.hasher.hash_in_background(new_password).await?;
        self.users.update_password(&user.id, &hashed_password).await?;
        let revoked = self.tokens.revoke_all_for_user(&user.id).await?;

        tracing::info!("Password reset for user {}, revoked {} sessions", user.id, revoked);
        Ok(())
    }

    /// Resolve the user behind an access token
    pub async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self
            .issuer
            .decode_as(access_token, TokenType::Access)
            .map_err(|_| AuthError::Unauthorized)?;

        self.users
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        self.issuer.decode_as(token, expected).map_err(|e| {
            tracing::debug!("Rejected {:?} token: {}", expected, e);
            AuthError::InvalidToken
        })
    }

    async fn issue_tokens(&self, user: User) -> Result<TokenResponse, AuthError> {
        let access_token = self.issuer.create_access_token(&user)?;
        let refresh_token = generate_refresh_token();
        let expires_at = chrono::Utc::now() + self.issuer.lifetimes().refresh;

        self.tokens
            .save_refresh_token(&sha256_hex(&refresh_token), &user.id, expires_at)
            .await?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            user: user.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::{EmailError, EmailMessage, EmailSender};
    use crate::services::security::TokenLifetimes;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct ChannelSender(mpsc::UnboundedSender<EmailMessage>);

    #[async_trait]
    impl EmailSender for ChannelSender {
        async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
            let _ = self.0.send(message);
            Ok(())
        }
    }

    async fn service(dir: &tempfile::TempDir) -> (AuthService, mpsc::UnboundedReceiver<EmailMessage>) {
        let url = format!("sqlite://{}", dir.path().join("auth.db").display());
        let db = Database::from_settings(&url, None, None, None, None).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let email = EmailService::new(Arc::new(ChannelSender(tx)), "http://app");

        let service = AuthService::new(
            db,
            PasswordHasher::new(10),
            TokenIssuer::new("test-secret", TokenLifetimes::default()),
            email,
        );
        (service, rx)
    }

    fn token_from_link(message: &EmailMessage) -> String {
        let start = message.html.find("token=").unwrap() + "token=".len();
        let rest = &message.html[start..];
        let end = rest.find('"').unwrap();
        urlencoding::decode(&rest[..end]).unwrap().into_owned()
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, _rx) = service(&dir).await;

        let user = auth.register("a@example.com", "password123", "Ann").await.unwrap();
        let tokens = auth.login("a@example.com", "password123").await.unwrap();

        assert_eq!(tokens.token_type, "bearer");
        assert_eq!(tokens.user.id, user.id);
        assert_eq!(auth.current_user(&tokens.access_token).await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, _rx) = service(&dir).await;

        auth.register("a@example.com", "password123", "Ann").await.unwrap();
        let err = auth.register("a@example.com", "password456", "Other").await.unwrap_err();

        assert!(matches!(err, AuthError::EmailInUse));
        assert_eq!(err.to_string(), "Email already in use.");
    }

    #[tokio::test]
    async fn test_login_wrong_password_or_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, _rx) = service(&dir).await;
        auth.register("a@example.com", "password123", "Ann").await.unwrap();

        assert!(matches!(
            auth.login("a@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_logout_revokes() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, _rx) = service(&dir).await;
        auth.register("a@example.com", "password123", "Ann").await.unwrap();
        let first = auth.login("a@example.com", "password123").await.unwrap();

        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(matches!(
            auth.refresh(&first.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        auth.logout(&second.refresh_token).await.unwrap();
        assert!(matches!(
            auth.refresh(&second.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_email_from_sent_link() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut rx) = service(&dir).await;

        auth.register("v@example.com", "password123", "Val").await.unwrap();
        let message = rx.recv().await.unwrap();
        assert_eq!(message.to, "v@example.com");

        let user = auth.verify_email(&token_from_link(&message)).await.unwrap();
        assert!(user.is_verified);

        assert!(matches!(auth.verify_email("garbage").await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_password_reset_is_single_use() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut rx) = service(&dir).await;
        auth.register("r@example.com", "password123", "Rae").await.unwrap();
        let _verification = rx.recv().await.unwrap();
        let session = auth.login("r@example.com", "password123").await.unwrap();

        auth.request_password_reset("r@example.com").await.unwrap();
        let token = token_from_link(&rx.recv().await.unwrap());

        auth.reset_password(&token, "brand-new-pass").await.unwrap();

        assert!(auth.login("r@example.com", "brand-new-pass").await.is_ok());
        assert!(matches!(
            auth.login("r@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.refresh(&session.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            auth.reset_password(&token, "another-pass").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_reset_request_for_unknown_email_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut rx) = service(&dir).await;

        auth.request_password_reset("ghost@example.com").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_current_user_rejects_other_token_types() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, mut rx) = service(&dir).await;
        auth.register("t@example.com", "password123", "Tom").await.unwrap();
        let verify_token = token_from_link(&rx.recv().await.unwrap());

        assert!(matches!(
            auth.current_user(&verify_token).await,
            Err(AuthError::Unauthorized)
        ));
    }
}
