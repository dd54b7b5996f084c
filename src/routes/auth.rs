use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest, HttpResponse};
use std::future::Future;
use std::pin::Pin;
use validator::Validate;

use super::AppState;
use crate::error::ApiError;
use crate::models::{
    ForgotPasswordRequest, LoginForm, MessageResponse, RefreshRequest, RegisterRequest, RegisterResponse,
    ResetPasswordRequest, User, UserResponse, VerifyEmailRequest,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/refresh", web::post().to(refresh))
        .route("/logout", web::post().to(logout))
        .route("/me", web::get().to(me))
        .route("/verify-email", web::post().to(verify_email))
        .route("/forgot-password", web::post().to(forgot_password))
        .route("/reset-password", web::post().to(reset_password));
}

/// Extract the token from an `Authorization: Bearer ...` header
fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The user identified by the request's bearer access token
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req).map(str::to_string);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let token = token.ok_or_else(|| ApiError::Unauthorized("Not authenticated.".into()))?;
            let state = state.ok_or(ApiError::Internal)?;

            let user = state.auth.current_user(&token).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}

async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let user = state.auth.register(&req.email, &req.password, &req.name).await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "User registered successfully. Please check your email to verify your account.".to_string(),
        user_id: user.id,
    }))
}

/// OAuth2 password flow: `username` carries the email
async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, ApiError> {
    form.validate()?;

    let tokens = state.auth.login(&form.username, &form.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

async fn refresh(
    state: web::Data<AppState>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let tokens = state.auth.refresh(&req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

async fn logout(
    state: web::Data<AppState>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    state.auth.logout(&req.refresh_token).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(user.0))
}

async fn verify_email(
    state: web::Data<AppState>,
    req: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    state.auth.verify_email(&req.token).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Email verified successfully.")))
}

async fn forgot_password(
    state: web::Data<AppState>,
    req: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    state.auth.request_password_reset(&req.email).await?;
    Ok(HttpResponse::Accepted().json(MessageResponse::new(
        "If an account exists for this email, a reset link has been sent.",
    )))
}

async fn reset_password(
    state: web::Data<AppState>,
    req: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    state.auth.reset_password(&req.token, &req.new_password).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password has been reset successfully.")))
}
