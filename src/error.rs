use actix_web::{error, http::header, http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::services::{AuthError, SearchError};

/// Error returned by HTTP handlers, rendered as an `ErrorResponse` body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidJson(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::InvalidJson(_) => "invalid_json",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut builder = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }

        builder.json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        tracing::info!("Validation failed: {:?}", errors);
        ApiError::Validation(errors.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidDocument(e) => ApiError::BadRequest(e.to_string()),
            SearchError::NotFound(id) => ApiError::NotFound(format!("Document {} not found.", id)),
            other => {
                tracing::error!("Search request failed: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailInUse | AuthError::InvalidToken => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidRefreshToken | AuthError::Unauthorized => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Database(_) | AuthError::Security(_) => {
                tracing::error!("Account request failed: {}", err);
                ApiError::Internal
            }
        }
    }
}

/// Handle JSON payload errors
///
/// Bodies that are not JSON get 400; JSON that does not fit the request
/// type (missing fields, wrong types) gets 422.
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);

    match &err {
        error::JsonPayloadError::Deserialize(e) if e.is_data() => {
            ApiError::Validation(format!("Invalid request body: {}", e)).into()
        }
        _ => ApiError::InvalidJson(format!("Invalid JSON: {}", err)).into(),
    }
}

/// Handle urlencoded form errors
pub fn handle_form_payload_error(err: error::UrlencodedError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Form payload error on {}: {}", req.path(), err);

    match &err {
        error::UrlencodedError::Parse(e) => ApiError::Validation(format!("Invalid form: {}", e)).into(),
        _ => ApiError::BadRequest(format!("Invalid form: {}", err)).into(),
    }
}

/// JSON extractor config with the error handler installed
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(handle_json_payload_error)
}

/// Form extractor config with the error handler installed
pub fn form_config() -> actix_web::web::FormConfig {
    actix_web::web::FormConfig::default().error_handler(handle_form_payload_error)
}
