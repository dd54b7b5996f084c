use actix_web::{web, HttpResponse, Responder};

use super::AppState;
use crate::models::HealthResponse;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

/// Health check endpoint
///
/// 200 once the database answers; 503 otherwise, which the container
/// runtime counts as a failed probe.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = match state.database.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            false
        }
    };

    let body = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        documents: state.search.document_count(),
    };

    if db_healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
