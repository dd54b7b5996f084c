use actix_web::{web, HttpResponse};
use validator::Validate;

use super::AppState;
use crate::error::ApiError;
use crate::models::{DocumentId, DocumentResponse, IndexRequest, IndexResponse, SearchRequest, SearchResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/documents", web::post().to(index_document))
        .route("/documents/{id}", web::get().to(get_document))
        .route("/documents/{id}", web::delete().to(delete_document))
        .route("/search", web::post().to(search));
}

/// Index a document
///
/// POST /documents
///
/// Request body:
/// ```json
/// { "content": "The sky is blue." }
/// ```
async fn index_document(
    state: web::Data<AppState>,
    req: web::Json<IndexRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let id = state.search.index_document(&req.content).await?;

    Ok(HttpResponse::Created().json(IndexResponse::indexed(id.0)))
}

async fn get_document(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = DocumentId(path.into_inner());
    let document = state.search.get_document(&id).await?;

    Ok(HttpResponse::Ok().json(DocumentResponse {
        id: document.id.0,
        content: document.content,
        created_at: document.created_at,
    }))
}

async fn delete_document(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = DocumentId(path.into_inner());
    state.search.delete_document(&id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Semantic search
///
/// POST /search
///
/// Request body:
/// ```json
/// { "query": "What color is the sky?", "top_k": 3 }
/// ```
async fn search(
    state: web::Data<AppState>,
    req: web::Json<SearchRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    tracing::info!("Searching with top_k={}", req.top_k);
    let results = state.search.search(&req.query, req.top_k).await?;

    Ok(HttpResponse::Ok().json(SearchResponse { results }))
}
