// Route exports
pub mod auth;
pub mod documents;
pub mod health;

use actix_web::web;
use std::sync::Arc;

use crate::services::{AuthService, Database, SearchService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub search: Arc<SearchService>,
    pub auth: AuthService,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure)
        .configure(documents::configure)
        .service(web::scope("/auth").configure(auth::configure));
}
