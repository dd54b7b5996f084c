//! Semantic search service
//!
//! Indexes short texts as embedding vectors in a flat L2 index, answers
//! nearest-neighbour queries over HTTP, and manages user accounts with
//! JWT access tokens and rotating refresh tokens.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;

// Re-export commonly used types
pub use crate::core::{FlatIndex, HealthTracker, ProbePolicy};
pub use config::Settings;
pub use error::ApiError;
pub use routes::{configure_routes, AppState};
pub use startup::{build_state, init_logging};
