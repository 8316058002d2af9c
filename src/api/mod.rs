//! HTTP API of the relay.
//!
//! Endpoints:
//! - GET /health - Health check and key status
//! - POST /analyze - Analyze recipe text or an image URL
//! - POST /analyze/upload - Analyze an uploaded recipe file
//! - POST /labels - Render a report as printable labels

mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analysis::Analyzer;
use crate::config::{Config, LogVerbosity};
use crate::http::create_client_with_timeout;
use crate::upstream::ChatClient;

pub use types::*;

/// Application state shared across handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
    pub verbosity: LogVerbosity,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build state from configuration: one pooled client for all analyses.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = create_client_with_timeout(config.upstream.timeout())?;
        let chat = ChatClient::new(client, &config.upstream.base_url, &config.upstream.model)
            .with_api_key(config.upstream.api_key().map(str::to_string));

        Ok(Self {
            analyzer: Analyzer::new(chat),
            verbosity: config.app.log_verbosity,
            max_body_bytes: config.server.max_body_bytes,
        })
    }
}

/// Create the API router with the given state.
pub fn create_router_with_state(state: AppState) -> Router {
    // The browser front is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze/upload", post(handlers::analyze_upload))
        .route("/labels", post(handlers::render_labels_handler))
        .layer(body_limit)
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Create the API router from configuration.
pub fn create_router(config: &Config) -> Result<Router, reqwest::Error> {
    Ok(create_router_with_state(AppState::from_config(config)?))
}
