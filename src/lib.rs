pub mod cache;
pub mod config;
pub mod controllers;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::CacheService;
use crate::services::{identity::IdentityVerifier, payment::PaymentProcessor};
use crate::store::Store;

// Shared state for every handler; collaborators are injected at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub cache: Option<CacheService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityVerifier>,
        payments: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self { store, identity, payments, cache: None }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Full HTTP surface with tracing and CORS layers applied.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Court booking server is running" }))
        .route("/health", get(|| async { "OK" }))
        .merge(controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
