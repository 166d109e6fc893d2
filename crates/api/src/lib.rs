//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - Bearer token authentication middleware
//! - JSON error responses
//!
//! The router is generic over the storage backend so the same routes run on
//! PostgreSQL in production and on the in-process store in tests.

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use schoolmoney_core::access::DirectoryService;
use schoolmoney_core::collection::CollectionEngine;
use schoolmoney_core::ledger::{AccountFactory, LedgerEngine};
use schoolmoney_core::reports::ReportEngine;
use schoolmoney_core::store::LedgerStore;
use schoolmoney_shared::JwtService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Application state shared across handlers.
#[derive(Debug)]
pub struct AppState<S> {
    /// Parent wallets and standalone accounts.
    pub ledger: LedgerEngine<S>,
    /// Collection lifecycle.
    pub collections: CollectionEngine<S>,
    /// Class groups, children and roles.
    pub directory: DirectoryService<S>,
    /// Participation and money summaries.
    pub reports: ReportEngine<S>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            collections: self.collections.clone(),
            directory: self.directory.clone(),
            reports: self.reports.clone(),
            jwt_service: Arc::clone(&self.jwt_service),
        }
    }
}

impl<S: LedgerStore> AppState<S> {
    /// Wires every engine to one store.
    #[must_use]
    pub fn new(store: Arc<S>, accounts: AccountFactory, jwt_service: Arc<JwtService>) -> Self {
        Self {
            ledger: LedgerEngine::new(Arc::clone(&store), accounts.clone()),
            collections: CollectionEngine::new(Arc::clone(&store), accounts),
            directory: DirectoryService::new(Arc::clone(&store)),
            reports: ReportEngine::new(store),
            jwt_service,
        }
    }
}

/// Creates the main application router.
///
/// An empty `cors_origins` list allows any origin.
pub fn create_router<S: LedgerStore>(state: AppState<S>, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}
