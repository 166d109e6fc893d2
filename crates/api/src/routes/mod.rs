//! API route definitions.

use axum::{Router, middleware};
use schoolmoney_core::store::LedgerStore;

use crate::{AppState, middleware::auth_middleware};

pub mod accounts;
pub mod class_groups;
pub mod collections;
pub mod health;
pub mod parents;
pub mod reports;

/// Creates the API router: public health checks plus every authenticated route.
pub fn api_routes_with_state<S: LedgerStore>(state: AppState<S>) -> Router<AppState<S>> {
    let protected_routes = Router::new()
        .merge(parents::routes())
        .merge(accounts::routes())
        .merge(class_groups::routes())
        .merge(collections::routes())
        .merge(reports::routes())
        .layer(middleware::from_fn_with_state(state, auth_middleware::<S>));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
