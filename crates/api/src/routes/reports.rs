//! Report routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use schoolmoney_core::reports::{
    ChildrenFinancialStatus, ClassFinancialReport, CollectionFinancialReport,
};
use schoolmoney_core::store::LedgerStore;
use schoolmoney_shared::types::{ClassGroupId, CollectionId};

use crate::{AppState, error::ApiResult, middleware::AuthUser};

/// Creates the report routes (requires auth middleware to be applied externally).
pub fn routes<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/collections/{collection_id}/children-status",
            get(children_status::<S>),
        )
        .route(
            "/collections/{collection_id}/report",
            get(collection_report::<S>),
        )
        .route("/class-groups/{class_id}/report", get(class_report::<S>))
}

/// GET `/collections/{collection_id}/children-status` - Paid, unpaid and excluded children.
async fn children_status<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<Json<ChildrenFinancialStatus>> {
    let status = state
        .reports
        .children_financial_status(&auth.actor(), collection_id)
        .await?;
    Ok(Json(status))
}

/// GET `/collections/{collection_id}/report`
async fn collection_report<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<Json<CollectionFinancialReport>> {
    let report = state
        .reports
        .financial_report(&auth.actor(), collection_id)
        .await?;
    Ok(Json(report))
}

/// GET `/class-groups/{class_id}/report` - Every collection of the class with totals.
async fn class_report<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(class_id): Path<ClassGroupId>,
) -> ApiResult<Json<ClassFinancialReport>> {
    let report = state
        .reports
        .class_financial_report(&auth.actor(), class_id)
        .await?;
    Ok(Json(report))
}
