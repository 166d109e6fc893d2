//! Collection lifecycle routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use schoolmoney_core::collection::{
    Collection, CollectionOperation, CollectionStatus, CreateCollection, FinishOutcome,
    UpdateCollection,
};
use schoolmoney_core::ledger::AccountBalance;
use schoolmoney_core::store::LedgerStore;
use schoolmoney_shared::types::{ChildId, ClassGroupId, CollectionId};
use serde::Deserialize;
use tracing::debug;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
};

/// Creates the collection routes (requires auth middleware to be applied externally).
pub fn routes<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/collections", post(create_collection::<S>))
        .route(
            "/collections/{collection_id}",
            get(get_collection::<S>).patch(update_collection::<S>),
        )
        .route(
            "/collections/{collection_id}/operations",
            get(list_operations::<S>),
        )
        .route(
            "/collections/{collection_id}/children/{child_id}/pay",
            post(pay::<S>),
        )
        .route(
            "/collections/{collection_id}/children/{child_id}/unsubscribe",
            post(unsubscribe::<S>),
        )
        .route(
            "/collections/{collection_id}/children/{child_id}/restore",
            post(restore::<S>),
        )
        .route(
            "/collections/{collection_id}/children/{child_id}/refund",
            post(refund::<S>),
        )
        .route("/collections/{collection_id}/cancel", post(cancel::<S>))
        .route("/collections/{collection_id}/block", post(block::<S>))
        .route("/collections/{collection_id}/unblock", post(unblock::<S>))
        .route("/collections/{collection_id}/finish", post(finish::<S>))
        .route("/collections/{collection_id}/withdraw", post(withdraw::<S>))
        .route(
            "/class-groups/{class_id}/collections",
            get(list_for_class::<S>),
        )
}

/// Query parameters for listing a class's collections.
#[derive(Debug, Deserialize)]
pub struct ListCollectionsQuery {
    /// Filter by status, e.g. `OPEN`.
    pub status: Option<String>,
}

/// Request body for closing a collection.
#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    /// `finished` or `not_paid_before_deadline`.
    pub outcome: FinishOutcome,
}

/// Request body for a withdrawal from the collection account.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Amount to withdraw.
    pub amount: Decimal,
    /// Target IBAN, if any.
    #[serde(default)]
    pub target: Option<String>,
}

/// POST `/collections` - Create a collection in a class.
async fn create_collection<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<CreateCollection>,
) -> ApiResult<(StatusCode, Json<Collection>)> {
    let collection = state.collections.create(&auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

/// GET `/collections/{collection_id}`
async fn get_collection<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<Json<Collection>> {
    Ok(Json(
        state.collections.get(&auth.actor(), collection_id).await?,
    ))
}

/// PATCH `/collections/{collection_id}` - Edit name, description, deadline or price.
async fn update_collection<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
    Json(payload): Json<UpdateCollection>,
) -> ApiResult<Json<Collection>> {
    let collection = state
        .collections
        .update(&auth.actor(), collection_id, payload)
        .await?;
    Ok(Json(collection))
}

/// GET `/collections/{collection_id}/operations` - Participation history.
async fn list_operations<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<Json<Vec<CollectionOperation>>> {
    let rows = state
        .collections
        .operations(&auth.actor(), collection_id)
        .await?;
    Ok(Json(rows))
}

/// GET `/class-groups/{class_id}/collections`
async fn list_for_class<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(class_id): Path<ClassGroupId>,
    Query(query): Query<ListCollectionsQuery>,
) -> ApiResult<Json<Vec<Collection>>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            CollectionStatus::parse(raw)
                .ok_or_else(|| ApiError::validation(format!("unknown collection status: {raw}")))?,
        ),
    };

    let collections = state
        .collections
        .list_for_class(&auth.actor(), class_id, status)
        .await?;
    debug!(%class_id, count = collections.len(), "listed collections");
    Ok(Json(collections))
}

/// POST `/collections/{collection_id}/children/{child_id}/pay`
async fn pay<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path((collection_id, child_id)): Path<(CollectionId, ChildId)>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .pay(&auth.actor(), collection_id, child_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/children/{child_id}/unsubscribe`
async fn unsubscribe<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path((collection_id, child_id)): Path<(CollectionId, ChildId)>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .unsubscribe(&auth.actor(), collection_id, child_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/children/{child_id}/restore`
async fn restore<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path((collection_id, child_id)): Path<(CollectionId, ChildId)>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .restore(&auth.actor(), collection_id, child_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/children/{child_id}/refund`
async fn refund<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path((collection_id, child_id)): Path<(CollectionId, ChildId)>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .refund(&auth.actor(), collection_id, child_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/cancel` - Refund everyone and close.
async fn cancel<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .cancel(&auth.actor(), collection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/block` (admin)
async fn block<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<StatusCode> {
    state.collections.block(&auth.actor(), collection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/unblock` (admin)
async fn unblock<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .unblock(&auth.actor(), collection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/finish`
async fn finish<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
    Json(payload): Json<FinishRequest>,
) -> ApiResult<StatusCode> {
    state
        .collections
        .finish(&auth.actor(), collection_id, payload.outcome)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/collections/{collection_id}/withdraw` - Owner pays out of the collection account.
async fn withdraw<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(collection_id): Path<CollectionId>,
    Json(payload): Json<WithdrawRequest>,
) -> ApiResult<Json<AccountBalance>> {
    let balance = state
        .collections
        .withdraw(
            &auth.actor(),
            collection_id,
            payload.amount,
            payload.target.as_deref(),
        )
        .await?;
    Ok(Json(balance))
}
