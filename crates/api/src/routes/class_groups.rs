//! Class group, child and guardian routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use schoolmoney_core::access::{Child, ClassGroup, NewChild};
use schoolmoney_core::store::LedgerStore;
use schoolmoney_shared::types::{ChildId, ClassGroupId, ParentId};
use serde::Deserialize;

use crate::{AppState, error::ApiResult, middleware::AuthUser};

/// Creates the class group routes (requires auth middleware to be applied externally).
pub fn routes<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/class-groups", post(create_class_group::<S>))
        .route("/class-groups/{class_id}", get(get_class_group::<S>))
        .route("/class-groups/{class_id}/cashier", put(transfer_cashier::<S>))
        .route("/children", post(register_child::<S>))
        .route("/children/{child_id}/guardians", post(add_guardian::<S>))
}

/// Request body for creating a class group.
#[derive(Debug, Deserialize)]
pub struct CreateClassGroupRequest {
    /// Unique class name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body naming a parent.
#[derive(Debug, Deserialize)]
pub struct ParentRequest {
    /// The parent.
    pub parent_id: ParentId,
}

/// POST `/class-groups` - Create a class; the caller becomes its cashier.
async fn create_class_group<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<CreateClassGroupRequest>,
) -> ApiResult<(StatusCode, Json<ClassGroup>)> {
    let group = state
        .directory
        .create_class_group(&auth.actor(), &payload.name, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET `/class-groups/{class_id}`
async fn get_class_group<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(class_id): Path<ClassGroupId>,
) -> ApiResult<Json<ClassGroup>> {
    Ok(Json(state.directory.class_group(&auth.actor(), class_id).await?))
}

/// PUT `/class-groups/{class_id}/cashier` - Hand the cashier role to another member.
async fn transfer_cashier<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(class_id): Path<ClassGroupId>,
    Json(payload): Json<ParentRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .transfer_cashier(&auth.actor(), class_id, payload.parent_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/children` - Enrol a child (admin).
async fn register_child<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<NewChild>,
) -> ApiResult<(StatusCode, Json<Child>)> {
    let child = state.directory.register_child(&auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(child)))
}

/// POST `/children/{child_id}/guardians` - Add a guardian.
async fn add_guardian<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(child_id): Path<ChildId>,
    Json(payload): Json<ParentRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .add_guardian(&auth.actor(), child_id, payload.parent_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
