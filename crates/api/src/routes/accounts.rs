//! Bank account routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use schoolmoney_core::ledger::{AccountBalance, BankAccount, BankOperation};
use schoolmoney_core::store::LedgerStore;
use schoolmoney_shared::types::BankAccountId;
use serde::Deserialize;

use crate::{AppState, error::ApiResult, middleware::AuthUser};

/// Creates the account routes (requires auth middleware to be applied externally).
pub fn routes<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/accounts", post(create_account::<S>))
        .route("/accounts/{account_id}/lock", put(set_lock::<S>))
        .route("/accounts/{account_id}/balance", get(get_balance::<S>))
        .route("/accounts/{account_id}/operations", get(list_operations::<S>))
}

/// Request body for locking or unlocking an account.
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    /// New lock flag.
    pub locked: bool,
}

/// POST `/accounts` - Create a standalone account (admin).
async fn create_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
) -> ApiResult<(StatusCode, Json<BankAccount>)> {
    let account = state.ledger.create_account(&auth.actor()).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// PUT `/accounts/{account_id}/lock` - Lock or unlock an account (admin).
async fn set_lock<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(account_id): Path<BankAccountId>,
    Json(payload): Json<LockRequest>,
) -> ApiResult<Json<BankAccount>> {
    let account = state
        .ledger
        .set_account_lock(&auth.actor(), account_id, payload.locked)
        .await?;
    Ok(Json(account))
}

/// GET `/accounts/{account_id}/balance` - Derived balance.
async fn get_balance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(account_id): Path<BankAccountId>,
) -> ApiResult<Json<AccountBalance>> {
    Ok(Json(state.ledger.balance(&auth.actor(), account_id).await?))
}

/// GET `/accounts/{account_id}/operations` - Every ledger row touching the account.
async fn list_operations<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Path(account_id): Path<BankAccountId>,
) -> ApiResult<Json<Vec<BankOperation>>> {
    let operations = state
        .ledger
        .view_operations(&auth.actor(), account_id)
        .await?;
    Ok(Json(operations))
}
