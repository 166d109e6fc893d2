//! Parent profile and wallet routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use schoolmoney_core::access::{Parent, ParentProfile};
use schoolmoney_core::ledger::AccountBalance;
use schoolmoney_core::store::LedgerStore;
use serde::Deserialize;

use crate::{AppState, error::ApiResult, middleware::AuthUser};

/// Creates the parent routes (requires auth middleware to be applied externally).
pub fn routes<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/parents", post(register_parent::<S>))
        .route("/parents/me", get(get_profile::<S>))
        .route("/parents/me/deposit", post(deposit::<S>))
        .route("/parents/me/withdraw", post(withdraw::<S>))
}

/// Request body for a wallet deposit.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// Amount to deposit.
    pub amount: Decimal,
}

/// Request body for a withdrawal to an external account.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Amount to withdraw.
    pub amount: Decimal,
    /// Target IBAN, if any.
    #[serde(default)]
    pub target: Option<String>,
}

/// POST `/parents` - Register the caller's parent profile and wallet.
async fn register_parent<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<ParentProfile>,
) -> ApiResult<(StatusCode, Json<Parent>)> {
    let parent = state.ledger.register_parent(&auth.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(parent)))
}

/// GET `/parents/me` - The caller's profile.
async fn get_profile<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
) -> ApiResult<Json<Parent>> {
    Ok(Json(state.ledger.profile(&auth.actor()).await?))
}

/// POST `/parents/me/deposit` - Top up the caller's wallet.
async fn deposit<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<DepositRequest>,
) -> ApiResult<Json<AccountBalance>> {
    let balance = state.ledger.deposit(&auth.actor(), payload.amount).await?;
    Ok(Json(balance))
}

/// POST `/parents/me/withdraw` - Pay out of the caller's wallet.
async fn withdraw<S: LedgerStore>(
    State(state): State<AppState<S>>,
    auth: AuthUser,
    Json(payload): Json<WithdrawRequest>,
) -> ApiResult<Json<AccountBalance>> {
    let balance = state
        .ledger
        .withdraw(&auth.actor(), payload.amount, payload.target.as_deref())
        .await?;
    Ok(Json(balance))
}
