//! Supplier wallet endpoints.

use crate::{
    api::{ApiJson, AppState},
    core::{
        access::Principal,
        wallet::{self, WalletSummary, WithdrawalRequest},
    },
    entities::withdrawal,
    errors::Result,
};
use axum::{Json, extract::State, http::StatusCode};

/// `GET /wallet`
pub async fn summary(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<WalletSummary>> {
    let summary = wallet::get_wallet_summary(&state.db, &principal).await?;
    Ok(Json(summary))
}

/// `POST /wallet/withdrawals`
pub async fn withdraw(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(request): ApiJson<WithdrawalRequest>,
) -> Result<(StatusCode, Json<withdrawal::Model>)> {
    let created = wallet::request_withdrawal(&state.db, &principal, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
