//! Wallet HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiResult;
use crate::handlers::AuthenticatedUser;
use crate::models::{ApiResponse, Page, PageRequest};
use crate::state::AppState;
use crate::wallet::{
    ListTransactionsQuery, Reconciliation, TopUpRequest, TransactionFilter, WalletResponse,
    WalletTransaction, WithdrawalRequest,
};

/// GET /api/wallet - balance of the caller's wallet, opened on first access
pub async fn get_wallet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<WalletResponse>>> {
    let account = state.wallet_ledger.get_account(user.user_id).await?;
    Ok(Json(ApiResponse::ok(account.into())))
}

/// GET /api/wallet/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<Json<ApiResponse<Page<WalletTransaction>>>> {
    let filter = TransactionFilter {
        transaction_type: query.transaction_type,
        category: query.category,
    };
    let page = state
        .wallet_ledger
        .list_transactions(user.user_id, &filter, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/wallet/topup
pub async fn top_up(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<TopUpRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<WalletTransaction>>)> {
    let tx = state.settlement.top_up_wallet(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(tx))))
}

/// POST /api/wallet/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<WithdrawalRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<WalletTransaction>>)> {
    let tx = state.wallet_ledger.withdraw(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(tx))))
}

/// GET /api/wallet/reconcile
pub async fn reconcile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Reconciliation>>> {
    let report = state.wallet_ledger.reconcile(user.user_id).await?;
    Ok(Json(ApiResponse::ok(report)))
}
