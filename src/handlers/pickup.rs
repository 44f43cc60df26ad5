//! Pickup and fee HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::fees::{FeeBreakdown, FeeSchedule, QuoteQuery};
use crate::handlers::{AdminUser, AuthenticatedUser};
use crate::models::{ApiResponse, Page, PageRequest};
use crate::pickup::{
    CancelPickupRequest, ListPickupsQuery, Pickup, ReschedulePickupRequest, SchedulePickupRequest,
    TransitionRequest,
};
use crate::settlement::{PayPickupRequest, Receipt};
use crate::state::AppState;

/// GET /api/pickups/fees
pub async fn get_fees(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<ApiResponse<FeeSchedule>> {
    Json(ApiResponse::ok(state.pickup_service.current_fees().await))
}

/// PUT /api/pickups/fees
pub async fn update_fees(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(schedule): Json<FeeSchedule>,
) -> ApiResult<Json<ApiResponse<FeeSchedule>>> {
    let schedule = state.pickup_service.update_fees(schedule).await?;
    tracing::info!(admin_id = %admin.user_id, "Fee schedule replaced by admin");
    Ok(Json(ApiResponse::ok(schedule)))
}

/// GET /api/pickups/fees/quote?item_price=
pub async fn quote_fees(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Json<ApiResponse<FeeBreakdown>>> {
    let breakdown = state.pickup_service.quote(query.item_price).await?;
    Ok(Json(ApiResponse::ok(breakdown)))
}

/// POST /api/pickups
pub async fn schedule_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SchedulePickupRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Pickup>>)> {
    let pickup = state.pickup_service.schedule(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(pickup))))
}

/// GET /api/pickups
pub async fn list_pickups(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListPickupsQuery>,
) -> ApiResult<Json<ApiResponse<Page<Pickup>>>> {
    let page = state.pickup_service.list(user.user_id, query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/pickups/unpaid
pub async fn unpaid_pickups(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListPickupsQuery>,
) -> ApiResult<Json<ApiResponse<Page<Pickup>>>> {
    let page = state
        .pickup_service
        .unpaid(user.user_id, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/pickups/:id
pub async fn get_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Pickup>>> {
    let pickup = state.pickup_service.get(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(pickup)))
}

/// PUT /api/pickups/:id/confirm
pub async fn confirm_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<ApiResponse<Pickup>>> {
    let pickup = state
        .pickup_service
        .confirm(id, user.user_id, request.expected_status)
        .await?;
    Ok(Json(ApiResponse::ok(pickup)))
}

/// PUT /api/pickups/:id/reschedule
pub async fn reschedule_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReschedulePickupRequest>,
) -> ApiResult<Json<ApiResponse<Pickup>>> {
    let pickup = state
        .pickup_service
        .reschedule(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(pickup)))
}

/// PUT /api/pickups/:id/complete
pub async fn complete_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<ApiResponse<Pickup>>> {
    let pickup = state
        .pickup_service
        .complete(id, user.user_id, request.expected_status)
        .await?;
    Ok(Json(ApiResponse::ok(pickup)))
}

/// PUT /api/pickups/:id/cancel
pub async fn cancel_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelPickupRequest>,
) -> ApiResult<Json<ApiResponse<Pickup>>> {
    let pickup = state.pickup_service.cancel(id, user.user_id, request).await?;
    Ok(Json(ApiResponse::ok(pickup)))
}

/// POST /api/pickups/:id/pay
pub async fn pay_pickup(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PayPickupRequest>,
) -> ApiResult<Json<ApiResponse<Receipt>>> {
    let receipt = state
        .settlement
        .pay_pickup_fee(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(receipt)))
}
