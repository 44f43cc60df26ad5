//! Pickup route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::pickup;
use crate::state::AppState;

pub fn pickup_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/pickups",
            post(pickup::schedule_pickup).get(pickup::list_pickups),
        )
        .route(
            "/api/pickups/fees",
            get(pickup::get_fees).put(pickup::update_fees),
        )
        .route("/api/pickups/fees/quote", get(pickup::quote_fees))
        .route("/api/pickups/unpaid", get(pickup::unpaid_pickups))
        .route("/api/pickups/:id", get(pickup::get_pickup))
        .route("/api/pickups/:id/confirm", put(pickup::confirm_pickup))
        .route("/api/pickups/:id/reschedule", put(pickup::reschedule_pickup))
        .route("/api/pickups/:id/complete", put(pickup::complete_pickup))
        .route("/api/pickups/:id/cancel", put(pickup::cancel_pickup))
        .route("/api/pickups/:id/pay", post(pickup::pay_pickup))
}
