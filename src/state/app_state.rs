//! Application state shared across handlers

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtConfig;
use crate::pickup::PickupService;
use crate::settlement::SettlementCoordinator;
use crate::wallet::WalletLedger;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pickup_service: Arc<PickupService>,
    pub wallet_ledger: Arc<WalletLedger>,
    pub settlement: Arc<SettlementCoordinator>,
    pub jwt: Arc<JwtConfig>,
    pub ws_state: WsState,
    /// Absent for the in-memory backend
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        pickup_service: Arc<PickupService>,
        wallet_ledger: Arc<WalletLedger>,
        settlement: Arc<SettlementCoordinator>,
        jwt: Arc<JwtConfig>,
        ws_state: WsState,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            pickup_service,
            wallet_ledger,
            settlement,
            jwt,
            ws_state,
            db_pool,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<JwtConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt.clone()
    }
}

impl FromRef<AppState> for Arc<PickupService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.pickup_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletLedger> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_ledger.clone()
    }
}

impl FromRef<AppState> for Arc<SettlementCoordinator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.settlement.clone()
    }
}
