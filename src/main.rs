//! RoundBuy Server
//!
//! HTTP API for scheduling pickups, the buyer wallet ledger, and pickup fee
//! settlement.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use roundbuy_server::auth::JwtConfig;
use roundbuy_server::config::{Config, StorageBackend};
use roundbuy_server::db;
use roundbuy_server::integrations::{
    HttpPaymentGateway, MarketplaceClient, PaymentGateway, SimulatedPaymentGateway,
};
use roundbuy_server::pickup::{InMemoryPickupStore, PgPickupStore, PickupService, PickupStore};
use roundbuy_server::routes;
use roundbuy_server::settlement::SettlementCoordinator;
use roundbuy_server::state::AppState;
use roundbuy_server::wallet::{
    reconciliation_auditor, InMemoryLedgerStore, LedgerStore, PgLedgerStore, WalletLedger,
};
use roundbuy_server::websocket::WsState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        storage = ?config.storage_backend,
        currency = %config.fee_schedule.currency,
        "Starting RoundBuy server"
    );

    let db_pool = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool).await?;
            Some(pool)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            None
        }
    };

    let pickup_store: Arc<dyn PickupStore> = match &db_pool {
        Some(pool) => Arc::new(PgPickupStore::new(pool.clone())),
        None => Arc::new(InMemoryPickupStore::new()),
    };
    let ledger_store: Arc<dyn LedgerStore> = match &db_pool {
        Some(pool) => Arc::new(PgLedgerStore::new(pool.clone())),
        None => Arc::new(InMemoryLedgerStore::new()),
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
        Some(url) => Arc::new(
            HttpPaymentGateway::new(
                url.clone(),
                config.payment_gateway_api_key.clone(),
                config.upstream_timeout,
            )
            .context("Failed to build payment gateway client")?,
        ),
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, using simulated payment gateway");
            Arc::new(SimulatedPaymentGateway)
        }
    };

    let marketplace = Arc::new(
        MarketplaceClient::new(config.marketplace_api_url.clone(), config.upstream_timeout)
            .context("Failed to build marketplace client")?,
    );
    let ws_state = WsState::new();

    let pickup_service = Arc::new(PickupService::new(
        pickup_store,
        marketplace.clone(),
        marketplace,
        Arc::new(ws_state.clone()),
        config.fee_schedule.clone(),
    ));
    let wallet_ledger = Arc::new(WalletLedger::new(
        ledger_store,
        config.fee_schedule.currency.clone(),
    ));
    let settlement = Arc::new(SettlementCoordinator::new(
        pickup_service.clone(),
        wallet_ledger.clone(),
        gateway,
    ));

    let auditor_ledger = wallet_ledger.clone();
    let audit_interval = config.ledger_audit_interval;
    tokio::spawn(async move {
        reconciliation_auditor(auditor_ledger, audit_interval).await;
        tracing::error!("Ledger auditor exited unexpectedly");
    });

    let app_state = AppState::new(
        pickup_service,
        wallet_ledger,
        settlement,
        Arc::new(JwtConfig::new(config.jwt_secret.clone())),
        ws_state,
        db_pool,
    );

    let app = routes::app(app_state, config.cors_allowed_origins.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("WebSocket available at ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
