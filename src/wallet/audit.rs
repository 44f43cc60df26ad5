//! Background ledger auditor

use std::sync::Arc;
use std::time::Duration;

use crate::wallet::WalletLedger;

/// Periodically reconcile every wallet and log any broken chain
pub async fn reconciliation_auditor(ledger: Arc<WalletLedger>, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting ledger auditor");

    loop {
        tokio::time::sleep(interval).await;

        match ledger.audit().await {
            Ok(mismatches) if mismatches.is_empty() => {
                tracing::debug!("Ledger audit passed");
            }
            Ok(mismatches) => {
                for report in mismatches {
                    tracing::error!(
                        wallet_id = %report.wallet_id,
                        user_id = %report.user_id,
                        replayed_balance = %report.replayed_balance,
                        stored_balance = %report.stored_balance,
                        first_mismatch = ?report.first_mismatch,
                        "Wallet ledger failed reconciliation"
                    );
                }
            }
            Err(e) => {
                tracing::error!("Error auditing wallet ledger: {}", e);
            }
        }
    }
}
