//! Ledger storage seam and the in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Page, PageRequest};
use crate::wallet::{NewWalletTransaction, TransactionFilter, WalletAccount, WalletTransaction};

/// Persistence for wallet accounts and their append-only transaction chains.
///
/// `append` is the only way a balance changes. It must write the entry and
/// the new balance together, and only if the account is still at the version
/// the caller read.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Return the user's account, creating a zero-balance one if absent
    async fn find_or_create_account(&self, user_id: Uuid, currency: &str)
        -> ServiceResult<WalletAccount>;

    /// Append an entry at `account.version + 1` and move the balance to
    /// `entry.balance_after`. Fails with `StateConflict` if the stored
    /// version moved since `account` was read.
    async fn append(
        &self,
        account: &WalletAccount,
        entry: NewWalletTransaction,
    ) -> ServiceResult<WalletTransaction>;

    /// Newest first
    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<WalletTransaction>>;

    /// Whole chain, oldest first
    async fn transactions_in_order(&self, wallet_id: Uuid) -> ServiceResult<Vec<WalletTransaction>>;

    async fn list_accounts(&self) -> ServiceResult<Vec<WalletAccount>>;
}

#[derive(Default)]
struct MemoryLedger {
    accounts: HashMap<Uuid, WalletAccount>,
    chains: HashMap<Uuid, Vec<WalletTransaction>>,
}

/// Process-local ledger used for `STORAGE_BACKEND=memory` and tests
#[derive(Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<MemoryLedger>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_or_create_account(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> ServiceResult<WalletAccount> {
        let mut ledger = self.inner.write().await;
        let account = ledger.accounts.entry(user_id).or_insert_with(|| {
            let now = Utc::now();
            WalletAccount {
                id: Uuid::new_v4(),
                user_id,
                balance: rust_decimal::Decimal::ZERO,
                currency: currency.to_string(),
                version: 0,
                created_at: now,
                updated_at: now,
            }
        });
        Ok(account.clone())
    }

    async fn append(
        &self,
        account: &WalletAccount,
        entry: NewWalletTransaction,
    ) -> ServiceResult<WalletTransaction> {
        let mut ledger = self.inner.write().await;
        let current = ledger
            .accounts
            .get_mut(&account.user_id)
            .ok_or_else(|| ServiceError::NotFound("Wallet".to_string()))?;

        if current.version != account.version {
            return Err(ServiceError::StateConflict(format!(
                "Wallet {} moved from version {} to {}",
                account.id, account.version, current.version
            )));
        }

        let now = Utc::now();
        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id: current.id,
            sequence: current.version + 1,
            transaction_type: entry.transaction_type,
            category: entry.category,
            amount: entry.amount,
            balance_after: entry.balance_after,
            description: entry.description,
            reference: entry.reference,
            created_at: now,
        };

        current.balance = tx.balance_after;
        current.version = tx.sequence;
        current.updated_at = now;
        let wallet_id = current.id;

        ledger.chains.entry(wallet_id).or_default().push(tx.clone());
        Ok(tx)
    }

    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<WalletTransaction>> {
        let ledger = self.inner.read().await;
        let matching: Vec<WalletTransaction> = ledger
            .chains
            .get(&wallet_id)
            .map(|chain| {
                chain
                    .iter()
                    .rev()
                    .filter(|tx| filter.matches(tx))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let total = matching.len() as i64;
        Ok(Page::new(page.slice(&matching), total, page))
    }

    async fn transactions_in_order(&self, wallet_id: Uuid) -> ServiceResult<Vec<WalletTransaction>> {
        let ledger = self.inner.read().await;
        Ok(ledger.chains.get(&wallet_id).cloned().unwrap_or_default())
    }

    async fn list_accounts(&self) -> ServiceResult<Vec<WalletAccount>> {
        Ok(self.inner.read().await.accounts.values().cloned().collect())
    }
}
