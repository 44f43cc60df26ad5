//! Wallet ledger - the only writer of wallet balances

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::fees::round_money;
use crate::locks::KeyedLocks;
use crate::models::{Page, PageRequest};
use crate::wallet::{
    LedgerPosting, LedgerStore, NewWalletTransaction, Reconciliation, TransactionCategory,
    TransactionFilter, TransactionType, WalletAccount, WalletTransaction, WithdrawalRequest,
};

/// Appends attempted per posting before a version conflict is returned
const MAX_APPEND_ATTEMPTS: usize = 3;

/// Append-only wallet ledger.
///
/// Every credit and debit for a user runs under that user's lock, so the
/// balance read and the appended `balance_after` are atomic with respect to
/// other callers in this process. The store's version check catches writers
/// in other processes.
pub struct WalletLedger {
    store: Arc<dyn LedgerStore>,
    locks: KeyedLocks<Uuid>,
    currency: String,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn LedgerStore>, currency: impl Into<String>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Get (or lazily open) the user's wallet
    pub async fn get_account(&self, user_id: Uuid) -> ServiceResult<WalletAccount> {
        self.store.find_or_create_account(user_id, &self.currency).await
    }

    pub async fn get_balance(&self, user_id: Uuid) -> ServiceResult<Decimal> {
        Ok(self.get_account(user_id).await?.balance)
    }

    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        category: TransactionCategory,
        description: &str,
    ) -> ServiceResult<WalletTransaction> {
        self.post(
            user_id,
            TransactionType::Credit,
            LedgerPosting::new(category, amount, description),
        )
        .await
    }

    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        category: TransactionCategory,
        description: &str,
    ) -> ServiceResult<WalletTransaction> {
        self.post(
            user_id,
            TransactionType::Debit,
            LedgerPosting::new(category, amount, description),
        )
        .await
    }

    /// Apply a credit or debit to the user's wallet.
    ///
    /// The user lock only serializes this process. If another writer moves
    /// the wallet between our read and the append, the posting is re-priced
    /// against the fresh balance, up to `MAX_APPEND_ATTEMPTS` times.
    pub async fn post(
        &self,
        user_id: Uuid,
        transaction_type: TransactionType,
        posting: LedgerPosting,
    ) -> ServiceResult<WalletTransaction> {
        validate_amount(posting.amount)?;

        let _guard = self.locks.lock(&user_id).await;
        let mut attempt = 1;

        let transaction = loop {
            let account = self.get_account(user_id).await?;
            let entry = price_entry(&account, transaction_type, &posting)?;

            match self.store.append(&account, entry).await {
                Ok(transaction) => break transaction,
                Err(ServiceError::StateConflict(reason)) if attempt < MAX_APPEND_ATTEMPTS => {
                    tracing::warn!(
                        user_id = %user_id,
                        attempt,
                        "Wallet moved under another writer, retrying: {}",
                        reason
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            user_id = %user_id,
            wallet_id = %transaction.wallet_id,
            sequence = transaction.sequence,
            transaction_type = ?transaction.transaction_type,
            category = ?transaction.category,
            amount = %transaction.amount,
            balance_after = %transaction.balance_after,
            "Ledger entry appended"
        );

        Ok(transaction)
    }

    /// Withdrawal request; the payout itself happens off-ledger
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        request: WithdrawalRequest,
    ) -> ServiceResult<WalletTransaction> {
        request.validate()?;
        let description = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .unwrap_or("Withdrawal request");

        self.debit(user_id, request.amount, TransactionCategory::Withdrawal, description)
            .await
    }

    /// Transaction history, newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<WalletTransaction>> {
        let account = self.get_account(user_id).await?;
        self.store.list_transactions(account.id, filter, page).await
    }

    /// Replay the user's chain from zero and compare against stored snapshots
    pub async fn reconcile(&self, user_id: Uuid) -> ServiceResult<Reconciliation> {
        let account = self.get_account(user_id).await?;
        self.reconcile_account(&account).await
    }

    /// Reconcile every wallet, reporting only the inconsistent ones
    pub async fn audit(&self) -> ServiceResult<Vec<Reconciliation>> {
        let mut mismatches = Vec::new();
        for account in self.store.list_accounts().await? {
            let report = self.reconcile_account(&account).await?;
            if !report.consistent {
                mismatches.push(report);
            }
        }
        Ok(mismatches)
    }

    async fn reconcile_account(&self, account: &WalletAccount) -> ServiceResult<Reconciliation> {
        let chain = self.store.transactions_in_order(account.id).await?;
        Ok(replay(account, &chain))
    }
}

/// Build the entry for `posting` against the account's current balance
fn price_entry(
    account: &WalletAccount,
    transaction_type: TransactionType,
    posting: &LedgerPosting,
) -> ServiceResult<NewWalletTransaction> {
    let balance_after = match transaction_type {
        TransactionType::Credit => account.balance + posting.amount,
        TransactionType::Debit => {
            if posting.amount > account.balance {
                tracing::info!(
                    user_id = %account.user_id,
                    requested = %posting.amount,
                    available = %account.balance,
                    "Debit rejected for insufficient balance"
                );
                return Err(ServiceError::InsufficientBalance {
                    requested: posting.amount.to_string(),
                    available: account.balance.to_string(),
                });
            }
            account.balance - posting.amount
        }
    };

    Ok(NewWalletTransaction {
        transaction_type,
        category: posting.category,
        amount: posting.amount,
        balance_after,
        description: posting.description.clone(),
        reference: posting.reference.clone(),
    })
}

/// Replay a chain from a zero balance
pub fn replay(account: &WalletAccount, chain: &[WalletTransaction]) -> Reconciliation {
    let mut balance = Decimal::ZERO;
    let mut first_mismatch = None;

    for (index, tx) in chain.iter().enumerate() {
        balance = match tx.transaction_type {
            TransactionType::Credit => balance + tx.amount,
            TransactionType::Debit => balance - tx.amount,
        };
        let in_sequence = tx.sequence == index as i64 + 1;
        if first_mismatch.is_none() && (balance != tx.balance_after || !in_sequence) {
            first_mismatch = Some(tx.sequence);
        }
    }

    let consistent = first_mismatch.is_none()
        && balance == account.balance
        && chain.len() as i64 == account.version;

    Reconciliation {
        wallet_id: account.id,
        user_id: account.user_id,
        entries: chain.len(),
        replayed_balance: balance,
        stored_balance: account.balance,
        first_mismatch,
        consistent,
    }
}

/// Ledger amounts are positive and in minor units
pub fn validate_amount(amount: Decimal) -> ServiceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::InvalidAmount(format!(
            "Amount must be greater than 0, got {}",
            amount
        )));
    }
    if round_money(amount) != amount {
        return Err(ServiceError::InvalidAmount(format!(
            "Amount {} has more than two decimal places",
            amount
        )));
    }
    Ok(())
}
