//! Wallet ledger models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A user's stored-value account. One per user, created lazily.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    /// Sequence number of the last transaction applied (0 for a fresh wallet)
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "wallet_transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

/// Business reason for a ledger entry
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "wallet_transaction_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Topup,
    Payment,
    Refund,
    Withdrawal,
    Bonus,
    Commission,
    Penalty,
}

/// Immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    /// Position in the wallet's chain, starting at 1
    pub sequence: i64,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    /// What the entry settles: a pickup id, an original transaction id, or a gateway reference
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry ready to be appended to a wallet; the store assigns id and sequence
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub reference: Option<String>,
}

/// A credit or debit requested by a caller of the ledger
#[derive(Debug, Clone)]
pub struct LedgerPosting {
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub description: String,
    pub reference: Option<String>,
}

impl LedgerPosting {
    pub fn new(category: TransactionCategory, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            category,
            amount,
            description: description.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Filter for transaction history
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub category: Option<TransactionCategory>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.transaction_type.map_or(true, |t| t == tx.transaction_type)
            && self.category.map_or(true, |c| c == tx.category)
    }
}

/// Query parameters for listing wallet transactions
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub category: Option<TransactionCategory>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Result of replaying a wallet's chain from a zero balance
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub entries: usize,
    pub replayed_balance: Decimal,
    pub stored_balance: Decimal,
    /// Sequence of the first entry whose `balance_after` does not match the replay
    pub first_mismatch: Option<i64>,
    pub consistent: bool,
}

/// Request body for a wallet top-up
#[derive(Debug, Deserialize, Validate)]
pub struct TopUpRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub payment_token: String,
}

/// Request body for a withdrawal
#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Wallet summary returned by `GET /api/wallet`
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub balance: Decimal,
    pub currency: String,
    pub transaction_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletAccount> for WalletResponse {
    fn from(account: WalletAccount) -> Self {
        Self {
            id: account.id,
            balance: account.balance,
            currency: account.currency,
            transaction_count: account.version,
            updated_at: account.updated_at,
        }
    }
}
