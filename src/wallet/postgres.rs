//! Postgres-backed ledger store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Page, PageRequest};
use crate::wallet::{
    LedgerStore, NewWalletTransaction, TransactionFilter, WalletAccount, WalletTransaction,
};

/// Ledger store on the `wallet_accounts` / `wallet_transactions` tables
#[derive(Clone)]
pub struct PgLedgerStore {
    db_pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn push_filter(
    query_builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
    filter: &TransactionFilter,
) {
    if let Some(transaction_type) = filter.transaction_type {
        query_builder.push(" AND transaction_type = ");
        query_builder.push_bind(transaction_type);
    }
    if let Some(category) = filter.category {
        query_builder.push(" AND category = ");
        query_builder.push_bind(category);
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_or_create_account(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> ServiceResult<WalletAccount> {
        // Racing creators both land on the same row thanks to the unique user_id
        sqlx::query(
            r#"
            INSERT INTO wallet_accounts (id, user_id, balance, currency, version, created_at, updated_at)
            VALUES ($1, $2, 0, $3, 0, $4, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(currency)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        let account =
            sqlx::query_as::<_, WalletAccount>("SELECT * FROM wallet_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.db_pool)
                .await?;

        Ok(account)
    }

    async fn append(
        &self,
        account: &WalletAccount,
        entry: NewWalletTransaction,
    ) -> ServiceResult<WalletTransaction> {
        let mut tx = self.db_pool.begin().await?;
        let now = Utc::now();
        let sequence = account.version + 1;

        let updated = sqlx::query(
            r#"
            UPDATE wallet_accounts
            SET balance = $1, version = $2, updated_at = $3
            WHERE id = $4 AND version = $5
            "#,
        )
        .bind(entry.balance_after)
        .bind(sequence)
        .bind(now)
        .bind(account.id)
        .bind(account.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(ServiceError::StateConflict(format!(
                "Wallet {} is no longer at version {}",
                account.id, account.version
            )));
        }

        let transaction = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions (
                id, wallet_id, sequence, transaction_type, category, amount,
                balance_after, description, reference, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account.id)
        .bind(sequence)
        .bind(entry.transaction_type)
        .bind(entry.category)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(transaction)
    }

    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<WalletTransaction>> {
        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM wallet_transactions WHERE wallet_id = ");
        count_builder.push_bind(wallet_id);
        push_filter(&mut count_builder, filter);

        let (total,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.db_pool)
            .await?;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM wallet_transactions WHERE wallet_id = ");
        query_builder.push_bind(wallet_id);
        push_filter(&mut query_builder, filter);

        query_builder.push(" ORDER BY sequence DESC LIMIT ");
        query_builder.push_bind(page.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(page.offset());

        let items = query_builder
            .build_query_as::<WalletTransaction>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn transactions_in_order(&self, wallet_id: Uuid) -> ServiceResult<Vec<WalletTransaction>> {
        let chain = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY sequence ASC",
        )
        .bind(wallet_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(chain)
    }

    async fn list_accounts(&self) -> ServiceResult<Vec<WalletAccount>> {
        let accounts =
            sqlx::query_as::<_, WalletAccount>("SELECT * FROM wallet_accounts ORDER BY created_at")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(accounts)
    }
}
