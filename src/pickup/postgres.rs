//! Postgres-backed pickup store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Page, PageRequest};
use crate::pickup::{Pickup, PickupFilter, PickupRole, PickupStore};

/// Pickup store on the `pickups` table
#[derive(Clone)]
pub struct PgPickupStore {
    db_pool: PgPool,
}

impl PgPickupStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn push_filter(query_builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>, filter: &PickupFilter) {
    match filter.role {
        PickupRole::Buyer => {
            query_builder.push(" AND buyer_id = ");
            query_builder.push_bind(filter.user_id);
        }
        PickupRole::Seller => {
            query_builder.push(" AND seller_id = ");
            query_builder.push_bind(filter.user_id);
        }
        PickupRole::All => {
            query_builder.push(" AND (buyer_id = ");
            query_builder.push_bind(filter.user_id);
            query_builder.push(" OR seller_id = ");
            query_builder.push_bind(filter.user_id);
            query_builder.push(")");
        }
    }
    if let Some(status) = filter.status {
        query_builder.push(" AND status = ");
        query_builder.push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        query_builder.push(" AND payment_status = ");
        query_builder.push_bind(payment_status);
    }
    if filter.exclude_terminal {
        query_builder.push(" AND status NOT IN ('completed', 'cancelled')");
    }
}

#[async_trait]
impl PickupStore for PgPickupStore {
    async fn insert(&self, pickup: &Pickup) -> ServiceResult<Pickup> {
        let fee = &pickup.fee;
        let inserted = sqlx::query_as::<_, Pickup>(
            r#"
            INSERT INTO pickups (
                id, offer_id, advertisement_id, buyer_id, seller_id,
                scheduled_date, scheduled_time, description, status, payment_status,
                item_price, pickup_fee, safe_service_fee, item_fee_percentage, item_fee,
                discount, buyers_fee, sub_total, grand_total, currency,
                payment_id, payment_method, paid_at, reschedule_reason, reschedule_count,
                cancellation_reason, version, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
            )
            RETURNING *
            "#,
        )
        .bind(pickup.id)
        .bind(pickup.offer_id)
        .bind(pickup.advertisement_id)
        .bind(pickup.buyer_id)
        .bind(pickup.seller_id)
        .bind(pickup.scheduled_date)
        .bind(pickup.scheduled_time)
        .bind(&pickup.description)
        .bind(pickup.status)
        .bind(pickup.payment_status)
        .bind(fee.item_price)
        .bind(fee.pickup_fee)
        .bind(fee.safe_service_fee)
        .bind(fee.item_fee_percentage)
        .bind(fee.item_fee)
        .bind(fee.discount)
        .bind(fee.buyers_fee)
        .bind(fee.sub_total)
        .bind(fee.grand_total)
        .bind(&pickup.currency)
        .bind(&pickup.payment_id)
        .bind(pickup.payment_method)
        .bind(pickup.paid_at)
        .bind(&pickup.reschedule_reason)
        .bind(pickup.reschedule_count)
        .bind(&pickup.cancellation_reason)
        .bind(pickup.version)
        .bind(pickup.created_at)
        .bind(pickup.updated_at)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| {
            // pickups_one_active_per_offer partial unique index
            let duplicate = e
                .as_database_error()
                .map_or(false, |db| db.is_unique_violation());
            if duplicate {
                ServiceError::InvalidState(format!(
                    "Offer {} already has an active pickup",
                    pickup.offer_id
                ))
            } else {
                ServiceError::from(e)
            }
        })?;

        Ok(inserted)
    }

    async fn get(&self, id: Uuid) -> ServiceResult<Option<Pickup>> {
        let pickup = sqlx::query_as::<_, Pickup>("SELECT * FROM pickups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(pickup)
    }

    async fn find_active_by_offer(&self, offer_id: Uuid) -> ServiceResult<Option<Pickup>> {
        let pickup = sqlx::query_as::<_, Pickup>(
            "SELECT * FROM pickups WHERE offer_id = $1 AND status NOT IN ('completed', 'cancelled')",
        )
        .bind(offer_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(pickup)
    }

    async fn list(&self, filter: &PickupFilter, page: PageRequest) -> ServiceResult<Page<Pickup>> {
        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM pickups WHERE 1=1");
        push_filter(&mut count_builder, filter);
        let (total,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.db_pool)
            .await?;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM pickups WHERE 1=1");
        push_filter(&mut query_builder, filter);
        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(page.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(page.offset());

        let items = query_builder
            .build_query_as::<Pickup>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page::new(items, total, page))
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        updated: &Pickup,
    ) -> ServiceResult<Pickup> {
        let swapped = sqlx::query_as::<_, Pickup>(
            r#"
            UPDATE pickups
            SET scheduled_date = $1, scheduled_time = $2, status = $3, payment_status = $4,
                payment_id = $5, payment_method = $6, paid_at = $7, reschedule_reason = $8,
                reschedule_count = $9, cancellation_reason = $10,
                version = version + 1, updated_at = $11
            WHERE id = $12 AND version = $13
            RETURNING *
            "#,
        )
        .bind(updated.scheduled_date)
        .bind(updated.scheduled_time)
        .bind(updated.status)
        .bind(updated.payment_status)
        .bind(&updated.payment_id)
        .bind(updated.payment_method)
        .bind(updated.paid_at)
        .bind(&updated.reschedule_reason)
        .bind(updated.reschedule_count)
        .bind(&updated.cancellation_reason)
        .bind(Utc::now())
        .bind(updated.id)
        .bind(expected_version)
        .fetch_optional(&self.db_pool)
        .await?;

        swapped.ok_or_else(|| {
            ServiceError::StateConflict(format!(
                "Pickup {} changed concurrently (expected version {})",
                updated.id, expected_version
            ))
        })
    }
}
