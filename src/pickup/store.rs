//! Pickup storage seam and the in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Page, PageRequest};
use crate::pickup::{Pickup, PickupFilter};

/// Persistence for pickups.
///
/// Rows are never deleted. Every update goes through `compare_and_swap`,
/// which only succeeds while the stored version equals the one the caller
/// read.
#[async_trait]
pub trait PickupStore: Send + Sync {
    async fn insert(&self, pickup: &Pickup) -> ServiceResult<Pickup>;

    async fn get(&self, id: Uuid) -> ServiceResult<Option<Pickup>>;

    /// The non-terminal pickup for an offer, if any
    async fn find_active_by_offer(&self, offer_id: Uuid) -> ServiceResult<Option<Pickup>>;

    /// Newest first
    async fn list(&self, filter: &PickupFilter, page: PageRequest) -> ServiceResult<Page<Pickup>>;

    /// Replace the stored row with `updated` if the stored version is still
    /// `expected_version`. The written row gets `expected_version + 1`.
    async fn compare_and_swap(&self, expected_version: i64, updated: &Pickup)
        -> ServiceResult<Pickup>;
}

/// Process-local pickup store used for `STORAGE_BACKEND=memory` and tests
#[derive(Default)]
pub struct InMemoryPickupStore {
    pickups: RwLock<HashMap<Uuid, Pickup>>,
}

impl InMemoryPickupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PickupStore for InMemoryPickupStore {
    async fn insert(&self, pickup: &Pickup) -> ServiceResult<Pickup> {
        let mut pickups = self.pickups.write().await;
        let active_for_offer = pickups
            .values()
            .any(|p| p.offer_id == pickup.offer_id && !p.status.is_terminal());
        if active_for_offer {
            return Err(ServiceError::InvalidState(format!(
                "Offer {} already has an active pickup",
                pickup.offer_id
            )));
        }
        pickups.insert(pickup.id, pickup.clone());
        Ok(pickup.clone())
    }

    async fn get(&self, id: Uuid) -> ServiceResult<Option<Pickup>> {
        Ok(self.pickups.read().await.get(&id).cloned())
    }

    async fn find_active_by_offer(&self, offer_id: Uuid) -> ServiceResult<Option<Pickup>> {
        Ok(self
            .pickups
            .read()
            .await
            .values()
            .find(|p| p.offer_id == offer_id && !p.status.is_terminal())
            .cloned())
    }

    async fn list(&self, filter: &PickupFilter, page: PageRequest) -> ServiceResult<Page<Pickup>> {
        let pickups = self.pickups.read().await;
        let mut matching: Vec<Pickup> = pickups
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        Ok(Page::new(page.slice(&matching), total, page))
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        updated: &Pickup,
    ) -> ServiceResult<Pickup> {
        let mut pickups = self.pickups.write().await;
        let stored = pickups
            .get_mut(&updated.id)
            .ok_or_else(|| ServiceError::NotFound("Pickup".to_string()))?;

        if stored.version != expected_version {
            return Err(ServiceError::StateConflict(format!(
                "Pickup {} changed concurrently (expected version {}, found {})",
                updated.id, expected_version, stored.version
            )));
        }

        let mut next = updated.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }
}
