//! Pickup service layer - the pickup state machine
//!
//! Every transition is a compare-and-swap: the caller names the status it
//! believes is current, and the write only lands if nothing moved since.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::fees::{quote, FeeBreakdown, FeeSchedule};
use crate::integrations::{AdvertisementService, NotificationDispatcher, OfferService, PickupEvent};
use crate::locks::{KeyedGuard, KeyedLocks};
use crate::models::{Page, PageRequest};
use crate::pickup::{
    CancelPickupRequest, ListPickupsQuery, PaymentRecord, PaymentStatus, Pickup, PickupAction,
    PickupFilter, PickupRole, PickupStatus, PickupStore, ReschedulePickupRequest,
    SchedulePickupRequest,
};

/// Pickup service for managing the pickup lifecycle
pub struct PickupService {
    store: Arc<dyn PickupStore>,
    advertisements: Arc<dyn AdvertisementService>,
    offers: Arc<dyn OfferService>,
    notifier: Arc<dyn NotificationDispatcher>,
    fees: RwLock<FeeSchedule>,
    locks: KeyedLocks<Uuid>,
}

impl PickupService {
    pub fn new(
        store: Arc<dyn PickupStore>,
        advertisements: Arc<dyn AdvertisementService>,
        offers: Arc<dyn OfferService>,
        notifier: Arc<dyn NotificationDispatcher>,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            store,
            advertisements,
            offers,
            notifier,
            fees: RwLock::new(fees),
            locks: KeyedLocks::new(),
        }
    }

    /// Fee schedule that new pickups are quoted against
    pub async fn current_fees(&self) -> FeeSchedule {
        self.fees.read().await.clone()
    }

    /// Replace the fee schedule. Existing pickups keep their snapshot.
    pub async fn update_fees(&self, schedule: FeeSchedule) -> ServiceResult<FeeSchedule> {
        schedule.validate()?;
        let mut fees = self.fees.write().await;
        if schedule.currency != fees.currency {
            return Err(ServiceError::Validation(format!(
                "Fee schedule currency cannot change from {} to {}",
                fees.currency, schedule.currency
            )));
        }
        tracing::info!(
            pickup_fee = %schedule.pickup_fee,
            safe_service_fee = %schedule.safe_service_fee,
            item_fee_percentage = %schedule.item_fee_percentage,
            "Fee schedule updated"
        );
        *fees = schedule.clone();
        Ok(schedule)
    }

    /// Quote an item price against the current schedule
    pub async fn quote(&self, item_price: Decimal) -> ServiceResult<FeeBreakdown> {
        quote(item_price, &*self.fees.read().await)
    }

    /// Schedule a pickup for an offer the buyer made
    pub async fn schedule(
        &self,
        buyer_id: Uuid,
        request: SchedulePickupRequest,
    ) -> ServiceResult<Pickup> {
        request.validate()?;

        let offer = self
            .offers
            .get_offer(request.offer_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Offer".to_string()))?;

        if offer.buyer_id != buyer_id {
            return Err(ServiceError::Forbidden(
                "Only the buyer who made the offer can schedule its pickup".to_string(),
            ));
        }
        if offer.advertisement_id != request.advertisement_id {
            return Err(ServiceError::Validation(
                "Offer does not belong to this advertisement".to_string(),
            ));
        }

        let advertisement = self
            .advertisements
            .get_advertisement(request.advertisement_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Advertisement".to_string()))?;

        if advertisement.seller_id == buyer_id {
            return Err(ServiceError::Forbidden(
                "Cannot schedule a pickup on your own advertisement".to_string(),
            ));
        }

        // One active pickup per offer
        let _guard = self.locks.lock(&request.offer_id).await;
        if let Some(existing) = self.store.find_active_by_offer(request.offer_id).await? {
            return Err(ServiceError::InvalidState(format!(
                "Offer already has an active pickup {}",
                existing.id
            )));
        }

        let schedule = self.current_fees().await;
        let fee = quote(offer.offered_price, &schedule)?;
        let now = chrono::Utc::now();

        let pickup = Pickup {
            id: Uuid::new_v4(),
            offer_id: offer.id,
            advertisement_id: advertisement.id,
            buyer_id,
            seller_id: advertisement.seller_id,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            description: request.description,
            status: PickupStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            fee,
            currency: schedule.currency,
            payment_id: None,
            payment_method: None,
            paid_at: None,
            reschedule_reason: None,
            reschedule_count: 0,
            cancellation_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let pickup = self.store.insert(&pickup).await?;

        tracing::info!(
            pickup_id = %pickup.id,
            offer_id = %pickup.offer_id,
            buyer_id = %pickup.buyer_id,
            seller_id = %pickup.seller_id,
            grand_total = %pickup.fee.grand_total,
            "Pickup scheduled"
        );

        Ok(pickup)
    }

    /// Pickup details, visible to its buyer and seller only
    pub async fn get(&self, pickup_id: Uuid, user_id: Uuid) -> ServiceResult<Pickup> {
        let pickup = self.load(pickup_id).await?;
        if pickup.participant(user_id).is_none() {
            return Err(ServiceError::Forbidden(
                "Not a participant of this pickup".to_string(),
            ));
        }
        Ok(pickup)
    }

    pub async fn list(&self, user_id: Uuid, query: ListPickupsQuery) -> ServiceResult<Page<Pickup>> {
        let filter = PickupFilter {
            user_id,
            role: query.role.unwrap_or_default(),
            status: query.status,
            payment_status: query.payment_status,
            exclude_terminal: false,
        };
        self.store
            .list(&filter, PageRequest::new(query.page, query.limit))
            .await
    }

    /// The buyer's open pickups that still owe fees
    pub async fn unpaid(&self, user_id: Uuid, page: PageRequest) -> ServiceResult<Page<Pickup>> {
        let filter = PickupFilter {
            role: PickupRole::Buyer,
            payment_status: Some(PaymentStatus::Unpaid),
            exclude_terminal: true,
            ..PickupFilter::for_user(user_id)
        };
        self.store.list(&filter, page).await
    }

    /// Seller accepts the pickup
    pub async fn confirm(
        &self,
        pickup_id: Uuid,
        actor: Uuid,
        expected_status: PickupStatus,
    ) -> ServiceResult<Pickup> {
        let pickup = self
            .transition(pickup_id, actor, expected_status, PickupAction::Confirm, |_| {})
            .await?;

        self.dispatch(pickup.buyer_id, PickupEvent::Confirmed { pickup_id })
            .await;
        Ok(pickup)
    }

    /// Either party moves the pickup to a new slot
    pub async fn reschedule(
        &self,
        pickup_id: Uuid,
        actor: Uuid,
        request: ReschedulePickupRequest,
    ) -> ServiceResult<Pickup> {
        request.validate()?;
        let reason = require_reason(&request.reschedule_reason, "Reschedule")?;

        let pickup = self
            .transition(
                pickup_id,
                actor,
                request.expected_status,
                PickupAction::Reschedule,
                |next| {
                    next.scheduled_date = request.scheduled_date;
                    next.scheduled_time = request.scheduled_time;
                    next.reschedule_reason = Some(reason.clone());
                    next.reschedule_count += 1;
                },
            )
            .await?;

        self.dispatch(
            pickup.counterparty(actor),
            PickupEvent::Rescheduled {
                pickup_id,
                scheduled_date: pickup.scheduled_date,
                scheduled_time: pickup.scheduled_time,
                reason,
            },
        )
        .await;
        Ok(pickup)
    }

    /// Seller marks the exchange as done
    pub async fn complete(
        &self,
        pickup_id: Uuid,
        actor: Uuid,
        expected_status: PickupStatus,
    ) -> ServiceResult<Pickup> {
        self.transition(pickup_id, actor, expected_status, PickupAction::Complete, |_| {})
            .await
    }

    /// Either party calls the pickup off
    pub async fn cancel(
        &self,
        pickup_id: Uuid,
        actor: Uuid,
        request: CancelPickupRequest,
    ) -> ServiceResult<Pickup> {
        request.validate()?;
        let reason = require_reason(&request.cancellation_reason, "Cancellation")?;

        let pickup = self
            .transition(
                pickup_id,
                actor,
                request.expected_status,
                PickupAction::Cancel,
                |next| next.cancellation_reason = Some(reason.clone()),
            )
            .await?;

        self.dispatch(
            pickup.counterparty(actor),
            PickupEvent::Cancelled { pickup_id, reason },
        )
        .await;
        Ok(pickup)
    }

    /// Exclusive lock on one pickup. Held by transitions and by settlement
    /// for the whole pay operation.
    pub async fn lock(&self, pickup_id: Uuid) -> KeyedGuard<Uuid> {
        self.locks.lock(&pickup_id).await
    }

    pub async fn load(&self, pickup_id: Uuid) -> ServiceResult<Pickup> {
        self.store
            .get(pickup_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Pickup".to_string()))
    }

    /// Mark `current` as paid. The caller must hold the pickup lock.
    ///
    /// Fails with `StateConflict` if the pickup moved since `current` was
    /// read, including another payment landing first.
    pub async fn record_payment(
        &self,
        current: &Pickup,
        payment: PaymentRecord,
    ) -> ServiceResult<Pickup> {
        let mut next = current.clone();
        next.payment_status = PaymentStatus::Paid;
        next.payment_id = Some(payment.payment_id);
        next.payment_method = Some(payment.payment_method);
        next.paid_at = Some(payment.paid_at);

        self.store.compare_and_swap(current.version, &next).await
    }

    /// Fire-and-forget delivery; failures are logged, never returned
    pub async fn dispatch(&self, user_id: Uuid, event: PickupEvent) {
        let pickup_id = event.pickup_id();
        if let Err(e) = self.notifier.notify(user_id, event).await {
            tracing::warn!(
                pickup_id = %pickup_id,
                user_id = %user_id,
                "Failed to deliver pickup notification: {}",
                e
            );
        }
    }

    async fn transition<F>(
        &self,
        pickup_id: Uuid,
        actor: Uuid,
        expected_status: PickupStatus,
        action: PickupAction,
        apply: F,
    ) -> ServiceResult<Pickup>
    where
        F: FnOnce(&mut Pickup),
    {
        let _guard = self.locks.lock(&pickup_id).await;
        let current = self.load(pickup_id).await?;

        let participant = current.participant(actor).ok_or_else(|| {
            ServiceError::Forbidden("Not a participant of this pickup".to_string())
        })?;
        if !action.permits(participant) {
            return Err(ServiceError::Forbidden(format!(
                "Only the seller can {} a pickup",
                action.as_str()
            )));
        }

        if current.status != expected_status {
            return Err(ServiceError::StateConflict(format!(
                "Pickup is {}, not {}",
                current.status.as_str(),
                expected_status.as_str()
            )));
        }

        let target = current.status.transition(action).ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "Cannot {} a pickup that is {}",
                action.as_str(),
                current.status.as_str()
            ))
        })?;

        let mut next = current.clone();
        next.status = target;
        apply(&mut next);

        let saved = self.store.compare_and_swap(current.version, &next).await?;

        tracing::info!(
            pickup_id = %pickup_id,
            actor = %actor,
            action = action.as_str(),
            from = current.status.as_str(),
            to = saved.status.as_str(),
            "Pickup transitioned"
        );

        Ok(saved)
    }
}

fn require_reason(reason: &str, what: &str) -> ServiceResult<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} reason is required", what)));
    }
    Ok(trimmed.to_string())
}
