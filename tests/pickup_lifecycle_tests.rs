//! Pickup state machine tests

mod common;

use std::sync::Arc;

use common::{d, pickup_date, pickup_time, Harness};
use roundbuy_server::error::ServiceError;
use roundbuy_server::integrations::PickupEvent;
use roundbuy_server::models::PageRequest;
use roundbuy_server::pickup::{
    CancelPickupRequest, ListPickupsQuery, PaymentStatus, PickupRole, PickupStatus,
    ReschedulePickupRequest,
};
use uuid::Uuid;

fn cancel(expected_status: PickupStatus, reason: &str) -> CancelPickupRequest {
    CancelPickupRequest {
        expected_status,
        cancellation_reason: reason.to_string(),
    }
}

fn reschedule(expected_status: PickupStatus, reason: &str) -> ReschedulePickupRequest {
    ReschedulePickupRequest {
        expected_status,
        scheduled_date: pickup_date().succ_opt().unwrap(),
        scheduled_time: pickup_time(),
        reschedule_reason: reason.to_string(),
    }
}

#[tokio::test]
async fn test_schedule_snapshots_fees_from_offer_price() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("100.00").await;

    assert_eq!(pickup.status, PickupStatus::Pending);
    assert_eq!(pickup.payment_status, PaymentStatus::Unpaid);
    assert_eq!(pickup.buyer_id, h.buyer);
    assert_eq!(pickup.seller_id, h.seller);
    assert_eq!(pickup.fee.item_price, d("100.00"));
    assert_eq!(pickup.fee.item_fee, d("2.70"));
    assert_eq!(pickup.fee.grand_total, d("103.00"));
    assert_eq!(pickup.currency, "GBP");
    assert_eq!(pickup.version, 0);
}

#[tokio::test]
async fn test_schedule_rejects_someone_elses_offer() {
    let h = Harness::new();
    let request = h.schedule_request("50.00");

    let err = h.pickups.schedule(Uuid::new_v4(), request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_schedule_rejects_mismatched_advertisement() {
    let h = Harness::new();
    let mut request = h.schedule_request("50.00");
    let (other_ad, _) = h.marketplace.list(h.seller, h.buyer, d("10.00"));
    request.advertisement_id = other_ad.id;

    let err = h.pickups.schedule(h.buyer, request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_schedule_rejects_unknown_offer() {
    let h = Harness::new();
    let mut request = h.schedule_request("50.00");
    request.offer_id = Uuid::new_v4();

    let err = h.pickups.schedule(h.buyer, request).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_schedule_rejects_own_advertisement() {
    let h = Harness::new();
    let (advertisement, offer) = h.marketplace.list(h.buyer, h.buyer, d("20.00"));
    let request = roundbuy_server::pickup::SchedulePickupRequest {
        offer_id: offer.id,
        advertisement_id: advertisement.id,
        scheduled_date: pickup_date(),
        scheduled_time: pickup_time(),
        description: None,
    };

    let err = h.pickups.schedule(h.buyer, request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_one_active_pickup_per_offer() {
    let h = Harness::new();
    let request = h.schedule_request("50.00");
    let offer_id = request.offer_id;
    let advertisement_id = request.advertisement_id;
    let first = h.pickups.schedule(h.buyer, request).await.unwrap();

    let again = roundbuy_server::pickup::SchedulePickupRequest {
        offer_id,
        advertisement_id,
        scheduled_date: pickup_date(),
        scheduled_time: pickup_time(),
        description: None,
    };
    let err = h.pickups.schedule(h.buyer, again).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    // A cancelled pickup frees the offer
    h.pickups
        .cancel(first.id, h.buyer, cancel(PickupStatus::Pending, "Changed plans"))
        .await
        .unwrap();
    let retry = roundbuy_server::pickup::SchedulePickupRequest {
        offer_id,
        advertisement_id,
        scheduled_date: pickup_date(),
        scheduled_time: pickup_time(),
        description: None,
    };
    assert!(h.pickups.schedule(h.buyer, retry).await.is_ok());
}

#[tokio::test]
async fn test_only_seller_can_confirm() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;

    let err = h
        .pickups
        .confirm(pickup.id, h.buyer, PickupStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = h
        .pickups
        .confirm(pickup.id, Uuid::new_v4(), PickupStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let stored = h.pickups.load(pickup.id).await.unwrap();
    assert_eq!(stored.status, PickupStatus::Pending);
    assert_eq!(stored.version, pickup.version);
}

#[tokio::test]
async fn test_confirm_notifies_buyer() {
    let h = Harness::new();
    let pickup = h.confirmed_pickup("50.00").await;

    assert_eq!(
        h.notifier.events(),
        vec![(h.buyer, PickupEvent::Confirmed { pickup_id: pickup.id })]
    );
}

#[tokio::test]
async fn test_stale_expected_status_is_a_conflict() {
    let h = Harness::new();
    let pickup = h.confirmed_pickup("50.00").await;

    let err = h
        .pickups
        .cancel(pickup.id, h.buyer, cancel(PickupStatus::Pending, "Too late"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::StateConflict(_)));
    assert_eq!(
        h.pickups.load(pickup.id).await.unwrap().status,
        PickupStatus::Confirmed
    );
}

#[tokio::test]
async fn test_confirm_races_cancel_exactly_one_wins() {
    let h = Arc::new(Harness::new());
    let pickup_id = h.scheduled_pickup("50.00").await.id;

    let confirmer = {
        let h = h.clone();
        tokio::spawn(async move {
            h.pickups
                .confirm(pickup_id, h.seller, PickupStatus::Pending)
                .await
        })
    };
    let canceller = {
        let h = h.clone();
        tokio::spawn(async move {
            h.pickups
                .cancel(pickup_id, h.buyer, cancel(PickupStatus::Pending, "Found another"))
                .await
        })
    };

    let confirmed = confirmer.await.unwrap();
    let cancelled = canceller.await.unwrap();
    let final_status = h.pickups.load(pickup_id).await.unwrap().status;

    match (confirmed, cancelled) {
        (Ok(_), Err(ServiceError::StateConflict(_))) => {
            assert_eq!(final_status, PickupStatus::Confirmed)
        }
        (Err(ServiceError::StateConflict(_)), Ok(_)) => {
            assert_eq!(final_status, PickupStatus::Cancelled)
        }
        other => panic!("expected exactly one winner, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reschedule_updates_slot_and_notifies_counterparty() {
    let h = Harness::new();
    let pickup = h.confirmed_pickup("50.00").await;

    let rescheduled = h
        .pickups
        .reschedule(pickup.id, h.seller, reschedule(PickupStatus::Confirmed, "  Running late  "))
        .await
        .unwrap();

    assert_eq!(rescheduled.status, PickupStatus::Rescheduled);
    assert_eq!(rescheduled.scheduled_date, pickup_date().succ_opt().unwrap());
    assert_eq!(rescheduled.reschedule_reason.as_deref(), Some("Running late"));
    assert_eq!(rescheduled.reschedule_count, 1);

    let (recipient, event) = h.notifier.events().last().cloned().unwrap();
    assert_eq!(recipient, h.buyer);
    assert!(matches!(event, PickupEvent::Rescheduled { .. }));

    // Rescheduled pickups go back through confirm, and the count survives
    let confirmed = h
        .pickups
        .confirm(pickup.id, h.seller, PickupStatus::Rescheduled)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PickupStatus::Confirmed);
    assert_eq!(confirmed.reschedule_count, 1);
}

#[tokio::test]
async fn test_reschedule_requires_reason() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;

    let err = h
        .pickups
        .reschedule(pickup.id, h.buyer, reschedule(PickupStatus::Pending, "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_cannot_reschedule_twice_without_confirm() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;
    h.pickups
        .reschedule(pickup.id, h.buyer, reschedule(PickupStatus::Pending, "Busy"))
        .await
        .unwrap();

    let err = h
        .pickups
        .reschedule(pickup.id, h.buyer, reschedule(PickupStatus::Rescheduled, "Busy again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_complete_requires_confirmed_and_seller() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;

    let err = h
        .pickups
        .complete(pickup.id, h.seller, PickupStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    h.pickups
        .confirm(pickup.id, h.seller, PickupStatus::Pending)
        .await
        .unwrap();

    let err = h
        .pickups
        .complete(pickup.id, h.buyer, PickupStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let completed = h
        .pickups
        .complete(pickup.id, h.seller, PickupStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(completed.status, PickupStatus::Completed);
}

#[tokio::test]
async fn test_terminal_pickups_reject_transitions() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;
    h.pickups
        .cancel(pickup.id, h.seller, cancel(PickupStatus::Pending, "Item sold"))
        .await
        .unwrap();

    let err = h
        .pickups
        .confirm(pickup.id, h.seller, PickupStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = h
        .pickups
        .cancel(pickup.id, h.buyer, cancel(PickupStatus::Cancelled, "Again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_records_reason_and_notifies_counterparty() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;

    let cancelled = h
        .pickups
        .cancel(pickup.id, h.seller, cancel(PickupStatus::Pending, "Item sold"))
        .await
        .unwrap();
    assert_eq!(cancelled.status, PickupStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Item sold"));

    assert_eq!(
        h.notifier.events(),
        vec![(
            h.buyer,
            PickupEvent::Cancelled {
                pickup_id: pickup.id,
                reason: "Item sold".to_string()
            }
        )]
    );
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_transition() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;
    h.notifier.fail_deliveries();

    let confirmed = h
        .pickups
        .confirm(pickup.id, h.seller, PickupStatus::Pending)
        .await
        .unwrap();
    assert_eq!(confirmed.status, PickupStatus::Confirmed);
}

#[tokio::test]
async fn test_details_visible_to_participants_only() {
    let h = Harness::new();
    let pickup = h.scheduled_pickup("50.00").await;

    assert!(h.pickups.get(pickup.id, h.buyer).await.is_ok());
    assert!(h.pickups.get(pickup.id, h.seller).await.is_ok());
    let err = h.pickups.get(pickup.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_list_filters_by_role_and_unpaid_view() {
    let h = Harness::new();
    let first = h.scheduled_pickup("50.00").await;
    let second = h.scheduled_pickup("20.00").await;
    h.pickups
        .cancel(second.id, h.buyer, cancel(PickupStatus::Pending, "Nope"))
        .await
        .unwrap();

    let as_seller = h
        .pickups
        .list(
            h.seller,
            ListPickupsQuery {
                role: Some(PickupRole::Seller),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(as_seller.total, 2);

    let seller_as_buyer = h
        .pickups
        .list(
            h.seller,
            ListPickupsQuery {
                role: Some(PickupRole::Buyer),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(seller_as_buyer.total, 0);

    let cancelled = h
        .pickups
        .list(
            h.buyer,
            ListPickupsQuery {
                status: Some(PickupStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].id, second.id);

    let unpaid = h
        .pickups
        .unpaid(h.buyer, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(unpaid.total, 1);
    assert_eq!(unpaid.items[0].id, first.id);
}

#[tokio::test]
async fn test_fee_update_applies_to_new_pickups_only() {
    let h = Harness::new();
    let before = h.scheduled_pickup("100.00").await;

    let mut schedule = h.pickups.current_fees().await;
    schedule.safe_service_fee = d("1.50");
    h.pickups.update_fees(schedule).await.unwrap();

    let after = h.scheduled_pickup("100.00").await;
    assert_eq!(before.fee.grand_total, d("103.00"));
    assert_eq!(after.fee.grand_total, d("103.50"));

    let stored = h.pickups.load(before.id).await.unwrap();
    assert_eq!(stored.fee, before.fee);
}

#[tokio::test]
async fn test_fee_update_rejects_invalid_schedule() {
    let h = Harness::new();
    let mut schedule = h.pickups.current_fees().await;
    schedule.item_fee_percentage = d("1.5");

    let err = h.pickups.update_fees(schedule).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
