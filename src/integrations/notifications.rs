//! Notification events emitted by pickup transitions and payments

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ServiceResult;

/// Pickup events delivered to the counterparty
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PickupEvent {
    Confirmed {
        pickup_id: Uuid,
    },
    Rescheduled {
        pickup_id: Uuid,
        scheduled_date: NaiveDate,
        scheduled_time: NaiveTime,
        reason: String,
    },
    Cancelled {
        pickup_id: Uuid,
        reason: String,
    },
    Paid {
        pickup_id: Uuid,
        amount: Decimal,
        currency: String,
    },
}

impl PickupEvent {
    pub fn pickup_id(&self) -> Uuid {
        match self {
            PickupEvent::Confirmed { pickup_id }
            | PickupEvent::Rescheduled { pickup_id, .. }
            | PickupEvent::Cancelled { pickup_id, .. }
            | PickupEvent::Paid { pickup_id, .. } => *pickup_id,
        }
    }
}

/// An event addressed to one user
#[derive(Debug, Serialize, Clone)]
pub struct UserNotification {
    pub user_id: Uuid,
    pub event: PickupEvent,
    pub created_at: DateTime<Utc>,
}

/// Delivery of user notifications. Callers treat failures as non-fatal.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, user_id: Uuid, event: PickupEvent) -> ServiceResult<()>;
}
