//! Pickup models and request DTOs

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::fees::FeeBreakdown;

/// Scheduled in-person exchange between a buyer and a seller
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Pickup {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub advertisement_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub description: Option<String>,
    pub status: PickupStatus,
    pub payment_status: PaymentStatus,
    #[sqlx(flatten)]
    pub fee: FeeBreakdown,
    pub currency: String,
    pub payment_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub reschedule_reason: Option<String>,
    pub reschedule_count: i32,
    pub cancellation_reason: Option<String>,
    /// Bumped on every write; the compare-and-swap token for the row
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pickup lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "pickup_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PickupStatus {
    Pending,
    Confirmed,
    Rescheduled,
    Completed,
    Cancelled,
}

impl PickupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PickupStatus::Completed | PickupStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PickupStatus::Pending => "pending",
            PickupStatus::Confirmed => "confirmed",
            PickupStatus::Rescheduled => "rescheduled",
            PickupStatus::Completed => "completed",
            PickupStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Card,
}

/// Which side of a pickup a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participant {
    Buyer,
    Seller,
}

impl Pickup {
    pub fn participant(&self, user_id: Uuid) -> Option<Participant> {
        if user_id == self.buyer_id {
            Some(Participant::Buyer)
        } else if user_id == self.seller_id {
            Some(Participant::Seller)
        } else {
            None
        }
    }

    /// The other side of the exchange from `user_id`
    pub fn counterparty(&self, user_id: Uuid) -> Uuid {
        if user_id == self.buyer_id {
            self.seller_id
        } else {
            self.buyer_id
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Settled payment to be recorded on a pickup
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub payment_method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

/// Request DTO for scheduling a pickup
#[derive(Debug, Deserialize, Validate)]
pub struct SchedulePickupRequest {
    pub offer_id: Uuid,
    pub advertisement_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Body for transitions that carry nothing but the caller's view of the status
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub expected_status: PickupStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReschedulePickupRequest {
    pub expected_status: PickupStatus,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[validate(length(min = 1, max = 500))]
    pub reschedule_reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelPickupRequest {
    pub expected_status: PickupStatus,
    #[validate(length(min = 1, max = 500))]
    pub cancellation_reason: String,
}

/// Which of the caller's pickups to list
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PickupRole {
    Buyer,
    Seller,
    #[default]
    All,
}

/// Query parameters for listing pickups
#[derive(Debug, Deserialize, Default)]
pub struct ListPickupsQuery {
    #[serde(rename = "type")]
    pub role: Option<PickupRole>,
    pub status: Option<PickupStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Store-level filter over a user's pickups
#[derive(Debug, Clone)]
pub struct PickupFilter {
    pub user_id: Uuid,
    pub role: PickupRole,
    pub status: Option<PickupStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub exclude_terminal: bool,
}

impl PickupFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: PickupRole::All,
            status: None,
            payment_status: None,
            exclude_terminal: false,
        }
    }

    pub fn matches(&self, pickup: &Pickup) -> bool {
        let role_ok = match self.role {
            PickupRole::Buyer => pickup.buyer_id == self.user_id,
            PickupRole::Seller => pickup.seller_id == self.user_id,
            PickupRole::All => pickup.participant(self.user_id).is_some(),
        };
        role_ok
            && self.status.map_or(true, |s| s == pickup.status)
            && self.payment_status.map_or(true, |p| p == pickup.payment_status)
            && !(self.exclude_terminal && pickup.status.is_terminal())
    }
}
