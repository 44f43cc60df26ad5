//! Settlement request and receipt models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::fees::FeeBreakdown;
use crate::pickup::PaymentMethod;

/// Request body for paying a pickup's fees
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PayPickupRequest {
    pub payment_method: PaymentMethod,
    /// Card token for the gateway; ignored for wallet payments
    #[validate(length(min = 1, max = 255))]
    pub payment_token: Option<String>,
}

impl PayPickupRequest {
    pub fn wallet() -> Self {
        Self {
            payment_method: PaymentMethod::Wallet,
            payment_token: None,
        }
    }

    pub fn card(token: impl Into<String>) -> Self {
        Self {
            payment_method: PaymentMethod::Card,
            payment_token: Some(token.into()),
        }
    }
}

/// Proof of a settled pickup payment
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub pickup_id: Uuid,
    /// Wallet transaction id or gateway reference
    pub payment_id: String,
    pub payment_method: PaymentMethod,
    pub fee: FeeBreakdown,
    pub amount: Decimal,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
    /// Wallet balance after the debit, for wallet payments
    pub balance_after: Option<Decimal>,
}
