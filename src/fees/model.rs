//! Fee schedule and fee breakdown models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Platform-configured fees applied to a pickup at quote time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub pickup_fee: Decimal,
    pub safe_service_fee: Decimal,
    /// Fraction of the item price, e.g. `0.027` for 2.7%
    pub item_fee_percentage: Decimal,
    pub currency: String,
}

impl FeeSchedule {
    /// Reject schedules that would produce negative or nonsensical fees
    pub fn validate(&self) -> ServiceResult<()> {
        if self.pickup_fee < Decimal::ZERO || self.safe_service_fee < Decimal::ZERO {
            return Err(ServiceError::Validation(
                "Pickup and safe service fees must not be negative".to_string(),
            ));
        }
        if self.item_fee_percentage < Decimal::ZERO || self.item_fee_percentage > Decimal::ONE {
            return Err(ServiceError::Validation(
                "Item fee percentage must be a fraction between 0 and 1".to_string(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ServiceError::Validation(format!(
                "Currency must be a 3-letter ISO code, got '{}'",
                self.currency
            )));
        }
        Ok(())
    }
}

/// Fee breakdown for a single pickup.
///
/// Derived by [`quote`](super::quote) and stored with the pickup; the schedule
/// fields it carries are the snapshot taken when the pickup was scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeeBreakdown {
    pub item_price: Decimal,
    pub pickup_fee: Decimal,
    pub safe_service_fee: Decimal,
    pub item_fee_percentage: Decimal,
    pub item_fee: Decimal,
    pub discount: Decimal,
    pub buyers_fee: Decimal,
    pub sub_total: Decimal,
    pub grand_total: Decimal,
}

impl FeeBreakdown {
    /// The schedule this breakdown was quoted against
    pub fn schedule(&self, currency: &str) -> FeeSchedule {
        FeeSchedule {
            pickup_fee: self.pickup_fee,
            safe_service_fee: self.safe_service_fee,
            item_fee_percentage: self.item_fee_percentage,
            currency: currency.to_string(),
        }
    }
}

/// Query parameters for the quote endpoint
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub item_price: Decimal,
}
