//! Fee calculator
//!
//! The single place pickup fee arithmetic happens. Quoting is pure and
//! deterministic so the settlement path can re-derive a stored breakdown and
//! compare it field by field.

use rust_decimal::{Decimal, RoundingStrategy};

use super::{FeeBreakdown, FeeSchedule};
use crate::error::{ServiceError, ServiceResult};

/// Minor-unit precision for all monetary amounts
const MONEY_SCALE: u32 = 2;

/// Round an amount to the currency's minor unit using banker's rounding
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Compute the fee breakdown for an item price under a fee schedule.
///
/// The item fee is always offset by an equal discount, so `grand_total`
/// equals `item_price + buyers_fee`.
pub fn quote(item_price: Decimal, schedule: &FeeSchedule) -> ServiceResult<FeeBreakdown> {
    if item_price < Decimal::ZERO {
        return Err(ServiceError::InvalidAmount(format!(
            "Item price must not be negative, got {}",
            item_price
        )));
    }

    let item_fee = round_money(item_price * schedule.item_fee_percentage);
    let discount = item_fee;
    let buyers_fee = schedule.pickup_fee + schedule.safe_service_fee;
    let sub_total = item_price + buyers_fee + item_fee;
    let grand_total = round_money(sub_total - discount);

    Ok(FeeBreakdown {
        item_price,
        pickup_fee: schedule.pickup_fee,
        safe_service_fee: schedule.safe_service_fee,
        item_fee_percentage: schedule.item_fee_percentage,
        item_fee,
        discount,
        buyers_fee,
        sub_total,
        grand_total,
    })
}
