//! Fee quoting through the public API

mod common;

use common::{d, fee_schedule};
use roundbuy_server::error::ServiceError;
use roundbuy_server::fees::{quote, FeeSchedule};
use rust_decimal::Decimal;

#[test]
fn test_quote_hundred_pound_item() {
    let fee = quote(d("100.00"), &fee_schedule()).unwrap();

    assert_eq!(fee.item_price, d("100.00"));
    assert_eq!(fee.buyers_fee, d("3.00"));
    assert_eq!(fee.item_fee, d("2.70"));
    assert_eq!(fee.discount, d("2.70"));
    assert_eq!(fee.sub_total, d("105.70"));
    assert_eq!(fee.grand_total, d("103.00"));
}

#[test]
fn test_quote_fifty_pound_item() {
    let fee = quote(d("50.00"), &fee_schedule()).unwrap();
    assert_eq!(fee.item_fee, d("1.35"));
    assert_eq!(fee.grand_total, d("53.00"));
}

#[test]
fn test_grand_total_is_price_plus_buyers_fee() {
    let schedule = fee_schedule();
    for price in ["0.01", "7.77", "19.99", "250.00", "1234.56"] {
        let fee = quote(d(price), &schedule).unwrap();
        assert_eq!(fee.grand_total, fee.item_price + fee.buyers_fee, "price {price}");
        assert_eq!(fee.item_fee, fee.discount);
    }
}

#[test]
fn test_zero_price() {
    let fee = quote(Decimal::ZERO, &fee_schedule()).unwrap();
    assert_eq!(fee.grand_total, d("3.00"));
}

#[test]
fn test_negative_price_is_invalid_amount() {
    let err = quote(d("-1.00"), &fee_schedule()).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidAmount(_)));
}

#[test]
fn test_item_fee_uses_bankers_rounding() {
    let schedule = FeeSchedule {
        item_fee_percentage: d("0.05"),
        ..fee_schedule()
    };

    assert_eq!(quote(d("2.50"), &schedule).unwrap().item_fee, d("0.12"));
    assert_eq!(quote(d("2.70"), &schedule).unwrap().item_fee, d("0.14"));
}

#[test]
fn test_breakdown_carries_schedule_snapshot() {
    let schedule = fee_schedule();
    let fee = quote(d("10.00"), &schedule).unwrap();
    assert_eq!(fee.pickup_fee, schedule.pickup_fee);
    assert_eq!(fee.safe_service_fee, schedule.safe_service_fee);
    assert_eq!(fee.item_fee_percentage, schedule.item_fee_percentage);
}

#[test]
fn test_schedule_validation() {
    assert!(fee_schedule().validate().is_ok());

    let negative = FeeSchedule {
        pickup_fee: d("-1.00"),
        ..fee_schedule()
    };
    assert!(matches!(negative.validate(), Err(ServiceError::Validation(_))));

    let lowercase = FeeSchedule {
        currency: "gbp".to_string(),
        ..fee_schedule()
    };
    assert!(matches!(lowercase.validate(), Err(ServiceError::Validation(_))));
}
