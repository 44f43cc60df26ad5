//! Settlement coordinator - pays pickup fees and tops up wallets

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::fees::quote;
use crate::integrations::{PaymentGateway, PickupEvent};
use crate::pickup::{PaymentMethod, PaymentRecord, Pickup, PickupService, PickupStatus};
use crate::settlement::{PayPickupRequest, Receipt};
use crate::wallet::{
    validate_amount, LedgerPosting, TopUpRequest, TransactionCategory, TransactionType,
    WalletLedger, WalletTransaction,
};

/// Funds already moved for a payment attempt
#[derive(Debug)]
enum FundsMovement {
    Wallet(WalletTransaction),
    Card { gateway_reference: String },
    /// Nothing owed, so nothing moved
    Waived { pickup_id: Uuid },
}

impl FundsMovement {
    fn reference(&self) -> String {
        match self {
            FundsMovement::Wallet(tx) => tx.id.to_string(),
            FundsMovement::Card { gateway_reference } => gateway_reference.clone(),
            FundsMovement::Waived { pickup_id } => format!("waived_{}", pickup_id.simple()),
        }
    }

    fn balance_after(&self) -> Option<Decimal> {
        match self {
            FundsMovement::Wallet(tx) => Some(tx.balance_after),
            FundsMovement::Card { .. } | FundsMovement::Waived { .. } => None,
        }
    }
}

/// Coordinates funds movement with the pickup and wallet state it settles
pub struct SettlementCoordinator {
    pickups: Arc<PickupService>,
    ledger: Arc<WalletLedger>,
    gateway: Arc<dyn PaymentGateway>,
}

impl SettlementCoordinator {
    pub fn new(
        pickups: Arc<PickupService>,
        ledger: Arc<WalletLedger>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            pickups,
            ledger,
            gateway,
        }
    }

    /// Pay a confirmed pickup's grand total from the buyer's wallet or card.
    ///
    /// Holds the pickup lock for the whole operation. The wallet lock is only
    /// taken inside the ledger, so the order is always pickup then wallet.
    pub async fn pay_pickup_fee(
        &self,
        pickup_id: Uuid,
        payer_id: Uuid,
        request: PayPickupRequest,
    ) -> ServiceResult<Receipt> {
        request.validate()?;

        let _guard = self.pickups.lock(pickup_id).await;
        let pickup = self.pickups.load(pickup_id).await?;

        self.check_payable(&pickup, payer_id, &request)?;

        let amount = pickup.fee.grand_total;
        let funds = self.move_funds(&pickup, payer_id, &request).await?;

        let paid_at = Utc::now();
        let record = PaymentRecord {
            payment_id: funds.reference(),
            payment_method: request.payment_method,
            paid_at,
        };

        let paid = match self.pickups.record_payment(&pickup, record).await {
            Ok(paid) => paid,
            Err(e) => {
                tracing::warn!(
                    pickup_id = %pickup_id,
                    payer_id = %payer_id,
                    "Recording payment failed after funds moved, compensating: {}",
                    e
                );
                self.compensate(&pickup, payer_id, &funds).await?;
                return Err(e);
            }
        };

        tracing::info!(
            pickup_id = %pickup_id,
            payer_id = %payer_id,
            payment_method = ?request.payment_method,
            payment_id = %funds.reference(),
            amount = %amount,
            "Pickup fee paid"
        );

        self.pickups
            .dispatch(
                paid.seller_id,
                PickupEvent::Paid {
                    pickup_id,
                    amount,
                    currency: paid.currency.clone(),
                },
            )
            .await;

        Ok(Receipt {
            pickup_id,
            payment_id: funds.reference(),
            payment_method: request.payment_method,
            fee: paid.fee,
            amount,
            currency: paid.currency,
            paid_at,
            balance_after: funds.balance_after(),
        })
    }

    /// Capture from the gateway and credit the wallet. A failed credit
    /// refunds the capture.
    pub async fn top_up_wallet(
        &self,
        user_id: Uuid,
        request: TopUpRequest,
    ) -> ServiceResult<WalletTransaction> {
        request.validate()?;
        validate_amount(request.amount)?;

        let capture = self
            .gateway
            .capture(request.amount, self.ledger.currency(), &request.payment_token)
            .await?;

        let posting = LedgerPosting::new(TransactionCategory::Topup, request.amount, "Wallet top-up")
            .with_reference(capture.gateway_reference.clone());

        match self.ledger.post(user_id, TransactionType::Credit, posting).await {
            Ok(tx) => {
                tracing::info!(
                    user_id = %user_id,
                    amount = %request.amount,
                    gateway_reference = %capture.gateway_reference,
                    "Wallet topped up"
                );
                Ok(tx)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    gateway_reference = %capture.gateway_reference,
                    "Top-up credit failed, refunding capture: {}",
                    e
                );
                if let Err(refund_err) = self
                    .gateway
                    .refund(&capture.gateway_reference, request.amount)
                    .await
                {
                    tracing::error!(
                        user_id = %user_id,
                        gateway_reference = %capture.gateway_reference,
                        amount = %request.amount,
                        "Top-up refund failed, manual reconciliation required: {}",
                        refund_err
                    );
                    return Err(ServiceError::Internal(format!(
                        "Top-up {} captured but neither credited nor refunded",
                        capture.gateway_reference
                    )));
                }
                Err(e)
            }
        }
    }

    /// Side-effect free preconditions of a payment
    fn check_payable(
        &self,
        pickup: &Pickup,
        payer_id: Uuid,
        request: &PayPickupRequest,
    ) -> ServiceResult<()> {
        if pickup.buyer_id != payer_id {
            return Err(ServiceError::Forbidden(
                "Only the buyer can pay for a pickup".to_string(),
            ));
        }
        if pickup.is_paid() {
            return Err(ServiceError::AlreadyPaid(pickup.id.to_string()));
        }
        if pickup.status != PickupStatus::Confirmed {
            return Err(ServiceError::InvalidState(format!(
                "Pickup must be confirmed before payment, it is {}",
                pickup.status.as_str()
            )));
        }

        // Re-derive from the snapshot taken at scheduling time
        let expected = quote(pickup.fee.item_price, &pickup.fee.schedule(&pickup.currency))?;
        if expected != pickup.fee {
            tracing::error!(
                pickup_id = %pickup.id,
                stored_total = %pickup.fee.grand_total,
                expected_total = %expected.grand_total,
                "Stored fee breakdown does not match its schedule"
            );
            return Err(ServiceError::InvalidState(
                "Pickup fee breakdown failed verification".to_string(),
            ));
        }

        match request.payment_method {
            PaymentMethod::Wallet if self.ledger.currency() != pickup.currency => {
                Err(ServiceError::InvalidState(format!(
                    "Wallet currency {} cannot pay a {} pickup",
                    self.ledger.currency(),
                    pickup.currency
                )))
            }
            PaymentMethod::Card if request.payment_token.is_none() => Err(
                ServiceError::Validation("Card payments require a payment token".to_string()),
            ),
            _ => Ok(()),
        }
    }

    async fn move_funds(
        &self,
        pickup: &Pickup,
        payer_id: Uuid,
        request: &PayPickupRequest,
    ) -> ServiceResult<FundsMovement> {
        let amount = pickup.fee.grand_total;
        if amount.is_zero() {
            return Ok(FundsMovement::Waived {
                pickup_id: pickup.id,
            });
        }

        match request.payment_method {
            PaymentMethod::Wallet => {
                let posting = LedgerPosting::new(
                    TransactionCategory::Payment,
                    amount,
                    format!("Pickup fee for pickup {}", pickup.id),
                )
                .with_reference(pickup.id.to_string());
                let tx = self
                    .ledger
                    .post(payer_id, TransactionType::Debit, posting)
                    .await?;
                Ok(FundsMovement::Wallet(tx))
            }
            PaymentMethod::Card => {
                let token = request.payment_token.as_deref().unwrap_or_default();
                let capture = self
                    .gateway
                    .capture(amount, &pickup.currency, token)
                    .await
                    .map_err(|e| {
                        tracing::warn!(pickup_id = %pickup.id, "Card capture failed: {}", e);
                        e
                    })?;
                Ok(FundsMovement::Card {
                    gateway_reference: capture.gateway_reference,
                })
            }
        }
    }

    /// Reverse funds moved for a payment that could not be recorded
    async fn compensate(
        &self,
        pickup: &Pickup,
        payer_id: Uuid,
        funds: &FundsMovement,
    ) -> ServiceResult<()> {
        let amount = pickup.fee.grand_total;

        let result = match funds {
            FundsMovement::Wallet(tx) => {
                let posting = LedgerPosting::new(
                    TransactionCategory::Refund,
                    amount,
                    format!("Refund of pickup fee for pickup {}", pickup.id),
                )
                .with_reference(tx.id.to_string());
                self.ledger
                    .post(payer_id, TransactionType::Credit, posting)
                    .await
                    .map(|_| ())
            }
            FundsMovement::Card { gateway_reference } => {
                self.gateway.refund(gateway_reference, amount).await
            }
            FundsMovement::Waived { .. } => Ok(()),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    pickup_id = %pickup.id,
                    payer_id = %payer_id,
                    payment_id = %funds.reference(),
                    amount = %amount,
                    "Payment compensated"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    pickup_id = %pickup.id,
                    payer_id = %payer_id,
                    payment_id = %funds.reference(),
                    amount = %amount,
                    "Compensation failed, manual reconciliation required: {}",
                    e
                );
                Err(ServiceError::Internal(format!(
                    "Payment {} for pickup {} could not be reversed",
                    funds.reference(),
                    pickup.id
                )))
            }
        }
    }
}
