//! Shared fakes and fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use roundbuy_server::error::{ServiceError, ServiceResult};
use roundbuy_server::fees::FeeSchedule;
use roundbuy_server::integrations::{
    Advertisement, AdvertisementService, Capture, NotificationDispatcher, Offer, OfferService,
    PaymentGateway, PickupEvent,
};
use roundbuy_server::models::{Page, PageRequest};
use roundbuy_server::pickup::{
    InMemoryPickupStore, PaymentStatus, Pickup, PickupFilter, PickupService, PickupStatus,
    PickupStore, SchedulePickupRequest,
};
use roundbuy_server::settlement::SettlementCoordinator;
use roundbuy_server::wallet::{
    InMemoryLedgerStore, LedgerStore, NewWalletTransaction, TransactionCategory, TransactionFilter,
    TransactionType, WalletAccount, WalletLedger, WalletTransaction,
};

pub fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn fee_schedule() -> FeeSchedule {
    FeeSchedule {
        pickup_fee: d("2.00"),
        safe_service_fee: d("1.00"),
        item_fee_percentage: d("0.027"),
        currency: "GBP".to_string(),
    }
}

pub fn pickup_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
}

pub fn pickup_time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 30, 0).unwrap()
}

/// In-memory advertisements and offers
#[derive(Default)]
pub struct FakeMarketplace {
    advertisements: Mutex<HashMap<Uuid, Advertisement>>,
    offers: Mutex<HashMap<Uuid, Offer>>,
}

impl FakeMarketplace {
    /// Create an advertisement by `seller_id` and an offer on it by `buyer_id`
    pub fn list(&self, seller_id: Uuid, buyer_id: Uuid, price: Decimal) -> (Advertisement, Offer) {
        let advertisement = Advertisement {
            id: Uuid::new_v4(),
            seller_id,
            price,
        };
        let offer = Offer {
            id: Uuid::new_v4(),
            buyer_id,
            advertisement_id: advertisement.id,
            offered_price: price,
        };
        self.advertisements
            .lock()
            .unwrap()
            .insert(advertisement.id, advertisement.clone());
        self.offers.lock().unwrap().insert(offer.id, offer.clone());
        (advertisement, offer)
    }
}

#[async_trait]
impl AdvertisementService for FakeMarketplace {
    async fn get_advertisement(&self, id: Uuid) -> ServiceResult<Option<Advertisement>> {
        Ok(self.advertisements.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl OfferService for FakeMarketplace {
    async fn get_offer(&self, id: Uuid) -> ServiceResult<Option<Offer>> {
        Ok(self.offers.lock().unwrap().get(&id).cloned())
    }
}

/// Records every notification; can be told to fail delivery
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Uuid, PickupEvent)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(Uuid, PickupEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify(&self, user_id: Uuid, event: PickupEvent) -> ServiceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal("notification channel down".to_string()));
        }
        self.events.lock().unwrap().push((user_id, event));
        Ok(())
    }
}

/// Card gateway that records captures and refunds
#[derive(Default)]
pub struct FakeGateway {
    captures: Mutex<Vec<(String, Decimal)>>,
    refunds: Mutex<Vec<(String, Decimal)>>,
    decline: AtomicBool,
    refuse_refunds: AtomicBool,
}

impl FakeGateway {
    pub fn decline_captures(&self) {
        self.decline.store(true, Ordering::SeqCst);
    }

    pub fn fail_refunds(&self) {
        self.refuse_refunds.store(true, Ordering::SeqCst);
    }

    pub fn captures(&self) -> Vec<(String, Decimal)> {
        self.captures.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<(String, Decimal)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn capture(
        &self,
        amount: Decimal,
        _currency: &str,
        _method_token: &str,
    ) -> ServiceResult<Capture> {
        if self.decline.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayFailure("Card declined".to_string()));
        }
        let reference = format!("cap_{}", self.captures.lock().unwrap().len() + 1);
        self.captures
            .lock()
            .unwrap()
            .push((reference.clone(), amount));
        Ok(Capture {
            gateway_reference: reference,
        })
    }

    async fn refund(&self, gateway_reference: &str, amount: Decimal) -> ServiceResult<()> {
        if self.refuse_refunds.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayFailure(format!(
                "Refund of {} rejected",
                gateway_reference
            )));
        }
        self.refunds
            .lock()
            .unwrap()
            .push((gateway_reference.to_string(), amount));
        Ok(())
    }
}

/// Pickup store where another writer marks the pickup paid just before our
/// payment write lands
pub struct RacingPaymentStore {
    inner: InMemoryPickupStore,
    armed: AtomicBool,
}

impl RacingPaymentStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryPickupStore::new(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PickupStore for RacingPaymentStore {
    async fn insert(&self, pickup: &Pickup) -> ServiceResult<Pickup> {
        self.inner.insert(pickup).await
    }

    async fn get(&self, id: Uuid) -> ServiceResult<Option<Pickup>> {
        self.inner.get(id).await
    }

    async fn find_active_by_offer(&self, offer_id: Uuid) -> ServiceResult<Option<Pickup>> {
        self.inner.find_active_by_offer(offer_id).await
    }

    async fn list(&self, filter: &PickupFilter, page: PageRequest) -> ServiceResult<Page<Pickup>> {
        self.inner.list(filter, page).await
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        updated: &Pickup,
    ) -> ServiceResult<Pickup> {
        if updated.payment_status == PaymentStatus::Paid && self.armed.swap(false, Ordering::SeqCst)
        {
            let mut rival = updated.clone();
            rival.payment_id = Some("rival-payment".to_string());
            self.inner.compare_and_swap(expected_version, &rival).await?;
        }
        self.inner.compare_and_swap(expected_version, updated).await
    }
}

/// Ledger store that can simulate another process writing the same wallet,
/// or storage going away after a number of appends
pub struct FlakyLedgerStore {
    inner: InMemoryLedgerStore,
    rival_writes: AtomicUsize,
    rival_target: Mutex<Option<TransactionCategory>>,
    appends_left: Mutex<Option<usize>>,
}

impl FlakyLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLedgerStore::new(),
            rival_writes: AtomicUsize::new(0),
            rival_target: Mutex::new(None),
            appends_left: Mutex::new(None),
        }
    }

    /// The next `count` appends each lose to a rival 5.00 top-up landing first
    pub fn contend_next(&self, count: usize) {
        *self.rival_target.lock().unwrap() = None;
        self.rival_writes.store(count, Ordering::SeqCst);
    }

    /// Like `contend_next`, but only appends of `category` are contended
    pub fn contend_on(&self, category: TransactionCategory, count: usize) {
        *self.rival_target.lock().unwrap() = Some(category);
        self.rival_writes.store(count, Ordering::SeqCst);
    }

    /// Let `count` more appends through, then fail every later one
    pub fn fail_appends_after(&self, count: usize) {
        *self.appends_left.lock().unwrap() = Some(count);
    }

    fn take_append_budget(&self) -> bool {
        let mut left = self.appends_left.lock().unwrap();
        match left.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    fn take_rival_write(&self, category: TransactionCategory) -> bool {
        let target = *self.rival_target.lock().unwrap();
        if target.is_some_and(|wanted| wanted != category) {
            return false;
        }
        self.rival_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn find_or_create_account(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> ServiceResult<WalletAccount> {
        self.inner.find_or_create_account(user_id, currency).await
    }

    async fn append(
        &self,
        account: &WalletAccount,
        entry: NewWalletTransaction,
    ) -> ServiceResult<WalletTransaction> {
        if !self.take_append_budget() {
            return Err(ServiceError::Storage("ledger database unavailable".to_string()));
        }
        if self.take_rival_write(entry.category) {
            let rival = NewWalletTransaction {
                transaction_type: TransactionType::Credit,
                category: TransactionCategory::Topup,
                amount: d("5.00"),
                balance_after: account.balance + d("5.00"),
                description: "Top-up from another node".to_string(),
                reference: None,
            };
            self.inner.append(account, rival).await?;
        }
        self.inner.append(account, entry).await
    }

    async fn list_transactions(
        &self,
        wallet_id: Uuid,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<WalletTransaction>> {
        self.inner.list_transactions(wallet_id, filter, page).await
    }

    async fn transactions_in_order(&self, wallet_id: Uuid) -> ServiceResult<Vec<WalletTransaction>> {
        self.inner.transactions_in_order(wallet_id).await
    }

    async fn list_accounts(&self) -> ServiceResult<Vec<WalletAccount>> {
        self.inner.list_accounts().await
    }
}

/// Fully wired services over in-memory stores and fakes
pub struct Harness {
    pub pickups: Arc<PickupService>,
    pub ledger: Arc<WalletLedger>,
    pub settlement: Arc<SettlementCoordinator>,
    pub marketplace: Arc<FakeMarketplace>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<FakeGateway>,
    pub buyer: Uuid,
    pub seller: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryPickupStore::new()))
    }

    pub fn with_store(store: Arc<dyn PickupStore>) -> Self {
        Self::with_stores(store, Arc::new(InMemoryLedgerStore::new()))
    }

    pub fn with_stores(store: Arc<dyn PickupStore>, ledger_store: Arc<dyn LedgerStore>) -> Self {
        let marketplace = Arc::new(FakeMarketplace::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(FakeGateway::default());

        let pickups = Arc::new(PickupService::new(
            store,
            marketplace.clone(),
            marketplace.clone(),
            notifier.clone(),
            fee_schedule(),
        ));
        let ledger = Arc::new(WalletLedger::new(ledger_store, "GBP"));
        let settlement = Arc::new(SettlementCoordinator::new(
            pickups.clone(),
            ledger.clone(),
            gateway.clone(),
        ));

        Self {
            pickups,
            ledger,
            settlement,
            marketplace,
            notifier,
            gateway,
            buyer: Uuid::new_v4(),
            seller: Uuid::new_v4(),
        }
    }

    pub fn schedule_request(&self, price: &str) -> SchedulePickupRequest {
        let (advertisement, offer) = self.marketplace.list(self.seller, self.buyer, d(price));
        SchedulePickupRequest {
            offer_id: offer.id,
            advertisement_id: advertisement.id,
            scheduled_date: pickup_date(),
            scheduled_time: pickup_time(),
            description: Some("Outside the station".to_string()),
        }
    }

    pub async fn scheduled_pickup(&self, price: &str) -> Pickup {
        let request = self.schedule_request(price);
        self.pickups.schedule(self.buyer, request).await.unwrap()
    }

    pub async fn confirmed_pickup(&self, price: &str) -> Pickup {
        let pickup = self.scheduled_pickup(price).await;
        self.pickups
            .confirm(pickup.id, self.seller, PickupStatus::Pending)
            .await
            .unwrap()
    }

    pub async fn fund_buyer(&self, amount: &str) {
        self.ledger
            .credit(self.buyer, d(amount), TransactionCategory::Topup, "Test funding")
            .await
            .unwrap();
    }
}
