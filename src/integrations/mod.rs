//! Collaborators the engine consumes
//!
//! Marketplace lookups, the card payment gateway, and notification delivery
//! are owned by other systems. Each sits behind a trait so the services can be
//! wired to real adapters in production and to fakes in tests.

mod gateway;
mod marketplace;
mod notifications;

pub use gateway::{Capture, HttpPaymentGateway, PaymentGateway, SimulatedPaymentGateway};
pub use marketplace::{Advertisement, AdvertisementService, MarketplaceClient, Offer, OfferService};
pub use notifications::{NotificationDispatcher, PickupEvent, UserNotification};
