//! Pickup domain module
//!
//! Contains models, the transition table, the state machine service, and its
//! storage backends.

mod model;
mod postgres;
mod service;
mod state;
mod store;

pub use model::*;
pub use postgres::PgPickupStore;
pub use service::PickupService;
pub use state::PickupAction;
pub use store::{InMemoryPickupStore, PickupStore};
