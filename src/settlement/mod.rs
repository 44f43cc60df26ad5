//! Settlement of pickup fees and wallet top-ups
//!
//! Funds move first, the pickup is marked paid second. If the second step
//! loses a race, the first is reversed before the error is returned.

mod coordinator;
mod model;

pub use coordinator::SettlementCoordinator;
pub use model::*;
