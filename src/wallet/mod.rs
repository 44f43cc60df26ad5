//! Wallet domain module
//!
//! Contains models, the ledger service, its storage backends, and the
//! background reconciliation auditor.

mod audit;
mod ledger;
mod model;
mod postgres;
mod store;

pub use audit::reconciliation_auditor;
pub use ledger::{replay, validate_amount, WalletLedger};
pub use model::*;
pub use postgres::PgLedgerStore;
pub use store::{InMemoryLedgerStore, LedgerStore};
