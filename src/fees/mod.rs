//! Pickup fee domain module
//!
//! Fee schedule, the derived fee breakdown, and the pure calculator that
//! turns one into the other.

mod calculator;
mod model;

pub use calculator::{quote, round_money};
pub use model::*;
