//! API handlers for the RoundBuy server

pub mod pickup;
pub mod wallet;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};
