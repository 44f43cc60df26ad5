//! Middleware for the RoundBuy API
//!
//! Request tracing and the authentication extractors.

pub mod auth;
mod request_log;

pub use auth::{AdminUser, AuthenticatedUser};
pub use request_log::request_tracing;
