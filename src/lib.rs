//! RoundBuy pickup exchange and wallet settlement server
//!
//! Buyers schedule in-person pickups for accepted offers, sellers confirm
//! them, and buyers settle the pickup fees from their wallet or a card.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod fees;
pub mod handlers;
pub mod integrations;
pub mod locks;
pub mod middleware;
pub mod models;
pub mod pickup;
pub mod routes;
pub mod settlement;
pub mod state;
pub mod wallet;
pub mod websocket;
