//! Multi-method payment of parking fees: cash, saved card, crypto through
//! the on-chain fee contract, hosted PayPal checkout and loyalty points.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;
