//! Application layer containing the payment orchestration and the
//! services behind each view of the parking app.
//!
//! The `PaymentOrchestrator` is the primary entry point for paying fees.
//! Views learn about state changes through the `RefreshHub` broadcast
//! channel instead of polling.

pub mod dashboard;
pub mod orchestrator;
pub mod read_model;
pub mod refresh;
pub mod slots;
