//! Domain layer: payment values, read models and the ports the
//! application layer drives.

pub mod card;
pub mod checkout;
pub mod money;
pub mod payment;
pub mod ports;
pub mod slot;
pub mod vehicle;
