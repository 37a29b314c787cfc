pub mod abi;
pub mod checkout;
pub mod in_memory;
pub mod ledger;
pub mod rest;
