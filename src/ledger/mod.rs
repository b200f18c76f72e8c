//! Ledger module containing accounts, vouchers and balance replay

pub mod account;
pub mod balance;
pub mod core;
pub mod transaction;

pub use account::*;
pub use balance::*;
pub use core::*;
pub use transaction::*;
