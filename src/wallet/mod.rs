//! Wallet module - Key management and transaction signing

mod wallet;

pub use wallet::*;
