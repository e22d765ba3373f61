//! Storage module - in-memory UTXO set

mod utxo;

pub use utxo::*;
