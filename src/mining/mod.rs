//! Mining module - Nonce search and pending transaction pool

mod mempool;
mod miner;

pub use mempool::*;
pub use miner::*;
