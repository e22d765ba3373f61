//! Curra Blockchain Core Library
//!
//! A minimal proof-of-work cryptocurrency node: UTXO ledger, ECDSA-signed
//! transactions, a mempool, fork resolution by cumulative work and a small
//! gossip protocol that keeps peers on the heaviest valid chain.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod rpc;
pub mod storage;
pub mod validation;
pub mod wallet;

/// Protocol constants - HARD-CODED, NEVER CONFIGURABLE
///
/// Every node must agree on these for chains to be comparable.
pub mod constants {
    /// Reward paid by every coinbase transaction
    pub const COINBASE_AMOUNT: u64 = 50;

    /// Target seconds between blocks
    pub const BLOCK_GENERATION_INTERVAL: u64 = 10;

    /// Difficulty adjustment interval (blocks)
    pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

    /// Allowed clock drift for block timestamps, in seconds
    pub const TIMESTAMP_TOLERANCE: u64 = 60;

    /// Genesis timestamp (Unix timestamp)
    pub const GENESIS_TIMESTAMP: u64 = 1_533_629_395;

    /// Recipient of the genesis coinbase
    pub const GENESIS_ADDRESS: &str = "043fdd20b80b8836486c4f76f8a918d256c3dea5d8e7e1029241e12ce30b7aeb09a25e172785179ca67f42e1c220bdb4019f3fff14f80802d36eb7582664377753";
}
