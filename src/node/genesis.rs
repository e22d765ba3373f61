//! Genesis block for the Curra blockchain
//!
//! The genesis block is part of the protocol: every node builds the same
//! block byte for byte and compares candidate chains against it.

use crate::consensus::Block;
use crate::constants::{COINBASE_AMOUNT, GENESIS_ADDRESS, GENESIS_TIMESTAMP};
use crate::crypto::{Address, Hash};
use crate::validation::{Transaction, TxIn, TxOut};

/// Genesis difficulty (no work required)
const GENESIS_DIFFICULTY: u32 = 0;

/// Create the genesis block
///
/// One coinbase paying GENESIS_ADDRESS, empty previous hash, nonce 0.
pub fn create_genesis_block() -> Block {
    let coinbase = Transaction::new(
        vec![TxIn::new(Hash::zero(), 0)],
        vec![TxOut::new(Address::new(GENESIS_ADDRESS), COINBASE_AMOUNT)],
    );

    Block::new(
        0,
        Hash::zero(),
        GENESIS_TIMESTAMP,
        vec![coinbase],
        GENESIS_DIFFICULTY,
        0,
    )
}

/// Get genesis block hash
pub fn genesis_hash() -> Hash {
    create_genesis_block().hash
}

/// Exact comparison against the canonical genesis block
pub fn is_genesis_block(block: &Block) -> bool {
    *block == create_genesis_block()
}
