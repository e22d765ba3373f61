//! Block structure for the Curra blockchain
//!
//! A block's hash commits to every field except the hash itself.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{hash_matches_difficulty, BlockError};
use crate::crypto::{hash_bytes, Hash};
use crate::validation::Transaction;

/// A complete block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height in the chain, genesis is 0
    pub index: u64,
    /// Hash of this block
    pub hash: Hash,
    /// Hash of the previous block (zero for genesis)
    pub previous_hash: Hash,
    /// Block timestamp (seconds since Unix epoch)
    pub timestamp: u64,
    /// Coinbase first, then regular transactions
    pub transactions: Vec<Transaction>,
    /// Required leading zero bits of `hash`
    pub difficulty: u32,
    /// Nonce used for PoW
    pub nonce: u64,
}

impl Block {
    /// Assemble a block and compute its hash for the given nonce
    pub fn new(
        index: u64,
        previous_hash: Hash,
        timestamp: u64,
        transactions: Vec<Transaction>,
        difficulty: u32,
        nonce: u64,
    ) -> Self {
        let hash = calculate_hash(index, &previous_hash, timestamp, &transactions, difficulty, nonce);
        Self {
            index,
            hash,
            previous_hash,
            timestamp,
            transactions,
            difficulty,
            nonce,
        }
    }

    /// Recompute the hash from the block's contents
    pub fn calculate_hash(&self) -> Hash {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.difficulty,
            self.nonce,
        )
    }

    pub fn has_valid_hash(&self) -> bool {
        self.calculate_hash() == self.hash
    }

    pub fn meets_difficulty(&self) -> bool {
        hash_matches_difficulty(&self.hash, self.difficulty)
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_zero()
    }

    /// Shape checks that need no chain context
    ///
    /// Field types are enforced by deserialization; this covers what the
    /// types cannot express.
    pub fn check_structure(&self) -> Result<(), BlockError> {
        if self.transactions.is_empty() {
            return Err(BlockError::BadStructure("block has no transactions".into()));
        }
        if self.index > 0 && self.previous_hash.is_zero() {
            return Err(BlockError::BadStructure("non-genesis block without previous hash".into()));
        }
        if self.hash.is_zero() {
            return Err(BlockError::BadStructure("block hash is empty".into()));
        }
        Ok(())
    }
}

/// Serialize everything but the nonce; the nonce is appended last so the
/// prefix can be reused across mining attempts
pub(crate) fn hash_prefix(
    index: u64,
    previous_hash: &Hash,
    timestamp: u64,
    transactions: &[Transaction],
    difficulty: u32,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&index.to_le_bytes());
    bytes.extend_from_slice(previous_hash.as_bytes());
    bytes.extend_from_slice(&timestamp.to_le_bytes());

    bytes.extend_from_slice(&(transactions.len() as u32).to_le_bytes());
    for tx in transactions {
        bytes.extend_from_slice(tx.id.as_bytes());

        bytes.extend_from_slice(&(tx.tx_ins.len() as u32).to_le_bytes());
        for input in &tx.tx_ins {
            bytes.extend_from_slice(input.tx_out_id.as_bytes());
            bytes.extend_from_slice(&input.tx_out_index.to_le_bytes());
            bytes.extend_from_slice(&(input.signature.as_bytes().len() as u32).to_le_bytes());
            bytes.extend_from_slice(input.signature.as_bytes());
        }

        bytes.extend_from_slice(&(tx.tx_outs.len() as u32).to_le_bytes());
        for output in &tx.tx_outs {
            let address = output.address.as_str().as_bytes();
            bytes.extend_from_slice(&(address.len() as u32).to_le_bytes());
            bytes.extend_from_slice(address);
            bytes.extend_from_slice(&output.amount.to_le_bytes());
        }
    }

    bytes.extend_from_slice(&difficulty.to_le_bytes());
    bytes
}

/// Hash a block prefix produced by [`hash_prefix`] with the given nonce
pub(crate) fn hash_with_nonce(prefix: &mut Vec<u8>, nonce: u64) -> Hash {
    let len = prefix.len();
    prefix.extend_from_slice(&nonce.to_le_bytes());
    let hash = hash_bytes(prefix);
    prefix.truncate(len);
    hash
}

/// Hash of (index, previous_hash, timestamp, transactions, difficulty, nonce)
pub fn calculate_hash(
    index: u64,
    previous_hash: &Hash,
    timestamp: u64,
    transactions: &[Transaction],
    difficulty: u32,
    nonce: u64,
) -> Hash {
    let mut prefix = hash_prefix(index, previous_hash, timestamp, transactions, difficulty);
    hash_with_nonce(&mut prefix, nonce)
}

/// Current time in Unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
