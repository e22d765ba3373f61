//! Block miner implementation
//!
//! Performs the proof-of-work nonce search. The search is the only
//! long-running operation in the node. Each search belongs to a generation;
//! stopping the miner advances the generation and ends every search
//! started before it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::consensus::{hash_matches_difficulty, hash_prefix, hash_with_nonce, Block};
use crate::crypto::Hash;
use crate::validation::Transaction;

/// Nonces tried between progress log lines
const PROGRESS_INTERVAL: u64 = 1 << 20;

/// Everything a block needs except its nonce and hash
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_hash: Hash,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
}

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Successfully mined a block
    Success(Block),
    /// Mining was interrupted
    Interrupted,
}

/// Block miner
#[derive(Clone, Default)]
pub struct Miner {
    /// Bumped by every stop
    generation: Arc<AtomicU64>,
}

impl Miner {
    /// Create a new miner
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation a search started now belongs to
    pub fn start(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stop every search in progress
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether a search of `generation` has been stopped
    pub fn is_stopped(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Mine a block (find valid nonce)
    ///
    /// Tries nonces upward from 0 until the hash has `difficulty` leading
    /// zero bits or the miner is stopped after `generation` began.
    pub fn mine_block(&self, template: BlockTemplate, generation: u64) -> MiningResult {
        let BlockTemplate {
            index,
            previous_hash,
            timestamp,
            transactions,
            difficulty,
        } = template;

        let mut prefix = hash_prefix(index, &previous_hash, timestamp, &transactions, difficulty);
        let mut nonce: u64 = 0;

        loop {
            if self.is_stopped(generation) {
                log::debug!("Mining of block {} interrupted at nonce {}", index, nonce);
                return MiningResult::Interrupted;
            }

            let hash = hash_with_nonce(&mut prefix, nonce);
            if hash_matches_difficulty(&hash, difficulty) {
                return MiningResult::Success(Block {
                    index,
                    hash,
                    previous_hash,
                    timestamp,
                    transactions,
                    difficulty,
                    nonce,
                });
            }

            nonce = nonce.wrapping_add(1);
            if nonce % PROGRESS_INTERVAL == 0 {
                log::debug!("Block {}: {} nonces tried at difficulty {}", index, nonce, difficulty);
            }
        }
    }
}

/// Uncancellable nonce search
pub fn mine_block(
    index: u64,
    previous_hash: Hash,
    timestamp: u64,
    transactions: Vec<Transaction>,
    difficulty: u32,
) -> Block {
    let template = BlockTemplate {
        index,
        previous_hash,
        timestamp,
        transactions,
        difficulty,
    };
    loop {
        // Nothing else holds this miner, so it is never stopped
        let miner = Miner::new();
        if let MiningResult::Success(block) = miner.mine_block(template.clone(), miner.start()) {
            return block;
        }
    }
}
