//! Difficulty adjustment and chain work
//!
//! Difficulty is the number of leading zero bits a block hash must carry.
//! It is retargeted by at most one bit every DIFFICULTY_ADJUSTMENT_INTERVAL blocks.

use super::Block;
use crate::constants::{BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL};
use crate::crypto::Hash;

/// True when `hash` has at least `difficulty` leading zero bits
pub fn hash_matches_difficulty(hash: &Hash, difficulty: u32) -> bool {
    hash.leading_zero_bits() >= difficulty
}

/// Check if the block at this height triggers a retarget
pub fn should_adjust_difficulty(height: u64) -> bool {
    height > 0 && height % DIFFICULTY_ADJUSTMENT_INTERVAL == 0
}

/// Difficulty for the block following the chain's head
///
/// An empty chain yields 0.
pub fn compute_difficulty(chain: &[Block]) -> u32 {
    let Some(newest) = chain.last() else {
        return 0;
    };
    if should_adjust_difficulty(newest.index) {
        calculate_next_difficulty(chain)
    } else {
        newest.difficulty
    }
}

/// Retarget against the block DIFFICULTY_ADJUSTMENT_INTERVAL positions back
///
/// Faster than half the expected time raises difficulty by one, slower than
/// twice the expected time lowers it by one.
fn calculate_next_difficulty(chain: &[Block]) -> u32 {
    let Some(newest) = chain.last() else {
        return 0;
    };
    let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    let last_adjusted = &chain[chain.len().saturating_sub(interval)];

    let expected_time = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL;
    let actual_time = newest.timestamp.saturating_sub(last_adjusted.timestamp);

    if actual_time < expected_time / 2 {
        last_adjusted.difficulty.saturating_add(1)
    } else if actual_time > expected_time * 2 {
        last_adjusted.difficulty.saturating_sub(1)
    } else {
        last_adjusted.difficulty
    }
}

/// Work contributed by one block: 2^difficulty, saturating
pub fn block_work(difficulty: u32) -> u128 {
    1u128.checked_shl(difficulty).unwrap_or(u128::MAX)
}

/// Sum of 2^difficulty over the chain; an empty chain has zero work
pub fn total_work(chain: &[Block]) -> u128 {
    chain
        .iter()
        .fold(0u128, |acc, block| acc.saturating_add(block_work(block.difficulty)))
}
