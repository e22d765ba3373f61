//! Block validation against its predecessor
//!
//! Pure functions; transactions are validated separately against the ledger.

use thiserror::Error;

use super::Block;
use crate::constants::TIMESTAMP_TOLERANCE;
use crate::crypto::Hash;
use crate::error::ErrorKind;

/// Block validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("Malformed block: {0}")]
    BadStructure(String),
    #[error("Invalid index: expected {expected}, got {found}")]
    BadIndex { expected: u64, found: u64 },
    #[error("Invalid previous hash: expected {expected}, got {found}")]
    BadPreviousHash { expected: Hash, found: Hash },
    #[error("Invalid hash: stated {stated}, computed {computed}")]
    BadHash { stated: Hash, computed: Hash },
    #[error("Insufficient proof of work: hash does not meet difficulty {difficulty}")]
    InsufficientWork { difficulty: u32 },
    #[error("Invalid timestamp {timestamp} (previous {previous}, now {now})")]
    BadTimestamp { timestamp: u64, previous: u64, now: u64 },
}

impl BlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockError::BadStructure(_) => ErrorKind::Structural,
            _ => ErrorKind::Consensus,
        }
    }
}

/// Timestamp must be after `previous - 60s` and no more than 60s ahead of `now`
pub fn is_timestamp_valid(candidate: &Block, previous: &Block, now: u64) -> bool {
    // An overflowing sum exceeds every u64 bound
    let after_previous = candidate
        .timestamp
        .checked_add(TIMESTAMP_TOLERANCE)
        .map_or(true, |t| t > previous.timestamp);
    let before_limit = now
        .checked_add(TIMESTAMP_TOLERANCE)
        .map_or(true, |limit| candidate.timestamp < limit);
    after_previous && before_limit
}

/// Validate `candidate` as the direct successor of `previous`
pub fn is_block_valid(candidate: &Block, previous: &Block, now: u64) -> Result<(), BlockError> {
    candidate.check_structure()?;

    let expected = previous.index + 1;
    if candidate.index != expected {
        return Err(BlockError::BadIndex {
            expected,
            found: candidate.index,
        });
    }

    if candidate.previous_hash != previous.hash {
        return Err(BlockError::BadPreviousHash {
            expected: previous.hash,
            found: candidate.previous_hash,
        });
    }

    let computed = candidate.calculate_hash();
    if computed != candidate.hash {
        return Err(BlockError::BadHash {
            stated: candidate.hash,
            computed,
        });
    }

    if !candidate.meets_difficulty() {
        return Err(BlockError::InsufficientWork {
            difficulty: candidate.difficulty,
        });
    }

    if !is_timestamp_valid(candidate, previous, now) {
        return Err(BlockError::BadTimestamp {
            timestamp: candidate.timestamp,
            previous: previous.timestamp,
            now,
        });
    }

    Ok(())
}
