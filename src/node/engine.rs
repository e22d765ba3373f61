//! Chain engine
//!
//! Owns the canonical chain, the UTXO set derived from it and the mempool.
//! Every mutation goes through `&mut self`, so wrapping the engine in one
//! mutex serializes all ledger changes.

use thiserror::Error;

use super::events::ChainEvents;
use super::genesis::{create_genesis_block, is_genesis_block};
use crate::consensus::{
    compute_difficulty, is_block_valid, total_work, unix_now, Block, BlockError,
};
use crate::crypto::{Address, Hash};
use crate::error::ErrorKind;
use crate::mining::{mine_block, BlockTemplate, Mempool, MempoolError};
use crate::storage::UTXOSet;
use crate::validation::{validate_block_transactions, Transaction, TxError};

/// Chain engine errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Block {index} rejected: {source}")]
    Block { index: u64, source: BlockError },
    #[error("Transactions of block {index} rejected: {source}")]
    Transactions { index: u64, source: TxError },
    #[error("Chain does not start with the genesis block")]
    BadGenesis,
    #[error("Chain is empty")]
    EmptyChain,
}

impl ChainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Block { source, .. } => source.kind(),
            ChainError::Transactions { source, .. } => source.kind(),
            ChainError::BadGenesis => ErrorKind::Consensus,
            ChainError::EmptyChain => ErrorKind::Structural,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Canonical chain state machine
pub struct ChainEngine {
    chain: Vec<Block>,
    utxos: UTXOSet,
    mempool: Mempool,
    events: Box<dyn ChainEvents>,
}

impl ChainEngine {
    /// Start from the genesis block
    ///
    /// Fails only if the built-in genesis block does not validate, which is
    /// fatal for the node.
    pub fn new(events: Box<dyn ChainEvents>) -> Result<Self, ChainError> {
        let genesis = create_genesis_block();
        let utxos = replay_block(&genesis, &UTXOSet::new())?;

        Ok(Self {
            chain: vec![genesis],
            utxos,
            mempool: Mempool::new(),
            events,
        })
    }

    pub fn head(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.head().index
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn utxos(&self) -> &UTXOSet {
        &self.utxos
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.chain.iter().find(|block| block.hash == *hash)
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.utxos.balance(address)
    }

    /// Difficulty the next block must be mined at
    pub fn next_difficulty(&self) -> u32 {
        compute_difficulty(&self.chain)
    }

    pub fn total_work(&self) -> u128 {
        total_work(&self.chain)
    }

    /// Template for the next block: a coinbase to `miner` plus the mempool
    pub fn block_template(&self, miner: &Address) -> Result<BlockTemplate, ChainError> {
        let index = self.height() + 1;
        let coinbase = Transaction::coinbase(miner.clone(), index)
            .map_err(|source| ChainError::Transactions { index, source })?;
        let mut transactions = vec![coinbase];
        transactions.extend(self.mempool.transactions().iter().cloned());
        Ok(self.template_with(transactions))
    }

    fn template_with(&self, transactions: Vec<Transaction>) -> BlockTemplate {
        let head = self.head();
        BlockTemplate {
            index: head.index + 1,
            previous_hash: head.hash,
            timestamp: unix_now(),
            transactions,
            difficulty: self.next_difficulty(),
        }
    }

    /// Mine a block carrying `transactions` as-is and append it
    ///
    /// Runs the nonce search on the caller's thread; the async node handle
    /// mines outside the lock instead.
    pub fn create_raw_block(&mut self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        let t = self.template_with(transactions);
        let block = mine_block(t.index, t.previous_hash, t.timestamp, t.transactions, t.difficulty);
        self.add_block(block.clone())?;
        Ok(block)
    }

    /// Mine coinbase + mempool snapshot and append the block
    pub fn create_block(&mut self, miner: &Address) -> Result<Block, ChainError> {
        let t = self.block_template(miner)?;
        let block = mine_block(t.index, t.previous_hash, t.timestamp, t.transactions, t.difficulty);
        self.add_block(block.clone())?;
        Ok(block)
    }

    /// Append `block` if it extends the head; state is untouched on error
    pub fn add_block(&mut self, block: Block) -> Result<(), ChainError> {
        is_block_valid(&block, self.head(), unix_now()).map_err(|source| ChainError::Block {
            index: block.index,
            source,
        })?;
        let utxos = replay_block(&block, &self.utxos)?;

        log::info!(
            "Added block {} ({}) with {} transactions",
            block.index,
            block.hash,
            block.transactions.len()
        );

        self.utxos = utxos;
        self.mempool.prune(&self.utxos);
        self.chain.push(block);
        self.events.on_head_changed(self.head());
        Ok(())
    }

    /// Replay `candidate` from genesis and return the resulting UTXO set
    pub fn evaluate_candidate_chain(&self, candidate: &[Block]) -> Result<UTXOSet, ChainError> {
        let genesis = candidate.first().ok_or(ChainError::EmptyChain)?;
        if !is_genesis_block(genesis) {
            return Err(ChainError::BadGenesis);
        }

        let now = unix_now();
        let mut utxos = replay_block(genesis, &UTXOSet::new())?;
        for pair in candidate.windows(2) {
            let (previous, block) = (&pair[0], &pair[1]);
            is_block_valid(block, previous, now).map_err(|source| ChainError::Block {
                index: block.index,
                source,
            })?;
            utxos = replay_block(block, &utxos)?;
        }

        Ok(utxos)
    }

    /// Adopt `candidate` if it is valid and carries strictly more work
    ///
    /// Returns `Ok(false)` when the current chain is at least as heavy.
    pub fn maybe_replace(&mut self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        let candidate_work = total_work(&candidate);
        let current_work = self.total_work();
        if candidate_work <= current_work {
            log::debug!(
                "Ignoring candidate chain with work {} (current {})",
                candidate_work,
                current_work
            );
            return Ok(false);
        }

        let utxos = self.evaluate_candidate_chain(&candidate)?;

        log::info!(
            "Replacing chain: height {} -> {}, work {} -> {}",
            self.height(),
            candidate.len().saturating_sub(1),
            current_work,
            candidate_work
        );

        self.chain = candidate;
        self.utxos = utxos;
        self.mempool.prune(&self.utxos);
        self.events.on_head_changed(self.head());
        Ok(true)
    }

    /// Admit a transaction to the mempool against the current UTXO set
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        self.mempool.admit(tx, &self.utxos)?;
        self.events.on_mempool_changed(self.mempool.transactions());
        Ok(())
    }
}

/// Validate a block's transactions against `utxos` and apply them
fn replay_block(block: &Block, utxos: &UTXOSet) -> Result<UTXOSet, ChainError> {
    validate_block_transactions(&block.transactions, utxos, block.index).map_err(|source| {
        ChainError::Transactions {
            index: block.index,
            source,
        }
    })?;
    Ok(utxos.apply_transactions(&block.transactions))
}
