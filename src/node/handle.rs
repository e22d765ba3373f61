//! Shared node handle
//!
//! Cloneable access to one node's engine, wallet, miner and peers, used by
//! the P2P transport and the HTTP API alike.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::engine::{ChainEngine, ChainError};
use crate::consensus::Block;
use crate::crypto::Address;
use crate::mining::{MempoolError, Miner, MiningResult};
use crate::p2p::{self, Message, PeerBroadcaster, PeerManager};
use crate::validation::Transaction;
use crate::wallet::{Wallet, WalletError};

/// Node-level errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A running node
#[derive(Clone)]
pub struct Node {
    engine: Arc<Mutex<ChainEngine>>,
    wallet: Arc<Wallet>,
    miner: Miner,
    peers: Arc<PeerManager>,
}

impl Node {
    /// Build a node at genesis whose chain events are gossiped to `peers`
    pub fn new(wallet: Wallet, peers: Arc<PeerManager>) -> Result<Self, ChainError> {
        let miner = Miner::new();
        let events = PeerBroadcaster::new(Arc::clone(&peers), miner.clone());
        let engine = ChainEngine::new(Box::new(events))?;

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            wallet: Arc::new(wallet),
            miner,
            peers,
        })
    }

    /// Exclusive access to the chain state
    pub fn engine(&self) -> MutexGuard<'_, ChainEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn address(&self) -> &Address {
        self.wallet.address()
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn peers(&self) -> &Arc<PeerManager> {
        &self.peers
    }

    pub fn balance(&self) -> u64 {
        self.wallet.balance(self.engine().utxos())
    }

    /// Mine one block paying this node's wallet
    ///
    /// The nonce search runs on the blocking pool without holding the engine
    /// lock. Returns `Ok(None)` if a head change interrupted the search; a
    /// result that went stale anyway is rejected by `add_block`.
    pub async fn mine(&self) -> Result<Option<Block>, NodeError> {
        // Head changes stop the miner under this lock, so the generation
        // read here is stopped by any change after the template was built
        let (generation, template) = {
            let engine = self.engine();
            (self.miner.start(), engine.block_template(self.address())?)
        };
        log::debug!(
            "Mining block {} at difficulty {} with {} transactions",
            template.index,
            template.difficulty,
            template.transactions.len()
        );

        let miner = self.miner.clone();
        let result = tokio::task::spawn_blocking(move || miner.mine_block(template, generation)).await?;

        match result {
            MiningResult::Success(block) => {
                self.engine().add_block(block.clone())?;
                Ok(Some(block))
            }
            MiningResult::Interrupted => Ok(None),
        }
    }

    /// Pay `amount` to `receiver` from this node's wallet and pool the transaction
    pub fn send_transaction(&self, receiver: &Address, amount: u64) -> Result<Transaction, NodeError> {
        let mut engine = self.engine();
        let tx = self
            .wallet
            .create_transaction(receiver, amount, engine.utxos(), engine.mempool())?;
        engine.submit_transaction(tx.clone())?;
        log::info!("Pooled transaction {} paying {} to {}", tx.id, amount, receiver);
        Ok(tx)
    }

    /// Run one peer message through the sync logic; returns the direct reply
    pub fn handle_message(&self, msg: Message) -> Option<Message> {
        p2p::handle_message(&mut self.engine(), msg)
    }
}
