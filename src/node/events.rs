//! Notifications emitted by the chain engine
//!
//! The engine never talks to the network directly; whoever owns it decides
//! what a head or mempool change means (gossip, miner cancellation, nothing).

use crate::consensus::Block;
use crate::validation::Transaction;

/// Sink for chain state changes
///
/// Called while the engine is borrowed mutably, so implementations must not
/// call back into the engine.
pub trait ChainEvents: Send {
    /// A block was appended or a heavier chain was adopted
    fn on_head_changed(&self, head: &Block);

    /// A transaction entered the mempool
    fn on_mempool_changed(&self, pool: &[Transaction]);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl ChainEvents for NoopEvents {
    fn on_head_changed(&self, _head: &Block) {}

    fn on_mempool_changed(&self, _pool: &[Transaction]) {}
}
