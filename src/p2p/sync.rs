//! Chain reconciliation between peers
//!
//! Turns incoming messages into engine calls. Broadcasting is left to the
//! engine's event sink; this module only produces direct replies, so
//! handling the same message twice or out of order converges on the same
//! state.

use super::Message;
use crate::consensus::Block;
use crate::node::{ChainEngine, ChainError};
use crate::validation::Transaction;

/// What a `ChainResponse` did to the local chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Empty, malformed or not ahead of the local head
    Ignored,
    /// The peer's head extended ours and was appended
    Appended,
    /// A lone block that does not connect; the full chain is needed
    NeedFullChain,
    /// The peer's chain was heavier and replaced ours
    Replaced,
    /// The peer's chain was valid but not heavier
    Kept,
    /// The block or chain failed validation
    Rejected(ChainError),
}

/// Messages a node sends to a newly connected peer
pub fn on_connect_messages() -> Vec<Message> {
    vec![Message::RequestLatest, Message::RequestMempool]
}

/// Handle one message; returns the reply for the sender, if any
pub fn handle_message(engine: &mut ChainEngine, msg: Message) -> Option<Message> {
    match msg {
        Message::RequestLatest => Some(Message::ChainResponse(vec![engine.head().clone()])),
        Message::RequestAll => Some(Message::ChainResponse(engine.chain().to_vec())),
        Message::RequestMempool => Some(Message::MempoolResponse(
            engine.mempool().transactions().to_vec(),
        )),
        Message::ChainResponse(blocks) => match handle_chain_response(engine, blocks) {
            SyncOutcome::NeedFullChain => Some(Message::RequestAll),
            _ => None,
        },
        Message::MempoolResponse(txs) => {
            handle_mempool_response(engine, txs);
            None
        }
    }
}

/// Reconcile the local chain with blocks received from a peer
pub fn handle_chain_response(engine: &mut ChainEngine, blocks: Vec<Block>) -> SyncOutcome {
    let Some(latest) = blocks.last() else {
        return SyncOutcome::Ignored;
    };

    if let Err(e) = latest.check_structure() {
        log::debug!("Ignoring malformed block from peer: {}", e);
        return SyncOutcome::Ignored;
    }

    let (head_index, head_hash) = (engine.head().index, engine.head().hash);
    if latest.index <= head_index {
        return SyncOutcome::Ignored;
    }

    if latest.previous_hash == head_hash {
        return match engine.add_block(latest.clone()) {
            Ok(()) => SyncOutcome::Appended,
            Err(e) => {
                log_rejection("block", &e);
                SyncOutcome::Rejected(e)
            }
        };
    }

    if blocks.len() == 1 {
        log::debug!(
            "Peer is ahead at block {} (local {}); requesting full chain",
            latest.index,
            head_index
        );
        return SyncOutcome::NeedFullChain;
    }

    match engine.maybe_replace(blocks) {
        Ok(true) => SyncOutcome::Replaced,
        Ok(false) => SyncOutcome::Kept,
        Err(e) => {
            log_rejection("chain", &e);
            SyncOutcome::Rejected(e)
        }
    }
}

/// Missing references may resolve once more blocks arrive; anything else is invalid
fn log_rejection(what: &str, e: &ChainError) {
    if e.is_retryable() {
        log::debug!("Deferred {} from peer: {}", what, e);
    } else {
        log::warn!("Rejected {} from peer: {}", what, e);
    }
}

/// Admit gossiped transactions one by one; returns how many were admitted
pub fn handle_mempool_response(engine: &mut ChainEngine, txs: Vec<Transaction>) -> usize {
    let mut admitted = 0;
    for tx in txs {
        let id = tx.id;
        match engine.submit_transaction(tx) {
            Ok(()) => admitted += 1,
            Err(e) => log::debug!("Dropped gossiped transaction {}: {}", id, e),
        }
    }
    admitted
}
