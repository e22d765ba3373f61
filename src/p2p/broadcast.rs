//! Chain event sink that gossips to peers

use std::sync::Arc;

use super::{Message, PeerManager};
use crate::consensus::Block;
use crate::mining::Miner;
use crate::node::ChainEvents;
use crate::validation::Transaction;

/// Announces head and mempool changes to every peer
///
/// A head change also raises the miner's stop signal; whatever it was
/// working on no longer extends the head.
pub struct PeerBroadcaster {
    peers: Arc<PeerManager>,
    miner: Miner,
}

impl PeerBroadcaster {
    pub fn new(peers: Arc<PeerManager>, miner: Miner) -> Self {
        Self { peers, miner }
    }
}

impl ChainEvents for PeerBroadcaster {
    fn on_head_changed(&self, head: &Block) {
        self.miner.stop();
        let sent = self.peers.broadcast(&Message::ChainResponse(vec![head.clone()]));
        log::debug!("Announced block {} to {} peers", head.index, sent);
    }

    fn on_mempool_changed(&self, pool: &[Transaction]) {
        self.peers.broadcast(&Message::MempoolResponse(pool.to_vec()));
    }
}
