//! Peer management
//!
//! Tracks connected peers and the outbound queue of each connection.
//! All methods are synchronous so chain events can broadcast from inside
//! the engine lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

use super::Message;

/// Maximum number of connected peers
pub const MAX_PEERS: usize = 32;

/// Outbound queue depth per peer
pub const PEER_QUEUE_SIZE: usize = 128;

/// Peer connection errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Peer {0} is not connected")]
    Disconnected(SocketAddr),
    #[error("Outbound queue of {0} is full")]
    QueueFull(SocketAddr),
    #[error("Already connected to {0}")]
    AlreadyConnected(SocketAddr),
    #[error("Max peers reached")]
    MaxPeersReached,
}

/// Peer manager
pub struct PeerManager {
    peers: Mutex<HashMap<SocketAddr, mpsc::Sender<Message>>>,
    max_peers: usize,
}

impl Default for PeerManager {
    fn default() -> Self {
        Self::new(MAX_PEERS)
    }
}

impl PeerManager {
    /// Create a new peer manager
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            max_peers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, mpsc::Sender<Message>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection and the queue feeding its writer
    pub fn add_peer(
        &self,
        addr: SocketAddr,
        tx: mpsc::Sender<Message>,
        outbound: bool,
    ) -> Result<(), PeerError> {
        let mut peers = self.lock();
        if peers.contains_key(&addr) {
            return Err(PeerError::AlreadyConnected(addr));
        }
        if peers.len() >= self.max_peers {
            return Err(PeerError::MaxPeersReached);
        }

        peers.insert(addr, tx);
        log::info!("Added peer: {} (outbound: {})", addr, outbound);
        Ok(())
    }

    /// Remove a peer
    pub fn remove_peer(&self, addr: &SocketAddr) {
        if self.lock().remove(addr).is_some() {
            log::info!("Removed peer: {}", addr);
        }
    }

    /// Queue `msg` for one peer without waiting
    pub fn send_to(&self, addr: &SocketAddr, msg: Message) -> Result<(), PeerError> {
        let peers = self.lock();
        let tx = peers.get(addr).ok_or(PeerError::Disconnected(*addr))?;
        tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PeerError::QueueFull(*addr),
            mpsc::error::TrySendError::Closed(_) => PeerError::Disconnected(*addr),
        })
    }

    /// Queue `msg` for every peer; returns how many accepted it
    pub fn broadcast(&self, msg: &Message) -> usize {
        let peers = self.lock();
        let mut delivered = 0;
        for (addr, tx) in peers.iter() {
            match tx.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Dropping {} for {}: {}", msg.command(), addr, e),
            }
        }
        delivered
    }

    pub fn peer_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn test_add_and_remove_peer() {
        let pm = PeerManager::default();
        let (tx, _rx) = mpsc::channel(4);

        pm.add_peer(make_addr(6001), tx.clone(), true).unwrap();
        assert_eq!(pm.peer_count(), 1);
        assert!(matches!(
            pm.add_peer(make_addr(6001), tx, false),
            Err(PeerError::AlreadyConnected(_))
        ));

        pm.remove_peer(&make_addr(6001));
        assert_eq!(pm.peer_count(), 0);
    }

    #[test]
    fn test_max_peers() {
        let pm = PeerManager::new(1);
        let (tx, _rx) = mpsc::channel(4);

        pm.add_peer(make_addr(6001), tx.clone(), true).unwrap();
        assert!(matches!(
            pm.add_peer(make_addr(6002), tx, true),
            Err(PeerError::MaxPeersReached)
        ));
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let pm = PeerManager::default();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        pm.add_peer(make_addr(6001), tx1, true).unwrap();
        pm.add_peer(make_addr(6002), tx2, false).unwrap();

        assert_eq!(pm.broadcast(&Message::RequestLatest), 2);
        assert_eq!(rx1.try_recv().unwrap(), Message::RequestLatest);
        assert_eq!(rx2.try_recv().unwrap(), Message::RequestLatest);
    }

    #[test]
    fn test_send_to_closed_peer() {
        let pm = PeerManager::default();
        let (tx, rx) = mpsc::channel(4);
        pm.add_peer(make_addr(6001), tx, true).unwrap();
        drop(rx);

        assert!(matches!(
            pm.send_to(&make_addr(6001), Message::RequestAll),
            Err(PeerError::Disconnected(_))
        ));
        assert!(matches!(
            pm.send_to(&make_addr(6002), Message::RequestAll),
            Err(PeerError::Disconnected(_))
        ));
    }
}
