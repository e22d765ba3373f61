//! Node configuration
//!
//! Deployment settings only. Protocol parameters live in `constants` and
//! are never configurable.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} port must be non-zero")]
    ZeroPort(&'static str),
    #[error("HTTP and P2P ports must differ (both {0})")]
    PortClash(u16),
    #[error("Invalid peer address '{0}', expected host:port")]
    BadPeer(String),
    #[error("Key file path is empty")]
    EmptyKeyFile,
}

/// Runtime configuration of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Port of the HTTP admin API
    pub http_port: u16,
    /// Port to accept peer connections on
    pub p2p_port: u16,
    /// Peers to dial at startup
    pub bootstrap_peers: Vec<String>,
    /// Hex private key of the node wallet, created if missing
    pub key_file: PathBuf,
    /// Mine blocks continuously
    pub auto_mine: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            p2p_port: 6000,
            bootstrap_peers: Vec::new(),
            key_file: PathBuf::from("node.key"),
            auto_mine: false,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::ZeroPort("HTTP"));
        }
        if self.p2p_port == 0 {
            return Err(ConfigError::ZeroPort("P2P"));
        }
        if self.http_port == self.p2p_port {
            return Err(ConfigError::PortClash(self.http_port));
        }
        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyKeyFile);
        }
        if let Some(peer) = self.bootstrap_peers.iter().find(|p| !is_host_port(p)) {
            return Err(ConfigError::BadPeer(peer.clone()));
        }
        Ok(())
    }
}

/// `host:port` with a non-empty host and a non-zero numeric port
pub fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().map_or(false, |p| p != 0),
        None => false,
    }
}
