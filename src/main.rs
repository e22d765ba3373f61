//! Curra Blockchain Node
//!
//! Main entry point for running a Curra node: P2P gossip, HTTP admin API
//! and optional continuous mining.

use clap::Parser;
use curra_core::config::NodeConfig;
use curra_core::node::Node;
use curra_core::p2p::{connect_to_peer, start_p2p_server, PeerManager};
use curra_core::rpc::start_rpc_server;
use curra_core::wallet::Wallet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser)]
#[command(name = "curra-node")]
#[command(version)]
#[command(about = "Curra proof-of-work node", long_about = None)]
struct Cli {
    /// Port of the HTTP admin API
    #[arg(long, env = "HTTP_PORT", default_value_t = 3000)]
    http_port: u16,

    /// Port to accept peer connections on
    #[arg(long, env = "P2P_PORT", default_value_t = 6000)]
    p2p_port: u16,

    /// Peer to connect to at startup (host:port, repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// File holding the wallet's hex private key
    #[arg(long, env = "KEY_FILE", default_value = "node.key")]
    key_file: PathBuf,

    /// Mine blocks continuously
    #[arg(long, env = "MINE")]
    mine: bool,
}

impl From<Cli> for NodeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            http_port: cli.http_port,
            p2p_port: cli.p2p_port,
            bootstrap_peers: cli.peers,
            key_file: cli.key_file,
            auto_mine: cli.mine,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = NodeConfig::from(Cli::parse());
    config.validate()?;

    let wallet = Wallet::load_or_create(&config.key_file)?;
    let peers = Arc::new(PeerManager::default());
    let node = Node::new(wallet, peers)?;

    {
        let engine = node.engine();
        let genesis = &engine.chain()[0];
        log::info!("Genesis block: {}", genesis.hash);
        log::info!("Wallet address: {}", node.address());
    }

    let p2p = tokio::spawn(start_p2p_server(node.clone(), config.p2p_port));
    let api = tokio::spawn(start_rpc_server(node.clone(), config.http_port));

    for peer in &config.bootstrap_peers {
        match connect_to_peer(node.clone(), peer).await {
            Ok(addr) => log::info!("Connected to bootstrap peer {}", addr),
            Err(e) => log::warn!("Could not reach bootstrap peer {}: {}", peer, e),
        }
    }

    if config.auto_mine {
        let miner_node = node.clone();
        tokio::spawn(async move {
            loop {
                match miner_node.mine().await {
                    Ok(Some(block)) => log::info!(
                        "Mined block #{} | {} | balance {}",
                        block.index,
                        block.hash,
                        miner_node.balance()
                    ),
                    Ok(None) => log::debug!("Mining restarted on new head"),
                    Err(e) => {
                        log::warn!("Mining attempt failed: {}", e);
                        sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });
    }

    tokio::select! {
        result = p2p => {
            result??;
        }
        result = api => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown signal received. Stopping node...");
            node.miner().stop();
        }
    }

    Ok(())
}
