//! TCP transport
//!
//! Accepts and dials peer connections. Each connection gets a writer task
//! fed by the queue registered with the peer manager, and a reader loop
//! that runs every message through the node. Whichever half fails first
//! ends the connection and unregisters the peer.

use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use super::{on_connect_messages, MessageCodec, PeerError, PEER_QUEUE_SIZE};
use crate::node::Node;

/// Bind `port` and accept inbound peers forever
pub async fn start_p2p_server(node: Node, port: u16) -> Result<(), PeerError> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("P2P server listening on {}", addr);
    serve(listener, node).await;
    Ok(())
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, node: Node) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                log::debug!("Inbound connection from {}", addr);
                let node = node.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, node, false).await {
                        log::warn!("Connection with {} ended: {}", addr, e);
                    }
                });
            }
            Err(e) => log::warn!("Accept failed: {}", e),
        }
    }
}

/// Dial a peer and start handling the connection in the background
pub async fn connect_to_peer(node: Node, addr: &str) -> Result<SocketAddr, PeerError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| PeerError::ConnectionFailed(format!("{}: {}", addr, e)))?;
    let peer_addr = stream
        .peer_addr()
        .map_err(|e| PeerError::ConnectionFailed(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, peer_addr, node, true).await {
            log::warn!("Connection with {} ended: {}", peer_addr, e);
        }
    });

    Ok(peer_addr)
}

/// Handle a peer connection (both inbound and outbound)
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    node: Node,
    outbound: bool,
) -> Result<(), PeerError> {
    let (mut writer, mut reader) = Framed::new(stream, MessageCodec).split();

    let (tx, mut rx) = mpsc::channel(PEER_QUEUE_SIZE);
    node.peers().add_peer(addr, tx, outbound)?;

    for msg in on_connect_messages() {
        if let Err(e) = node.peers().send_to(&addr, msg) {
            node.peers().remove_peer(&addr);
            return Err(e);
        }
    }

    let mut write_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            writer.send(msg).await?;
        }
        Ok::<(), PeerError>(())
    });

    let result = loop {
        let next = tokio::select! {
            next = reader.next() => next,
            written = &mut write_handle => {
                break match written {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        log::warn!("Write to {} failed: {}", addr, e);
                        Err(e)
                    }
                    Err(e) => {
                        log::error!("Writer for {} failed: {}", addr, e);
                        Ok(())
                    }
                };
            }
        };

        match next {
            Some(Ok(msg)) => {
                log::debug!("Received {} from {}", msg.command(), addr);
                let handler = node.clone();
                let reply = tokio::task::spawn_blocking(move || handler.handle_message(msg)).await;
                match reply {
                    Ok(Some(reply)) => {
                        if let Err(e) = node.peers().send_to(&addr, reply) {
                            break Err(e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::error!("Message handler for {} failed: {}", addr, e);
                        break Ok(());
                    }
                }
            }
            Some(Err(e)) => break Err(PeerError::Io(e)),
            None => {
                log::info!("Peer {} disconnected", addr);
                break Ok(());
            }
        }
    };

    write_handle.abort();
    node.peers().remove_peer(&addr);
    result
}
