//! Two nodes talking over real TCP connections

use curra_core::node::Node;
use curra_core::crypto::PrivateKey;
use curra_core::p2p::{connect_to_peer, serve, Message, PeerManager, MAX_MESSAGE_SIZE};
use curra_core::validation::Transaction;
use curra_core::wallet::Wallet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};

fn node() -> Node {
    Node::new(Wallet::generate(), Arc::new(PeerManager::default())).unwrap()
}

/// Start accepting peers on an ephemeral port
async fn listen(node: &Node) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, node.clone()));
    addr.to_string()
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_peer_catches_up_on_connect() {
    let a = node();
    let b = node();
    a.mine().await.unwrap();
    a.mine().await.unwrap();

    let addr = listen(&a).await;
    connect_to_peer(b.clone(), &addr).await.unwrap();

    assert!(wait_until(|| b.engine().height() == 2).await);
    assert_eq!(b.engine().chain(), a.engine().chain());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocks_and_transactions_are_gossiped() {
    let a = node();
    let b = node();
    let addr = listen(&a).await;
    connect_to_peer(b.clone(), &addr).await.unwrap();
    assert!(wait_until(|| a.peers().peer_count() == 1 && b.peers().peer_count() == 1).await);

    let block = b.mine().await.unwrap().expect("not interrupted");
    assert!(wait_until(|| a.engine().head() == &block).await);

    let tx = b.send_transaction(a.address(), 15).unwrap();
    assert!(wait_until(|| a.engine().mempool().transactions() == [tx.clone()]).await);

    let block = a.mine().await.unwrap().expect("not interrupted");
    assert!(wait_until(|| b.engine().head() == &block).await);
    assert_eq!(b.engine().balance(a.address()), 65);
    assert!(b.engine().mempool().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnected_peer_is_removed() {
    let a = node();
    let addr = listen(&a).await;

    let stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    assert!(wait_until(|| a.peers().peer_count() == 1).await);

    drop(stream);
    assert!(wait_until(|| a.peers().peer_count() == 0).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_write_drops_peer() {
    let a = node();
    let addr = listen(&a).await;

    let stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    assert!(wait_until(|| a.peers().peer_count() == 1).await);
    let peer = stream.local_addr().unwrap();

    // Too large to frame, so the writer fails while the socket stays open
    let tx = Transaction::coinbase(PrivateKey::generate().address(), 1).unwrap();
    let per_tx = serde_json::to_vec(&tx).unwrap().len();
    let oversized = vec![tx; MAX_MESSAGE_SIZE / per_tx + 1];
    a.peers().send_to(&peer, Message::MempoolResponse(oversized)).unwrap();

    assert!(wait_until(|| a.peers().peer_count() == 0).await);
    assert_eq!(a.peers().broadcast(&Message::RequestLatest), 0);
}
