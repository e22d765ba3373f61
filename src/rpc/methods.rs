//! HTTP API handlers
//!
//! Each handler maps one route onto a node operation. Validation failures
//! come back with the specific error message.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::consensus::Block;
use crate::crypto::{Address, Hash};
use crate::node::{Node, NodeError};
use crate::p2p::connect_to_peer;
use crate::validation::Transaction;

/// Error body returned by every failing handler
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub error: String,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

impl From<NodeError> for (StatusCode, Json<ApiError>) {
    fn from(e: NodeError) -> Self {
        let status = match &e {
            NodeError::Wallet(_) | NodeError::Mempool(_) => StatusCode::BAD_REQUEST,
            NodeError::Chain(_) => StatusCode::CONFLICT,
            NodeError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, e)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPeerResponse {
    pub peer: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub address: Address,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressResponse {
    pub address: Address,
}

/// GET /blocks - Full canonical chain
pub async fn get_blocks(State(node): State<Node>) -> Json<Vec<Block>> {
    Json(node.engine().chain().to_vec())
}

/// POST /blocks - Mine one block paying the node wallet
pub async fn mine_block(State(node): State<Node>) -> ApiResult<Block> {
    match node.mine().await? {
        Some(block) => Ok(Json(block)),
        None => Err(api_error(
            StatusCode::CONFLICT,
            "Mining interrupted by a new chain head",
        )),
    }
}

/// GET /blocks/:hash - Block lookup
pub async fn get_block(State(node): State<Node>, Path(hash): Path<String>) -> ApiResult<Block> {
    let hash = Hash::from_hex(&hash)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid block hash: {}", e)))?;

    node.engine()
        .block_by_hash(&hash)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Block {} not found", hash)))
}

/// POST /peers - Connect to a peer
pub async fn add_peer(
    State(node): State<Node>,
    Json(request): Json<AddPeerRequest>,
) -> ApiResult<AddPeerResponse> {
    let addr = connect_to_peer(node, &request.peer)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;

    Ok(Json(AddPeerResponse {
        peer: addr.to_string(),
    }))
}

/// GET /me/balance - Balance of the node wallet
pub async fn get_my_balance(State(node): State<Node>) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        address: node.address().clone(),
        balance: node.balance(),
    })
}

/// GET /me/address - Address of the node wallet
pub async fn get_my_address(State(node): State<Node>) -> Json<AddressResponse> {
    Json(AddressResponse {
        address: node.address().clone(),
    })
}

/// GET /transactions - Pending transactions
pub async fn get_transactions(State(node): State<Node>) -> Json<Vec<Transaction>> {
    Json(node.engine().mempool().transactions().to_vec())
}

/// POST /transactions - Pay from the node wallet
pub async fn send_transaction(
    State(node): State<Node>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Transaction> {
    let tx = node.send_transaction(&request.address, request.amount)?;
    Ok(Json(tx))
}

/// GET /address/:address - Balance of any address
pub async fn get_address_balance(
    State(node): State<Node>,
    Path(address): Path<String>,
) -> ApiResult<BalanceResponse> {
    let address = Address::new(address);
    if !address.is_well_formed() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid address: {}", address.as_str()),
        ));
    }

    let balance = node.engine().balance(&address);
    Ok(Json(BalanceResponse { address, balance }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::p2p::PeerManager;
    use crate::wallet::Wallet;
    use std::sync::Arc;

    fn node() -> Node {
        Node::new(Wallet::generate(), Arc::new(PeerManager::default())).unwrap()
    }

    #[tokio::test]
    async fn test_mine_and_list_blocks() {
        let node = node();

        let Json(block) = mine_block(State(node.clone())).await.unwrap();
        let Json(chain) = get_blocks(State(node.clone())).await;

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], block);

        let Json(found) = get_block(State(node.clone()), Path(block.hash.to_hex())).await.unwrap();
        assert_eq!(found, block);
    }

    #[tokio::test]
    async fn test_block_lookup_errors() {
        let node = node();

        let (status, _) = get_block(State(node.clone()), Path("zz".into())).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = Hash::from_bytes([7u8; 32]).to_hex();
        let (status, _) = get_block(State(node), Path(missing)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_surfaces_validation_error() {
        let node = node();
        let request = SendRequest {
            address: PrivateKey::generate().address(),
            amount: 10,
        };

        let (status, Json(body)) = send_transaction(State(node), Json(request)).await.unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Insufficient funds: have 0, need 10");
    }

    #[tokio::test]
    async fn test_send_and_balances() {
        let node = node();
        let receiver = PrivateKey::generate().address();
        mine_block(State(node.clone())).await.unwrap();

        let request = SendRequest {
            address: receiver.clone(),
            amount: 20,
        };
        let Json(tx) = send_transaction(State(node.clone()), Json(request)).await.unwrap();
        let Json(pool) = get_transactions(State(node.clone())).await;
        assert_eq!(pool, vec![tx]);

        mine_block(State(node.clone())).await.unwrap();

        let Json(mine) = get_my_balance(State(node.clone())).await;
        assert_eq!(mine.balance, 80);

        let Json(theirs) = get_address_balance(State(node.clone()), Path(receiver.as_str().to_string()))
            .await
            .unwrap();
        assert_eq!(theirs, BalanceResponse { address: receiver, balance: 20 });

        let Json(me) = get_my_address(State(node.clone())).await;
        assert_eq!(&me.address, node.address());
    }

    #[tokio::test]
    async fn test_bad_address_query() {
        let (status, _) = get_address_balance(State(node()), Path("04beef".into()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
