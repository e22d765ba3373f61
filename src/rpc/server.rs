//! HTTP admin server
//!
//! Axum router over the node handle.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::methods;
use crate::node::Node;

/// Build the admin API router
pub fn create_router(node: Node) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/blocks", get(methods::get_blocks).post(methods::mine_block))
        .route("/blocks/:hash", get(methods::get_block))
        .route("/peers", post(methods::add_peer))
        .route("/me/balance", get(methods::get_my_balance))
        .route("/me/address", get(methods::get_my_address))
        .route(
            "/transactions",
            get(methods::get_transactions).post(methods::send_transaction),
        )
        .route("/address/:address", get(methods::get_address_balance))
        .layer(cors)
        .with_state(node)
}

/// Serve the admin API on `port` until the server fails
pub async fn start_rpc_server(node: Node, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, create_router(node)).await
}
