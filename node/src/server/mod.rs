pub mod rpc;

pub use rpc::{JsonRpcRequest, JsonRpcResponse, dispatch};

use crate::NodeHandle;
use std::net::SocketAddr;
use warp::{Filter, Reply};

const MAX_BODY_BYTES: u64 = 64 * 1024;

async fn handle_rpc(
    request: JsonRpcRequest,
    node: NodeHandle,
) -> Result<impl Reply, warp::Rejection> {
    let response = dispatch(request, node).await;
    Ok(warp::reply::json(&response))
}

/// POST JSON-RPC at `/` and at the legacy `/blockchain` path.
pub fn rpc_routes(
    node: NodeHandle,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let node_filter = warp::any().map(move || node.clone());

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["Content-Type", "Authorization"]);

    let root = warp::path::end();
    let legacy = warp::path("blockchain").and(warp::path::end());

    warp::post()
        .and(root.or(legacy).unify())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(node_filter)
        .and_then(handle_rpc)
        .with(cors)
        .with(warp::log("wchain::rpc"))
}

pub async fn run_rpc_server(node: NodeHandle, addr: SocketAddr) {
    log::info!("JSON-RPC server running at http://{}", addr);
    log::info!("   Chain ID: {} (0x{:x})", node.chain_id, node.chain_id);
    log::info!("   CORS enabled for browser access");

    warp::serve(rpc_routes(node)).run(addr).await;
}
