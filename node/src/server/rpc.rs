//! JSON-RPC method dispatch over the ledger service.
use crate::NodeHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use wchain_core::config::{GAS_ESTIMATE_QUOTE, GAS_PRICE_QUOTE, MAX_WALLETS_PER_REQUEST};
use wchain_core::{Address, Balance, LedgerError, LedgerService};

const INVALID_PARAMS: i32 = -32602;
const METHOD_NOT_FOUND: i32 = -32601;
const INTERNAL_ERROR: i32 = -32603;
const SERVER_ERROR: i32 = -32000;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String, data: Option<Value>) -> Self {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data,
            }),
        }
    }
}

/// Why a method call failed, before it is shaped into a JSON-RPC error.
#[derive(Debug)]
enum RpcFailure {
    InvalidParams(String),
    Ledger(LedgerError),
    Internal(String),
}

impl From<LedgerError> for RpcFailure {
    fn from(err: LedgerError) -> Self {
        RpcFailure::Ledger(err)
    }
}

type MethodResult = Result<Value, RpcFailure>;

fn error_code(err: &LedgerError) -> i32 {
    match err {
        LedgerError::UnknownAddress(_) | LedgerError::InvalidAmount(_) => INVALID_PARAMS,
        LedgerError::InsufficientFunds { .. }
        | LedgerError::BalanceOverflow(_)
        | LedgerError::NotFound { .. }
        | LedgerError::MiningCancelled { .. } => SERVER_ERROR,
        LedgerError::ChainLinkage(_)
        | LedgerError::InvalidBlock { .. }
        | LedgerError::Persistence(_) => INTERNAL_ERROR,
    }
}

fn failure_response(id: Value, method: &str, failure: RpcFailure) -> JsonRpcResponse {
    match failure {
        RpcFailure::InvalidParams(message) => {
            JsonRpcResponse::error(id, INVALID_PARAMS, message, None)
        }
        RpcFailure::Ledger(err) => {
            log::warn!("RPC {} failed: {}", method, err);
            JsonRpcResponse::error(
                id,
                error_code(&err),
                err.to_string(),
                Some(json!({ "kind": err.kind() })),
            )
        }
        RpcFailure::Internal(message) => {
            log::error!("RPC {} internal error: {}", method, message);
            JsonRpcResponse::error(id, INTERNAL_ERROR, message, None)
        }
    }
}

/// Run one request against the node and build its response.
pub async fn dispatch(request: JsonRpcRequest, node: NodeHandle) -> JsonRpcResponse {
    log::info!("RPC method called: {}", request.method);

    let params = request.params.unwrap_or_default();
    let outcome = match request.method.as_str() {
        // Chain information
        "wcn_chainId" => Ok(json!(format!("0x{:x}", node.chain_id))),
        "net_version" => Ok(json!(node.chain_id.to_string())),
        "wcn_blockNumber" => Ok(hex_quantity(node.service.chain_height())),
        "wcn_getBlockByNumber" => get_block_by_number(&params, &node),

        // Accounts
        "wcn_getBalance" => get_balance(&params, &node),
        "wcn_getTransactionCount" => get_transaction_count(&params, &node),
        "addWallets" => add_wallets(&params, &node).await,
        "addBalance" => add_balance(&params, &node).await,
        "info" => list_wallets(&node),

        // Transactions and mining
        "wcn_sendTransaction" => send_transaction(&params, &node).await,
        "wcn_mineBlock" => mine_block(&node).await,

        // Gas quotes
        "wcn_gasPrice" => Ok(hex_quantity(GAS_PRICE_QUOTE)),
        "wcn_estimateGas" => Ok(hex_quantity(GAS_ESTIMATE_QUOTE)),

        _ => {
            return JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method '{}' not found", request.method),
                None,
            );
        }
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(failure) => failure_response(request.id, &request.method, failure),
    }
}

fn hex_quantity(value: u64) -> Value {
    json!(format!("0x{:x}", value))
}

fn param(params: &[Value], index: usize) -> Result<&Value, RpcFailure> {
    params
        .get(index)
        .ok_or_else(|| RpcFailure::InvalidParams(format!("missing parameter #{}", index)))
}

fn address_param(value: &Value) -> Result<Address, RpcFailure> {
    let raw = value
        .as_str()
        .ok_or_else(|| RpcFailure::InvalidParams("address must be a string".to_string()))?;
    Ok(raw.parse::<Address>()?)
}

/// Amount as a JSON integer, a decimal string or a `0x` hex string.
fn amount_param(value: &Value) -> Result<Balance, RpcFailure> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(Balance::from)
            .ok_or_else(|| LedgerError::InvalidAmount(n.to_string()).into()),
        Value::String(s) => Ok(Balance::parse_amount(s)?),
        other => Err(LedgerError::InvalidAmount(other.to_string()).into()),
    }
}

fn count_param(value: &Value) -> Result<usize, RpcFailure> {
    let count = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count
        .and_then(|c| usize::try_from(c).ok())
        .filter(|c| *c <= MAX_WALLETS_PER_REQUEST)
        .ok_or_else(|| {
            RpcFailure::InvalidParams(format!(
                "invalid wallet count: {} (expected 0..={})",
                value, MAX_WALLETS_PER_REQUEST
            ))
        })
}

/// Run a locking, persisting ledger call on the blocking pool.
async fn blocking<T, F>(node: &NodeHandle, op: F) -> Result<T, RpcFailure>
where
    F: FnOnce(&LedgerService) -> wchain_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let node = node.clone();
    tokio::task::spawn_blocking(move || op(&node.service))
        .await
        .map_err(|e| RpcFailure::Internal(format!("ledger task failed: {}", e)))?
        .map_err(RpcFailure::from)
}

/// Block selector: hex index, plain integer, `"latest"` or `"earliest"`.
fn block_number_param(value: &Value, node: &NodeHandle) -> Result<u64, RpcFailure> {
    let invalid = || RpcFailure::InvalidParams(format!("invalid block number: {}", value));
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(invalid),
        Value::String(s) => match s.as_str() {
            "latest" => Ok(node.service.chain_height().saturating_sub(1)),
            "earliest" => Ok(0),
            hex => {
                let digits = hex.strip_prefix("0x").ok_or_else(invalid)?;
                u64::from_str_radix(digits, 16).map_err(|_| invalid())
            }
        },
        _ => Err(invalid()),
    }
}

fn get_balance(params: &[Value], node: &NodeHandle) -> MethodResult {
    let address = address_param(param(params, 0)?)?;
    let balance = node.service.get_balance(&address)?;
    Ok(json!(balance.to_hex_string()))
}

fn get_transaction_count(params: &[Value], node: &NodeHandle) -> MethodResult {
    let address = address_param(param(params, 0)?)?;
    node.service.get_balance(&address)?;
    Ok(hex_quantity(node.service.transaction_count(&address) as u64))
}

fn get_block_by_number(params: &[Value], node: &NodeHandle) -> MethodResult {
    let index = block_number_param(param(params, 0)?, node)?;
    let block = node.service.get_block_by_index(index)?;
    serde_json::to_value(block).map_err(|e| RpcFailure::Internal(e.to_string()))
}

async fn add_wallets(params: &[Value], node: &NodeHandle) -> MethodResult {
    let count = count_param(param(params, 0)?)?;
    let created = blocking(node, move |service| service.seed_wallets(count)).await?;
    Ok(json!(created.len()))
}

async fn add_balance(params: &[Value], node: &NodeHandle) -> MethodResult {
    let address = address_param(param(params, 0)?)?;
    let amount = amount_param(param(params, 1)?)?;
    blocking(node, move |service| service.add_balance(&address, amount)).await?;
    Ok(json!("Balance added successfully"))
}

fn list_wallets(node: &NodeHandle) -> MethodResult {
    serde_json::to_value(node.service.list_wallets())
        .map_err(|e| RpcFailure::Internal(e.to_string()))
}

async fn send_transaction(params: &[Value], node: &NodeHandle) -> MethodResult {
    let tx = param(params, 0)?;
    let field = |name: &str| {
        tx.get(name)
            .ok_or_else(|| RpcFailure::InvalidParams(format!("transaction is missing '{}'", name)))
    };
    let from = address_param(field("from")?)?;
    let to = address_param(field("to")?)?;
    let value = amount_param(field("value")?)?;

    blocking(node, move |service| service.send_transaction(&from, &to, value)).await?;
    Ok(json!("Transaction successful"))
}

/// Raises the flag when dropped, so an abandoned request stops its miner.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

async fn mine_block(node: &NodeHandle) -> MethodResult {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(cancel_flag.clone());

    let mut worker = {
        let node = node.clone();
        let cancel_flag = cancel_flag.clone();
        tokio::task::spawn_blocking(move || node.service.mine_block(&cancel_flag))
    };

    let joined = match tokio::time::timeout(node.mining_timeout, &mut worker).await {
        Ok(joined) => joined,
        Err(_) => {
            log::warn!(
                "Mining exceeded {:?}, cancelling the search",
                node.mining_timeout
            );
            cancel_flag.store(true, Ordering::SeqCst);
            worker.await
        }
    };

    let block = joined.map_err(|e| RpcFailure::Internal(format!("mining task failed: {}", e)))??;
    serde_json::to_value(block).map_err(|e| RpcFailure::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeState;
    use std::time::Duration;
    use tempfile::TempDir;
    use wchain_core::{LedgerService, LedgerSettings, Secp256k1KeyGenerator};

    fn node(dir: &TempDir, difficulty: u32, mining_timeout: Duration) -> NodeHandle {
        let service = LedgerService::open(
            dir.path(),
            LedgerSettings {
                difficulty,
                max_mining_attempts: None,
            },
            Box::new(Secp256k1KeyGenerator),
        )
        .unwrap();
        Arc::new(NodeState {
            service,
            chain_id: 14006,
            mining_timeout,
        })
    }

    async fn call(node: &NodeHandle, method: &str, params: Value) -> JsonRpcResponse {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .unwrap();
        dispatch(request, node.clone()).await
    }

    fn error_kind(response: &JsonRpcResponse) -> &str {
        response.error.as_ref().unwrap().data.as_ref().unwrap()["kind"]
            .as_str()
            .unwrap()
    }

    async fn seeded_pair(node: &NodeHandle) -> (String, String) {
        let created = call(node, "addWallets", json!([2])).await;
        assert_eq!(created.result, Some(json!(2)));
        let info = call(node, "info", json!([])).await.result.unwrap();
        let addr = |i: usize| info[i]["address"].as_str().unwrap().to_string();
        (addr(0), addr(1))
    }

    #[tokio::test]
    async fn transfer_and_mine_over_rpc() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, 1, Duration::from_secs(30));
        let (a, b) = seeded_pair(&node).await;

        let credited = call(&node, "addBalance", json!([a, 100])).await;
        assert!(credited.error.is_none());

        let sent = call(
            &node,
            "wcn_sendTransaction",
            json!([{ "from": a, "to": b, "value": "0x28" }]),
        )
        .await;
        assert_eq!(sent.result, Some(json!("Transaction successful")));

        let balance = call(&node, "wcn_getBalance", json!([a])).await;
        assert_eq!(balance.result, Some(json!("0x3c")));

        let mined = call(&node, "wcn_mineBlock", json!([])).await.result.unwrap();
        assert_eq!(mined["index"], json!(1));
        assert_eq!(mined["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(mined["transactions"][0]["value"], json!("Wb28"));

        let height = call(&node, "wcn_blockNumber", json!([])).await;
        assert_eq!(height.result, Some(json!("0x2")));

        let latest = call(&node, "wcn_getBlockByNumber", json!(["latest"])).await;
        assert_eq!(latest.result.unwrap()["hash"], mined["hash"]);

        let count = call(&node, "wcn_getTransactionCount", json!([a])).await;
        assert_eq!(count.result, Some(json!("0x1")));
    }

    #[tokio::test]
    async fn ledger_errors_carry_their_kind() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, 1, Duration::from_secs(30));
        let (a, b) = seeded_pair(&node).await;
        call(&node, "addBalance", json!([a, "10"])).await;

        let overdraft = call(
            &node,
            "wcn_sendTransaction",
            json!([{ "from": a, "to": b, "value": 50 }]),
        )
        .await;
        assert_eq!(overdraft.error.as_ref().unwrap().code, SERVER_ERROR);
        assert_eq!(error_kind(&overdraft), "InsufficientFunds");

        let negative = call(&node, "addBalance", json!([a, "-5"])).await;
        assert_eq!(error_kind(&negative), "InvalidAmount");

        let unknown = call(&node, "wcn_getBalance", json!(["Wa1234"])).await;
        assert_eq!(unknown.error.as_ref().unwrap().code, INVALID_PARAMS);
        assert_eq!(error_kind(&unknown), "UnknownAddress");

        let missing = call(&node, "wcn_getBlockByNumber", json!(["0x1"])).await;
        assert_eq!(error_kind(&missing), "NotFound");

        let balance = call(&node, "wcn_getBalance", json!([a])).await;
        assert_eq!(balance.result, Some(json!("0xa")));
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, 1, Duration::from_secs(30));

        let unknown = call(&node, "eth_sendRawTransaction", json!([])).await;
        assert_eq!(unknown.error.unwrap().code, METHOD_NOT_FOUND);

        let no_params = call(&node, "wcn_getBalance", json!([])).await;
        assert_eq!(no_params.error.unwrap().code, INVALID_PARAMS);

        let bad_block = call(&node, "wcn_getBlockByNumber", json!(["pending"])).await;
        assert_eq!(bad_block.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn constant_quotes() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, 1, Duration::from_secs(30));

        assert_eq!(call(&node, "wcn_chainId", json!([])).await.result, Some(json!("0x36b6")));
        assert_eq!(call(&node, "net_version", json!([])).await.result, Some(json!("14006")));
        assert_eq!(
            call(&node, "wcn_gasPrice", json!([])).await.result,
            Some(json!("0x12a05f200"))
        );
        assert_eq!(
            call(&node, "wcn_estimateGas", json!([])).await.result,
            Some(json!("0x5208"))
        );
        let genesis = call(&node, "wcn_getBlockByNumber", json!(["earliest"])).await;
        assert_eq!(genesis.result.unwrap()["index"], json!(0));
    }

    #[tokio::test]
    async fn mining_timeout_cancels_and_requeues() {
        let dir = TempDir::new().unwrap();
        // 64 leading zeros is out of reach, so only the timeout ends the search
        let node = node(&dir, 64, Duration::from_millis(100));
        let (a, b) = seeded_pair(&node).await;
        call(&node, "addBalance", json!([a, 5])).await;
        call(
            &node,
            "wcn_sendTransaction",
            json!([{ "from": a, "to": b, "value": 5 }]),
        )
        .await;

        let mined = call(&node, "wcn_mineBlock", json!([])).await;
        assert_eq!(error_kind(&mined), "MiningCancelled");
        assert_eq!(node.service.pending_count(), 1);
        assert_eq!(node.service.chain_height(), 1);
    }

    #[tokio::test]
    async fn wallet_count_is_capped() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir, 1, Duration::from_secs(30));

        for count in [json!(u64::MAX), json!(1u64 << 40), json!(MAX_WALLETS_PER_REQUEST + 1)] {
            let response = call(&node, "addWallets", json!([count])).await;
            assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
        }
        assert_eq!(node.service.list_wallets().len(), 0);

        let created = call(&node, "addWallets", json!([MAX_WALLETS_PER_REQUEST])).await;
        assert_eq!(created.result, Some(json!(MAX_WALLETS_PER_REQUEST)));
    }
}
