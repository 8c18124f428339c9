use serde::{Deserialize, Serialize};

/// Configuration for the JSON-RPC client
#[derive(Debug, Clone)]
pub struct EvmClientConfig {
    pub rpc_url: String,
    pub timeout_seconds: u64,
}

impl Default for EvmClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    pub fn new(id: u64, method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope; exactly one of `result`/`error` is set
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub result: Option<T>,
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Parameter object of `eth_getLogs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogsParams {
    pub address: String,
    pub from_block: String,
    pub to_block: String,
    /// Positional topic constraints, `None` matches anything
    pub topics: Vec<Option<String>>,
}

/// A log entry as returned by `eth_getLogs`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    /// Set when the log was dropped by a reorg
    #[serde(default)]
    pub removed: bool,
}

/// Hex quantity as JSON-RPC expects it: `0x` + minimal hex digits
pub fn to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}
