use crate::{
    error::EvmClientError,
    parser::{build_get_logs_params, decode_log, parse_quantity},
    types::{EvmClientConfig, JsonRpcRequest, JsonRpcResponse, RpcLog},
};
use async_trait::async_trait;
use history_core::{LogQuery, LogSource, RawEvent, SourceError};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

/// JSON-RPC client serving pool logs over HTTP
#[derive(Debug)]
pub struct EvmLogClient {
    client: Client,
    config: EvmClientConfig,
    next_id: AtomicU64,
}

impl EvmLogClient {
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, EvmClientError> {
        Self::with_config(EvmClientConfig {
            rpc_url: rpc_url.into(),
            ..EvmClientConfig::default()
        })
    }

    pub fn with_config(config: EvmClientConfig) -> Result<Self, EvmClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    fn http_error(&self, error: reqwest::Error) -> EvmClientError {
        if error.is_timeout() {
            EvmClientError::Timeout(Duration::from_secs(self.config.timeout_seconds))
        } else {
            EvmClientError::HttpError(error)
        }
    }

    async fn call<P, T>(&self, method: &'static str, params: P) -> Result<T, EvmClientError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let start_time = std::time::Instant::now();
        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.http_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ {} failed - Status: {}, Body: {}", method, status, body);

            return Err(match status.as_u16() {
                429 => EvmClientError::RateLimit,
                code => EvmClientError::HttpStatus { status: code, body },
            });
        }

        let text = response.text().await.map_err(|e| self.http_error(e))?;
        debug!(
            "📨 {} answered in {}ms ({} bytes)",
            method,
            start_time.elapsed().as_millis(),
            text.len()
        );

        let envelope: JsonRpcResponse<T> = serde_json::from_str(&text).map_err(|e| {
            let sample: String = text.chars().take(500).collect();
            error!("❌ Failed to parse {} response: {} - sample: {}", method, e, sample);
            EvmClientError::JsonError(e)
        })?;

        if let Some(rpc_error) = envelope.error {
            warn!("⚠️ {} returned RPC error {}: {}", method, rpc_error.code, rpc_error.message);
            return Err(EvmClientError::RpcError {
                code: rpc_error.code,
                message: rpc_error.message,
            });
        }

        envelope.result.ok_or_else(|| EvmClientError::ParseError {
            message: format!("{} response has neither result nor error", method),
        })
    }

    /// `eth_getLogs` for one bounded query, decoded
    pub async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawEvent>, EvmClientError> {
        let params = build_get_logs_params(query);
        let logs: Vec<RpcLog> = self.call("eth_getLogs", [params]).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|log| !log.removed) {
            events.push(decode_log(query.kind, log)?);
        }

        debug!(
            "🔍 {} logs {}-{}: {} received, {} decoded",
            query.kind,
            query.from_block,
            query.to_block,
            logs.len(),
            events.len()
        );

        Ok(events)
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> Result<u64, EvmClientError> {
        let head: String = self.call("eth_blockNumber", [(); 0]).await?;
        parse_quantity(&head)
    }
}

#[async_trait]
impl LogSource for EvmLogClient {
    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<RawEvent>, SourceError> {
        Ok(self.get_logs(query).await?)
    }

    async fn chain_head(&self) -> Result<u64, SourceError> {
        Ok(self.block_number().await?)
    }
}
