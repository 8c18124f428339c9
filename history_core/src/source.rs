use crate::{Address, BlockRange, EventField, EventKind, RawEvent};
use async_trait::async_trait;
use retry_utils::{RetryClass, Retryable};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call against a [`LogSource`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

/// JSON-RPC codes that nodes and hosted providers use for throttling
const RATE_LIMIT_CODES: [i64; 2] = [-32005, 429];

/// `-32005` also signals an oversized `eth_getLogs` result, which no retry can fix
fn is_result_cap(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("more than") && message.contains("results")
}

impl Retryable for SourceError {
    fn retry_class(&self) -> RetryClass {
        match self {
            SourceError::RateLimited => RetryClass::RateLimit,
            SourceError::Rpc { code: -32005, message } if is_result_cap(message) => {
                RetryClass::Fatal
            }
            SourceError::Rpc { code, .. } if RATE_LIMIT_CODES.contains(code) => {
                RetryClass::RateLimit
            }
            // -32000 is the catch-all "server error" of most node clients
            SourceError::Rpc { code: -32000, .. } => RetryClass::Transient,
            SourceError::Transport(_) => RetryClass::Transient,
            SourceError::Timeout(_) => RetryClass::Timeout,
            SourceError::Rpc { .. } | SourceError::Decode(_) => RetryClass::Fatal,
        }
    }
}

/// One bounded log query. Only constraints the source applies natively are
/// carried here; everything else is the caller's post-filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Contract emitting the events
    pub contract: Address,
    pub kind: EventKind,
    /// Indexed fields pinned to a value
    pub constraints: BTreeMap<EventField, Address>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQuery {
    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.from_block, self.to_block)
    }
}

/// Remote append-only event log that answers bounded range queries.
///
/// Implementations must be safe for concurrent read-only use; the assembler
/// runs the inbound and outbound scans against the same instance.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Decoded events of `query.kind` emitted by `query.contract` inside
    /// `[from_block, to_block]` and matching `query.constraints`
    async fn query_logs(&self, query: &LogQuery) -> std::result::Result<Vec<RawEvent>, SourceError>;

    /// Current chain head block number
    async fn chain_head(&self) -> std::result::Result<u64, SourceError>;
}

#[async_trait]
impl<T: LogSource + ?Sized> LogSource for Arc<T> {
    async fn query_logs(&self, query: &LogQuery) -> std::result::Result<Vec<RawEvent>, SourceError> {
        (**self).query_logs(query).await
    }

    async fn chain_head(&self) -> std::result::Result<u64, SourceError> {
        (**self).chain_head().await
    }
}
