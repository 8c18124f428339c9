use history_core::SourceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvmClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {message}")]
    ParseError { message: String },
}

impl From<EvmClientError> for SourceError {
    fn from(error: EvmClientError) -> Self {
        match error {
            EvmClientError::Timeout(limit) => SourceError::Timeout(limit),
            EvmClientError::HttpError(e) => SourceError::Transport(e.to_string()),
            EvmClientError::HttpStatus { status: 429, .. } | EvmClientError::RateLimit => {
                SourceError::RateLimited
            }
            EvmClientError::HttpStatus { status, body } if status >= 500 => {
                SourceError::Transport(format!("HTTP {}: {}", status, body))
            }
            EvmClientError::HttpStatus { status, body } => SourceError::Rpc {
                code: i64::from(status),
                message: body,
            },
            EvmClientError::RpcError { code, message } => SourceError::Rpc { code, message },
            EvmClientError::JsonError(e) => SourceError::Decode(e.to_string()),
            EvmClientError::ParseError { message } => SourceError::Decode(message),
        }
    }
}
