pub mod client;
pub mod error;
pub mod parser;
pub mod types;

pub use client::EvmLogClient;
pub use error::EvmClientError;
pub use parser::decode_log;
pub use types::*;
