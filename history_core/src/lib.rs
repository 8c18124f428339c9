pub mod address;
pub mod amount;
pub mod assembler;
pub mod assets;
pub mod filter;
pub mod scanner;
pub mod source;
pub mod view;

pub use address::{Address, ParseAddressError};
pub use amount::{format_units, parse_units, AmountFormatter};
pub use assembler::{AssemblerOptions, HistoryAssembler};
pub use assets::{AssetEntry, AssetRegistry};
pub use filter::{AccountMatch, EventField, EventFilter};
pub use scanner::{BackwardChunks, ChunkedScanner, ScanObserver, ScanOptions};
pub use source::{LogQuery, LogSource, SourceError};
pub use view::{HistoryRow, HistoryView};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    /// Bad chunk size, duplicate asset and other caller mistakes; never retried
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Log source unavailable ({context}): {source}")]
    SourceUnavailable {
        context: String,
        #[source]
        source: SourceError,
    },
    #[error("Unknown asset: {0}")]
    UnknownAsset(Address),
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Inclusive block span. `start > end` denotes an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of blocks covered, 0 for an empty range
    pub fn span(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Direction of a pool event relative to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `Supply(address indexed reserve, address user, address indexed onBehalfOf,
    /// uint256 amount, uint16 indexed referralCode)`
    Inbound,
    /// `Withdraw(address indexed reserve, address indexed user, address indexed to,
    /// uint256 amount)`
    Outbound,
}

impl EventKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::Inbound => "Supply",
            EventKind::Outbound => "Withdraw",
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::Inbound => "Supply(address,address,address,uint256,uint16)",
            EventKind::Outbound => "Withdraw(address,address,address,uint256)",
        }
    }

    /// keccak256 of [`EventKind::signature`], i.e. topic0 of the log
    pub fn topic0(&self) -> &'static str {
        match self {
            EventKind::Inbound => {
                "0x2b627736bca15cd5381dcf80b0bf11fd197d01a037c52b927a881a10fb73ba61"
            }
            EventKind::Outbound => {
                "0x3115d1449a7b732c986cba18244e897a450f61e1bb8d589cd2e69e6c8924f9f7"
            }
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// One decoded pool event as delivered by a [`LogSource`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    pub block_number: u64,

    /// Position of the transaction inside its block, used as tie-break
    pub transaction_index: u32,

    pub log_index: u32,
    pub transaction_hash: Option<String>,

    /// Reserve token the amount is denominated in
    pub asset: Address,

    /// `onBehalfOf` for Supply, `user` for Withdraw
    pub account: Address,

    /// `user` for Supply, `to` for Withdraw
    pub counterparty: Option<Address>,

    /// Raw uint256 token amount
    pub amount: BigUint,
}

impl RawEvent {
    /// Chronological sort key
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.transaction_index)
    }
}

/// Most recent inbound and outbound events of one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResult {
    /// Ascending by (block_number, transaction_index)
    pub inbound: Vec<RawEvent>,
    /// Ascending by (block_number, transaction_index)
    pub outbound: Vec<RawEvent>,
}

impl HistoryResult {
    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    pub fn events(&self, kind: EventKind) -> &[RawEvent] {
        match kind {
            EventKind::Inbound => &self.inbound,
            EventKind::Outbound => &self.outbound,
        }
    }
}
