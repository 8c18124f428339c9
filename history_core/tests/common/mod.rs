#![allow(dead_code)]

use async_trait::async_trait;
use history_core::{Address, EventKind, LogQuery, LogSource, RawEvent, SourceError};
use num_bigint::BigUint;
use std::collections::HashSet;
use std::sync::Mutex;

pub const POOL: &str = "0xE039BdF1d874d27338e09B55CB09879Dedca52D8";
pub const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const OTHER: &str = "0x2222222222222222222222222222222222222222";
pub const USDC: &str = "0xb18d016cDD2d9439A19f15633005A6b2cd6Aa774";

pub fn address(text: &str) -> Address {
    text.parse().unwrap()
}

pub fn supply(block_number: u64, transaction_index: u32, on_behalf_of: &str) -> RawEvent {
    RawEvent {
        kind: EventKind::Inbound,
        block_number,
        transaction_index,
        log_index: 0,
        transaction_hash: Some(format!("0x{:064x}", block_number)),
        asset: address(USDC),
        account: address(on_behalf_of),
        counterparty: Some(address(on_behalf_of)),
        amount: BigUint::from(1_500_000u64),
    }
}

pub fn withdraw(block_number: u64, transaction_index: u32, user: &str) -> RawEvent {
    RawEvent {
        kind: EventKind::Outbound,
        block_number,
        transaction_index,
        log_index: 0,
        transaction_hash: Some(format!("0x{:064x}", block_number)),
        asset: address(USDC),
        account: address(user),
        counterparty: Some(address(user)),
        amount: BigUint::from(2_000_000u64),
    }
}

/// In-memory stand-in for a node: applies kind, range and topic constraints
/// the way eth_getLogs would and records every query it receives.
pub struct MockLogSource {
    events: Vec<RawEvent>,
    head: u64,
    max_span: Option<u64>,
    failing_calls: HashSet<usize>,
    fail_from_call: Option<usize>,
    failure: SourceError,
    queries: Mutex<Vec<LogQuery>>,
}

impl MockLogSource {
    pub fn new(events: Vec<RawEvent>, head: u64) -> Self {
        Self {
            events,
            head,
            max_span: None,
            failing_calls: HashSet::new(),
            fail_from_call: None,
            failure: SourceError::Transport("connection reset by peer".to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Reject queries wider than `span` blocks like a hosted provider does
    pub fn with_max_span(mut self, span: u64) -> Self {
        self.max_span = Some(span);
        self
    }

    /// Fail only the `call`-th query (1-based)
    pub fn fail_once_at(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Fail every query from the `call`-th on (1-based)
    pub fn fail_from(mut self, call: usize) -> Self {
        self.fail_from_call = Some(call);
        self
    }

    pub fn with_failure(mut self, failure: SourceError) -> Self {
        self.failure = failure;
        self
    }

    pub fn queries(&self) -> Vec<LogQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn queries_for(&self, kind: EventKind) -> Vec<(u64, u64)> {
        self.queries()
            .into_iter()
            .filter(|q| q.kind == kind)
            .map(|q| (q.from_block, q.to_block))
            .collect()
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn query_logs(&self, query: &LogQuery) -> Result<Vec<RawEvent>, SourceError> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.clone());
            queries.len()
        };

        if self.failing_calls.contains(&call)
            || self.fail_from_call.is_some_and(|from| call >= from)
        {
            return Err(self.failure.clone());
        }

        if let Some(max) = self.max_span {
            if query.range().span() > max {
                return Err(SourceError::Rpc {
                    code: -32602,
                    message: format!("block range exceeds {}", max),
                });
            }
        }

        Ok(self
            .events
            .iter()
            .filter(|e| e.kind == query.kind)
            .filter(|e| query.range().contains(e.block_number))
            .filter(|e| {
                query
                    .constraints
                    .iter()
                    .all(|(field, value)| e.field(*field) == Some(*value))
            })
            .cloned()
            .collect())
    }

    async fn chain_head(&self) -> Result<u64, SourceError> {
        Ok(self.head)
    }
}
