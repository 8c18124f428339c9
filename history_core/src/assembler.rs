use crate::{
    Address, BlockRange, ChunkedScanner, EventFilter, EventKind, HistoryError, HistoryResult,
    LogSource, RawEvent, Result, ScanObserver, ScanOptions,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub scan: ScanOptions,
    /// Matches after which each scan stops walking backward
    pub target_count: usize,
    /// Most recent events kept per kind
    pub display_limit: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            target_count: 5,
            display_limit: 5,
        }
    }
}

/// Builds the recent Supply/Withdraw history of one account
pub struct HistoryAssembler {
    source: Arc<dyn LogSource>,
    pool: Address,
    deployment_block: u64,
    options: AssemblerOptions,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl HistoryAssembler {
    pub fn new(
        source: Arc<dyn LogSource>,
        pool: Address,
        deployment_block: u64,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            source,
            pool,
            deployment_block,
            options,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn deployment_block(&self) -> u64 {
        self.deployment_block
    }

    /// Scan from the pool deployment block up to the current chain head
    pub async fn assemble_to_head(&self, account: &str) -> Result<HistoryResult> {
        let account = parse_account(account)?;
        let head = self
            .source
            .chain_head()
            .await
            .map_err(|source| HistoryError::SourceUnavailable {
                context: "chain head".to_string(),
                source,
            })?;

        info!("🔗 Chain head at block {}", head);
        self.assemble_for(account, BlockRange::new(self.deployment_block, head))
            .await
    }

    /// Most recent inbound and outbound events of `account` inside `range`
    pub async fn assemble(&self, account: &str, range: BlockRange) -> Result<HistoryResult> {
        let account = parse_account(account)?;
        self.assemble_for(account, range).await
    }

    async fn assemble_for(&self, account: Address, range: BlockRange) -> Result<HistoryResult> {
        info!(
            "🔍 Building history for {} over blocks {} (pool {})",
            account, range, self.pool
        );

        let inbound_filter = EventFilter::for_account(EventKind::Inbound, account);
        let outbound_filter = EventFilter::for_account(EventKind::Outbound, account);

        let mut scanner = ChunkedScanner::new(
            self.source.as_ref(),
            self.pool,
            self.options.scan.clone(),
        );
        if let Some(observer) = &self.observer {
            scanner = scanner.with_observer(Arc::clone(observer));
        }

        // Independent result sets; each scan keeps its own chunk order
        let (inbound, outbound) = tokio::try_join!(
            scanner.scan(&inbound_filter, range, self.options.target_count),
            scanner.scan(&outbound_filter, range, self.options.target_count),
        )?;

        let result = HistoryResult {
            inbound: most_recent(inbound, self.options.display_limit),
            outbound: most_recent(outbound, self.options.display_limit),
        };

        info!(
            "📊 History for {}: {} supply, {} withdraw",
            account,
            result.inbound.len(),
            result.outbound.len()
        );

        Ok(result)
    }
}

fn parse_account(account: &str) -> Result<Address> {
    account.parse().map_err(|e| {
        warn!("Rejected account '{}': {}", account, e);
        HistoryError::InvalidAccount(format!("'{}': {}", account, e))
    })
}

/// Sort ascending by (block, tx index) and keep the last `limit` entries
fn most_recent(mut events: Vec<RawEvent>, limit: usize) -> Vec<RawEvent> {
    events.sort_by_key(RawEvent::position);
    if events.len() > limit {
        events.drain(..events.len() - limit);
    }
    events
}
