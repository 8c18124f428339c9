use crate::{
    Address, BlockRange, EventFilter, HistoryError, LogQuery, LogSource, RawEvent, Result,
    SourceError,
};
use retry_utils::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

/// Block windows of at most `chunk_size` blocks, newest first.
///
/// The window ending at `h` starts at `max(range.start, h - chunk_size + 1)`;
/// windows are disjoint and together cover the range exactly.
#[derive(Debug, Clone)]
pub struct BackwardChunks {
    start: u64,
    next_end: Option<u64>,
    chunk_size: u64,
}

impl BackwardChunks {
    /// A `chunk_size` of 0 is treated as 1
    pub fn new(range: BlockRange, chunk_size: u64) -> Self {
        Self {
            start: range.start,
            next_end: (!range.is_empty()).then_some(range.end),
            chunk_size,
        }
    }
}

impl Iterator for BackwardChunks {
    type Item = BlockRange;

    fn next(&mut self) -> Option<BlockRange> {
        let end = self.next_end?;
        let start = end
            .saturating_sub(self.chunk_size.saturating_sub(1))
            .max(self.start);

        self.next_end = if start > self.start {
            Some(start - 1)
        } else {
            None
        };

        Some(BlockRange::new(start, end))
    }
}

/// Per-chunk hook for metrics or progress reporting
pub trait ScanObserver: Send + Sync {
    fn on_chunk(&self, chunk: BlockRange, matched: usize, accumulated: usize);
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Widest span a single query may cover
    pub chunk_size: u64,
    /// Deadline per query attempt
    pub query_timeout: Option<Duration>,
    pub retry: RetryConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            query_timeout: Some(Duration::from_secs(20)),
            retry: RetryConfig::default(),
        }
    }
}

/// Walks a block range backward in bounded windows until enough matching
/// events have been collected.
pub struct ChunkedScanner<'a> {
    source: &'a dyn LogSource,
    contract: Address,
    options: ScanOptions,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl<'a> ChunkedScanner<'a> {
    pub fn new(source: &'a dyn LogSource, contract: Address, options: ScanOptions) -> Self {
        Self {
            source,
            contract,
            options,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Collect events matching `filter` inside `range`, newest chunks first.
    ///
    /// Stops before the next chunk once `target_count` matches are held; the
    /// last chunk is always consumed whole, so more may come back. Events are
    /// returned in chunk-arrival order, unsorted. Any chunk that still fails
    /// after retries aborts the scan with [`HistoryError::SourceUnavailable`]
    /// and nothing collected so far is returned.
    pub async fn scan(
        &self,
        filter: &EventFilter,
        range: BlockRange,
        target_count: usize,
    ) -> Result<Vec<RawEvent>> {
        if self.options.chunk_size == 0 {
            return Err(HistoryError::InvalidConfiguration(
                "chunk size must be greater than 0".to_string(),
            ));
        }

        if range.is_empty() {
            debug!("Empty block range {}, nothing to scan", range);
            return Ok(Vec::new());
        }

        let span = info_span!(
            "scan",
            kind = %filter.kind(),
            contract = %self.contract,
            range = %range,
        );

        self.scan_chunks(filter, range, target_count)
            .instrument(span)
            .await
    }

    async fn scan_chunks(
        &self,
        filter: &EventFilter,
        range: BlockRange,
        target_count: usize,
    ) -> Result<Vec<RawEvent>> {
        let post_filter = filter.needs_post_filter();
        let native = filter.native_constraints();
        let mut collected = Vec::new();
        let mut queries = 0u32;

        for chunk in BackwardChunks::new(range, self.options.chunk_size) {
            if collected.len() >= target_count {
                break;
            }

            let query = LogQuery {
                contract: self.contract,
                kind: filter.kind(),
                constraints: native.clone(),
                from_block: chunk.start,
                to_block: chunk.end,
            };

            let events = self.query_chunk(&query).await?;
            queries += 1;

            let returned = events.len();
            let before = collected.len();
            if post_filter {
                collected.extend(events.into_iter().filter(|e| filter.matches_client_side(e)));
            } else {
                collected.extend(events);
            }
            let matched = collected.len() - before;

            debug!(
                "📦 Chunk {}: {} logs, {} matched, {} total",
                chunk,
                returned,
                matched,
                collected.len()
            );
            if let Some(observer) = &self.observer {
                observer.on_chunk(chunk, matched, collected.len());
            }
        }

        info!(
            "✅ {} scan finished: {} events from {} queries",
            filter.kind(),
            collected.len(),
            queries
        );

        Ok(collected)
    }

    async fn query_chunk(&self, query: &LogQuery) -> Result<Vec<RawEvent>> {
        let label = format!("{} logs {}", query.kind, query.range());

        retry_with_backoff(&label, &self.options.retry, move || self.query_once(query))
            .await
            .map_err(|source| HistoryError::SourceUnavailable {
                context: format!("{} query for blocks {}", query.kind, query.range()),
                source,
            })
    }

    async fn query_once(&self, query: &LogQuery) -> std::result::Result<Vec<RawEvent>, SourceError> {
        match self.options.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.source.query_logs(query))
                .await
                .map_err(|_| SourceError::Timeout(limit))?,
            None => self.source.query_logs(query).await,
        }
    }
}
