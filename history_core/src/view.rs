//! Hand-off to the presentation layer.

use crate::{AmountFormatter, EventKind, HistoryError, HistoryResult, RawEvent};
use serde::Serialize;
use tracing::warn;

/// State of one retrieval as seen by a renderer.
///
/// `Failed` exists so that an error is never rendered as an empty history.
#[derive(Debug, Clone)]
pub enum HistoryView {
    Loading,
    Ready(HistoryResult),
    Failed(String),
}

impl HistoryView {
    pub fn from_result(result: Result<HistoryResult, HistoryError>) -> Self {
        match result {
            Ok(history) => HistoryView::Ready(history),
            Err(e) => HistoryView::Failed(e.to_string()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, HistoryView::Loading)
    }

    /// Retrieval succeeded and found nothing
    pub fn is_empty_history(&self) -> bool {
        matches!(self, HistoryView::Ready(history) if history.is_empty())
    }

    /// Display rows per section, `None` unless the retrieval finished successfully
    pub fn rows(&self, formatter: &AmountFormatter<'_>) -> Option<Vec<HistoryRow>> {
        match self {
            HistoryView::Ready(history) => Some(
                [EventKind::Inbound, EventKind::Outbound]
                    .into_iter()
                    .flat_map(|kind| history.events(kind).iter())
                    .map(|event| HistoryRow::render(event, formatter))
                    .collect(),
            ),
            HistoryView::Loading | HistoryView::Failed(_) => None,
        }
    }
}

/// One rendered line: `<symbol> <amount>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub section: &'static str,
    pub block_number: u64,
    pub transaction_index: u32,
    pub transaction_hash: Option<String>,
    pub symbol: String,
    pub amount: String,
}

impl HistoryRow {
    /// Unknown assets fall back to the token address and the raw integer amount
    pub fn render(event: &RawEvent, formatter: &AmountFormatter<'_>) -> Self {
        let (symbol, amount) = match formatter.registry().get(&event.asset) {
            Some(entry) => (
                entry.symbol.clone(),
                crate::format_units(&event.amount, entry.decimals),
            ),
            None => {
                warn!("No registry entry for asset {}, showing raw amount", event.asset);
                (event.asset.to_string(), event.amount.to_string())
            }
        };

        Self {
            section: event.kind.event_name(),
            block_number: event.block_number,
            transaction_index: event.transaction_index,
            transaction_hash: event.transaction_hash.clone(),
            symbol,
            amount,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.symbol, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, AssetEntry, AssetRegistry, SourceError};
    use num_bigint::BigUint;

    fn registry() -> AssetRegistry {
        AssetRegistry::new(vec![AssetEntry {
            contract_address: "0x7eEB186F13538e6795a0823e2D7283FEeD2738f5".parse().unwrap(),
            symbol: "EURS".to_string(),
            decimals: 2,
        }])
        .unwrap()
    }

    fn event(kind: EventKind, asset: &str, amount: u64) -> RawEvent {
        RawEvent {
            kind,
            block_number: 100,
            transaction_index: 3,
            log_index: 7,
            transaction_hash: Some("0xabc".to_string()),
            asset: asset.parse().unwrap(),
            account: Address::from_bytes([9; 20]),
            counterparty: None,
            amount: BigUint::from(amount),
        }
    }

    #[test]
    fn test_failed_is_not_empty_history() {
        let failed = HistoryView::from_result(Err(HistoryError::SourceUnavailable {
            context: "chain head".to_string(),
            source: SourceError::RateLimited,
        }));
        let empty = HistoryView::from_result(Ok(HistoryResult::default()));
        let registry = registry();
        let formatter = AmountFormatter::new(&registry);

        assert!(!failed.is_empty_history());
        assert!(failed.rows(&formatter).is_none());
        assert!(empty.is_empty_history());
        assert_eq!(empty.rows(&formatter), Some(Vec::new()));
        assert!(HistoryView::Loading.is_loading());
    }

    #[test]
    fn test_rows_in_section_order() {
        let registry = registry();
        let formatter = AmountFormatter::new(&registry);
        let view = HistoryView::Ready(HistoryResult {
            inbound: vec![event(
                EventKind::Inbound,
                "0x7eEB186F13538e6795a0823e2D7283FEeD2738f5",
                12_345,
            )],
            outbound: vec![event(
                EventKind::Outbound,
                "0x0000000000000000000000000000000000000001",
                77,
            )],
        });

        let rows = view.rows(&formatter).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].section, "Supply");
        assert_eq!(rows[0].label(), "EURS 123.45");
        assert_eq!(rows[1].section, "Withdraw");
        assert_eq!(
            rows[1].label(),
            "0x0000000000000000000000000000000000000001 77"
        );
    }
}
