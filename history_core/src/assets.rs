use crate::{Address, HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub contract_address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Static symbol/precision table for reserve tokens, built once at startup
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    entries: HashMap<Address, AssetEntry>,
}

impl AssetRegistry {
    /// Fails on the first address that appears twice
    pub fn new(entries: impl IntoIterator<Item = AssetEntry>) -> Result<Self> {
        let mut map = HashMap::new();
        for entry in entries {
            let address = entry.contract_address;
            if map.insert(address, entry).is_some() {
                return Err(HistoryError::InvalidConfiguration(format!(
                    "asset {} registered more than once",
                    address
                )));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, address: &Address) -> Option<&AssetEntry> {
        self.entries.get(address)
    }

    pub fn symbol_of(&self, address: &Address) -> Option<&str> {
        self.get(address).map(|entry| entry.symbol.as_str())
    }

    pub fn decimals_of(&self, address: &Address) -> Option<u8> {
        self.get(address).map(|entry| entry.decimals)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: &str, symbol: &str, decimals: u8) -> AssetEntry {
        AssetEntry {
            contract_address: address.parse().unwrap(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn test_lookup() {
        let registry = AssetRegistry::new(vec![
            entry("0xb18d016cDD2d9439A19f15633005A6b2cd6Aa774", "USDC", 6),
            entry("0x124F70a8a3246F177b0067F435f5691Ee4e467DD", "WBTC", 8),
        ])
        .unwrap();

        let usdc: Address = "0xb18d016cdd2d9439a19f15633005a6b2cd6aa774".parse().unwrap();
        assert_eq!(registry.symbol_of(&usdc), Some("USDC"));
        assert_eq!(registry.decimals_of(&usdc), Some(6));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_asset_is_none() {
        let registry = AssetRegistry::default();
        let unknown: Address = "0x7eEB186F13538e6795a0823e2D7283FEeD2738f5".parse().unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.symbol_of(&unknown), None);
        assert_eq!(registry.decimals_of(&unknown), None);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let result = AssetRegistry::new(vec![
            entry("0xd74047010D77c5901df5b0f9ca518aED56C85e8D", "ETH", 18),
            entry("0xd74047010d77c5901df5b0f9ca518aed56c85e8d", "WETH", 18),
        ]);
        assert!(matches!(result, Err(HistoryError::InvalidConfiguration(_))));
    }
}
