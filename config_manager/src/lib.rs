use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Largest precision whose scale factor still fits in a uint256
pub const MAX_ASSET_DECIMALS: u8 = 77;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// General settings
    pub system: SystemSettings,

    /// JSON-RPC endpoint serving the event logs
    pub rpc: RpcConfig,

    /// Lending pool whose Supply/Withdraw events are scanned
    pub pool: PoolConfig,

    /// Chunked scan tuning
    pub scan: ScanConfig,

    /// Display table for reserve assets
    pub assets: Vec<AssetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Enable debug logging
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP JSON-RPC URL
    pub url: String,

    /// HTTP request timeout in seconds
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool proxy contract emitting the events
    pub contract_address: String,

    /// Block the pool was deployed in; lower bound of every scan
    pub deployment_block: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Widest block span the provider accepts in one eth_getLogs call
    pub chunk_size: u64,

    /// Matches after which the backward walk stops
    pub target_count: usize,

    /// Most recent entries kept per event kind
    pub display_limit: usize,

    /// Deadline for a single chunk query in seconds
    pub query_timeout_seconds: u64,

    /// Retries per chunk after the first attempt
    pub max_retries: u32,

    pub rate_limit_delays_ms: Vec<u64>,
    pub transient_delays_ms: Vec<u64>,
    pub timeout_delays_ms: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Token contract address
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

impl AssetConfig {
    fn new(address: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings { debug_mode: false },
            rpc: RpcConfig {
                url: "http://127.0.0.1:8545".to_string(),
                request_timeout_seconds: 30,
            },
            pool: PoolConfig {
                // Pool proxy on the Rinkeby testnet
                contract_address: "0xE039BdF1d874d27338e09B55CB09879Dedca52D8".to_string(),
                deployment_block: 10_340_643,
            },
            scan: ScanConfig {
                chunk_size: 5000,
                target_count: 5,
                display_limit: 5,
                query_timeout_seconds: 20,
                max_retries: 3,
                rate_limit_delays_ms: vec![1000, 2000, 4000],
                transient_delays_ms: vec![300, 600, 1200],
                timeout_delays_ms: vec![500, 1000],
            },
            // Testnet mintable reserves of the pool
            assets: vec![
                AssetConfig::new("0xd74047010D77c5901df5b0f9ca518aED56C85e8D", "ETH", 18),
                AssetConfig::new("0x4aAded56bd7c69861E8654719195fCA9C670EB45", "DAI", 18),
                AssetConfig::new("0x237f409fBD10E30e237d63d9050Ae302e339028E", "LINK", 18),
                AssetConfig::new("0xb18d016cDD2d9439A19f15633005A6b2cd6Aa774", "USDC", 6),
                AssetConfig::new("0x124F70a8a3246F177b0067F435f5691Ee4e467DD", "WBTC", 8),
                AssetConfig::new("0x326005cFdF58bfB38650396836BEBF815F5ab4dD", "USDT", 6),
                AssetConfig::new("0x100aB78E5A565a94f2a191714A7a1B727268eFFb", "AAVE", 18),
                AssetConfig::new("0x7eEB186F13538e6795a0823e2D7283FEeD2738f5", "EURS", 2),
            ],
        }
    }
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "RPC URL is required".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ConfigurationError::InvalidValue(
                "scan.chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.display_limit == 0 {
            return Err(ConfigurationError::InvalidValue(
                "scan.display_limit must be greater than 0".to_string(),
            ));
        }

        if self.query_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "scan.query_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl HistoryConfig {
    /// Load configuration from `config.toml` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder =
            Config::builder().add_source(Config::try_from(&HistoryConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        // e.g. LEDGER__RPC__URL, LEDGER__SCAN__CHUNK_SIZE
        config_builder = config_builder.add_source(
            Environment::with_prefix("LEDGER")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scan.rate_limit_delays_ms")
                .with_list_parse_key("scan.transient_delays_ms")
                .with_list_parse_key("scan.timeout_delays_ms"),
        );

        let history_config: HistoryConfig = config_builder.build()?.try_deserialize()?;
        history_config.validate()?;

        Ok(history_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.rpc.validate()?;
        self.scan.validate()?;

        if !is_hex_address(&self.pool.contract_address) {
            return Err(ConfigurationError::InvalidValue(format!(
                "pool.contract_address is not a 20-byte hex address: '{}'",
                self.pool.contract_address
            )));
        }

        let mut seen = HashSet::new();
        for asset in &self.assets {
            if !is_hex_address(&asset.address) {
                return Err(ConfigurationError::InvalidValue(format!(
                    "Asset {} has a malformed address: '{}'",
                    asset.symbol, asset.address
                )));
            }
            if asset.decimals > MAX_ASSET_DECIMALS {
                return Err(ConfigurationError::InvalidValue(format!(
                    "Asset {} has {} decimals (max {})",
                    asset.symbol, asset.decimals, MAX_ASSET_DECIMALS
                )));
            }
            if !seen.insert(asset.address.to_lowercase()) {
                return Err(ConfigurationError::InvalidValue(format!(
                    "Asset address listed twice: {}",
                    asset.address
                )));
            }
        }

        Ok(())
    }
}

/// `0x` followed by exactly 40 hex digits, any case
pub fn is_hex_address(input: &str) -> bool {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));

    matches!(digits, Some(d) if d.len() == 40 && d.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Configuration manager for loading and holding the history configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: HistoryConfig,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config = HistoryConfig::load()?;
        info!("Configuration loaded successfully");
        debug!("Configuration: {:#?}", config);

        Ok(Self { config })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = HistoryConfig::load_from_path(path)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn into_config(self) -> HistoryConfig {
        self.config
    }
}
