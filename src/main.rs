use anyhow::{bail, Context, Result};
use clap::Parser;
use config_manager::{ConfigManager, HistoryConfig};
use evm_log_client::{EvmClientConfig, EvmLogClient};
use history_core::{
    Address, AmountFormatter, AssemblerOptions, AssetEntry, AssetRegistry, BlockRange,
    EventKind, HistoryAssembler, HistoryRow, HistoryView, ScanObserver, ScanOptions,
};
use retry_utils::RetryConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, reload, EnvFilter, Registry};

/// Recent Supply and Withdraw history of an account on the lending pool
#[derive(Debug, Parser)]
#[command(name = "ledger_history", version)]
struct Cli {
    /// Path to a config.toml; defaults plus LEDGER__* env vars when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Account address (0x + 40 hex digits)
    #[arg(long)]
    account: String,

    /// First block to scan, defaults to the pool deployment block
    #[arg(long)]
    from_block: Option<u64>,

    /// Last block to scan, defaults to the chain head
    #[arg(long)]
    to_block: Option<u64>,

    /// Write the rendered rows to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

/// Scan progress on stderr while the history is loading
struct ProgressLine;

impl ScanObserver for ProgressLine {
    fn on_chunk(&self, chunk: BlockRange, _matched: usize, accumulated: usize) {
        eprintln!("  scanned blocks {} ({} found)", chunk, accumulated);
    }
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the subscriber before anything logs. Without `RUST_LOG` the
/// returned handle lets `system.debug_mode` raise the level once config is read.
fn init_tracing() -> Option<FilterHandle> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
        Err(_) => {
            let (filter, handle) = reload::Layer::new(EnvFilter::new("info"));
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            Some(handle)
        }
    }
}

fn build_registry(config: &HistoryConfig) -> Result<AssetRegistry> {
    let mut entries = Vec::with_capacity(config.assets.len());
    for asset in &config.assets {
        let contract_address: Address = asset
            .address
            .parse()
            .with_context(|| format!("asset {} has a bad address", asset.symbol))?;
        entries.push(AssetEntry {
            contract_address,
            symbol: asset.symbol.clone(),
            decimals: asset.decimals,
        });
    }
    Ok(AssetRegistry::new(entries)?)
}

fn assembler_options(config: &HistoryConfig) -> AssemblerOptions {
    let scan = &config.scan;
    AssemblerOptions {
        scan: ScanOptions {
            chunk_size: scan.chunk_size,
            query_timeout: Some(Duration::from_secs(scan.query_timeout_seconds)),
            retry: RetryConfig {
                max_retries: scan.max_retries,
                rate_limit_delays_ms: scan.rate_limit_delays_ms.clone(),
                transient_delays_ms: scan.transient_delays_ms.clone(),
                timeout_delays_ms: scan.timeout_delays_ms.clone(),
            },
        },
        target_count: scan.target_count,
        display_limit: scan.display_limit,
    }
}

fn write_csv(path: &Path, rows: &[HistoryRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    for row in rows {
        wtr.serialize(row).context("CSV row error")?;
    }
    wtr.flush()?;
    info!("💾 Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Raise the default filter when `system.debug_mode` is set
fn raise_to_debug(handle: &FilterHandle) -> Result<()> {
    handle.modify(|filter| *filter = EnvFilter::new("debug"))?;
    Ok(())
}

fn section_lines(kind: EventKind, rows: &[HistoryRow], lines: &mut Vec<String>) {
    lines.push(kind.event_name().to_string());
    let before = lines.len();
    lines.extend(
        rows.iter()
            .filter(|row| row.section == kind.event_name())
            .map(|row| format!("  {}", row.label())),
    );
    if lines.len() == before {
        lines.push("  (none)".to_string());
    }
}

/// Printable lines for each state of the history view
fn view_lines(view: &HistoryView, formatter: &AmountFormatter<'_>) -> Vec<String> {
    match view.rows(formatter) {
        Some(rows) => {
            let mut lines = Vec::new();
            section_lines(EventKind::Inbound, &rows, &mut lines);
            section_lines(EventKind::Outbound, &rows, &mut lines);
            lines
        }
        None if view.is_loading() => vec!["Loading history...".to_string()],
        None => match view {
            HistoryView::Failed(reason) => vec![format!("History unavailable: {}", reason)],
            _ => Vec::new(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter_handle = init_tracing();

    let config = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    }
    .into_config();

    if config.system.debug_mode {
        if let Some(handle) = &filter_handle {
            raise_to_debug(handle)?;
        }
    }
    info!("🔧 Configuration loaded, RPC endpoint {}", config.rpc.url);

    let registry = build_registry(&config)?;
    let formatter = AmountFormatter::new(&registry);
    let pool: Address = config
        .pool
        .contract_address
        .parse()
        .context("pool.contract_address is not an address")?;

    let client = Arc::new(EvmLogClient::with_config(EvmClientConfig {
        rpc_url: config.rpc.url.clone(),
        timeout_seconds: config.rpc.request_timeout_seconds,
    })?);

    let assembler = HistoryAssembler::new(
        client.clone(),
        pool,
        config.pool.deployment_block,
        assembler_options(&config),
    )
    .with_observer(Arc::new(ProgressLine));

    for line in view_lines(&HistoryView::Loading, &formatter) {
        eprintln!("{}", line);
    }

    let result = match (cli.from_block, cli.to_block) {
        (None, None) => assembler.assemble_to_head(&cli.account).await,
        (from, to) => {
            let end = match to {
                Some(end) => end,
                None => client.block_number().await.context("cannot read chain head")?,
            };
            let start = from.unwrap_or(config.pool.deployment_block);
            assembler
                .assemble(&cli.account, BlockRange::new(start, end))
                .await
        }
    };

    let view = HistoryView::from_result(result);
    for line in view_lines(&view, &formatter) {
        println!("{}", line);
    }

    let rows = match view.rows(&formatter) {
        Some(rows) => rows,
        None => {
            let reason = match &view {
                HistoryView::Failed(reason) => reason.as_str(),
                _ => "no result",
            };
            error!("❌ History unavailable: {}", reason);
            bail!("history unavailable: {}", reason);
        }
    };

    if let Some(path) = &cli.csv {
        write_csv(path, &rows)?;
    }

    Ok(())
}
