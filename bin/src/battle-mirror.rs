use anyhow::{anyhow, Result};
use battle_mirror_driver::{
    store::{FileRecordStore, OwnershipCache, RecordRepository},
    metadata::MetadataDir,
    DiscoveryDriver, Driver, DriverConfig, EthersLedger, GameScanDriver, Gate, JobSettings,
    ReconcileDriver, ScanSettings, TransferScanDriver,
};
use clap::{ArgAction, Parser};
use ethers::{
    providers::{Provider, Ws},
    types::Address,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::Level;

/// Arguments for the `battle-mirror` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The Websocket RPC endpoint used to read the chain.
    #[arg(
        long,
        short,
        help = "The Websocket RPC endpoint used to read the chain.",
        env = "BATTLE_MIRROR_WS"
    )]
    ws_endpoint: String,

    /// The address of the battle game contract.
    #[arg(
        long,
        short,
        help = "The address of the battle game contract.",
        env = "BATTLE_MIRROR_GAME"
    )]
    game_contract: Address,

    /// The NFT collections whose transfers invalidate cached holdings.
    #[arg(
        long,
        help = "Comma separated NFT collections whose transfers invalidate cached holdings.",
        env = "BATTLE_MIRROR_COLLECTIONS",
        value_delimiter = ','
    )]
    collections: Vec<Address>,

    /// The directory holding the persisted cursor, record, and ownership documents.
    #[arg(
        long,
        help = "The directory holding the persisted documents.",
        env = "BATTLE_MIRROR_DATA_DIR",
        default_value = "data"
    )]
    data_dir: PathBuf,

    /// The directory holding cached token metadata, laid out as `<contract>/<tokenId>.json`.
    #[arg(
        long,
        help = "The directory holding cached token metadata.",
        env = "BATTLE_MIRROR_METADATA_DIR",
        default_value = "metadata"
    )]
    metadata_dir: PathBuf,

    #[arg(long, env = "BATTLE_MIRROR_SCAN_INTERVAL_SECS", default_value_t = 15)]
    scan_interval_secs: u64,

    #[arg(long, env = "BATTLE_MIRROR_DISCOVERY_INTERVAL_SECS", default_value_t = 60)]
    discovery_interval_secs: u64,

    #[arg(long, env = "BATTLE_MIRROR_RECONCILE_INTERVAL_SECS", default_value_t = 120)]
    reconcile_interval_secs: u64,

    /// The maximum number of blocks per log request.
    #[arg(long, env = "BATTLE_MIRROR_CHUNK_SIZE", default_value_t = 1_000)]
    chunk_size: u64,

    /// The maximum number of concurrent ledger calls made by the jobs.
    #[arg(long, env = "BATTLE_MIRROR_POOL_WIDTH", default_value_t = 5)]
    pool_width: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        ws_endpoint,
        game_contract,
        collections,
        data_dir,
        metadata_dir,
        scan_interval_secs,
        discovery_interval_secs,
        reconcile_interval_secs,
        chunk_size,
        pool_width,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    // Connect to the websocket endpoint.
    tracing::debug!(target: "battle-mirror-cli", "Connecting to websocket endpoint...");
    let provider = Arc::new(Provider::<Ws>::connect(ws_endpoint.clone()).await?);
    tracing::info!(target: "battle-mirror-cli", "Websocket connected @ {}", ws_endpoint);
    let ledger = Arc::new(EthersLedger::new(provider, game_contract, collections));

    // Load the persisted documents.
    let records: Box<dyn RecordRepository> =
        Box::new(FileRecordStore::open(data_dir.join("games.json")).await?);
    let ownership = OwnershipCache::open(data_dir.join("ownership.json")).await?;

    // Create the driver config.
    let driver_config = Arc::new(
        DriverConfig::new(
            ledger,
            Arc::new(Gate::new(records)),
            Arc::new(ownership),
            Arc::new(MetadataDir::new(metadata_dir)),
            data_dir,
        )
        .with_scan_settings(ScanSettings {
            chunk_size,
            poll_interval: Duration::from_secs(scan_interval_secs),
            ..Default::default()
        })
        .with_job_settings(JobSettings {
            discovery_interval: Duration::from_secs(discovery_interval_secs),
            reconcile_interval: Duration::from_secs(reconcile_interval_secs),
            pool_width,
        }),
    );
    tracing::info!(target: "battle-mirror-cli", "Driver config created successfully.");

    // Start the driver loops.
    tokio::try_join!(
        GameScanDriver::new(Arc::clone(&driver_config)).start_loop(),
        TransferScanDriver::new(Arc::clone(&driver_config)).start_loop(),
        DiscoveryDriver::new(Arc::clone(&driver_config)).start_loop(),
        ReconcileDriver::new(Arc::clone(&driver_config)).start_loop(),
    )?;

    Ok(())
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
