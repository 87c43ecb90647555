//! The `config` module contains the [DriverConfig].

use crate::{
    ledger::Ledger,
    metadata::TraitSource,
    store::{OwnershipCache, RecordGate},
    types::Notification,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::broadcast;

/// The default number of blocks fetched per log request.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000;
/// The default pause between two chunk fetches.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(250);
/// The default scanner poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// How far behind the head a scanner without a cursor starts.
pub const DEFAULT_BOOTSTRAP_WINDOW: u64 = 10_000;
/// The default discovery job interval.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);
/// The default reconciliation job interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(120);
/// The default number of concurrent ledger calls made by the jobs.
pub const DEFAULT_POOL_WIDTH: usize = 5;
/// The capacity of the notification channel. Slow listeners lag and miss notifications.
pub const NOTIFICATION_CAPACITY: usize = 256;

/// Settings shared by both scanners.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// The maximum number of blocks per log request.
    pub chunk_size: u64,
    /// The pause between two chunk fetches.
    pub chunk_delay: Duration,
    /// The interval between two ticks.
    pub poll_interval: Duration,
    /// How far behind the head a scanner without a cursor starts.
    pub bootstrap_window: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bootstrap_window: DEFAULT_BOOTSTRAP_WINDOW,
        }
    }
}

/// Settings for the discovery and reconciliation jobs.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub discovery_interval: Duration,
    pub reconcile_interval: Duration,
    /// The maximum number of ledger calls in flight during a job's fan-out.
    pub pool_width: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            pool_width: DEFAULT_POOL_WIDTH,
        }
    }
}

/// The [DriverConfig] struct contains the configuration and shared handles for the
/// [Driver](crate::Driver) implementations.
pub struct DriverConfig {
    /// The read boundary to the authoritative chain state.
    pub ledger: Arc<dyn Ledger>,
    /// The record store, behind the process-wide gate.
    pub records: Arc<RecordGate>,
    /// The cached wallet holdings.
    pub ownership: Arc<OwnershipCache>,
    /// The source of battle traits for revealed NFTs.
    pub traits: Arc<dyn TraitSource>,
    /// The sending handle of the notification broadcast channel.
    pub notifier: broadcast::Sender<Notification>,
    /// The directory holding the cursor documents.
    pub data_dir: PathBuf,
    /// Settings for both scanners.
    pub scan: ScanSettings,
    /// Settings for the periodic jobs.
    pub jobs: JobSettings,
}

impl DriverConfig {
    /// Creates a new [DriverConfig] with the given configuration.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        records: Arc<RecordGate>,
        ownership: Arc<OwnershipCache>,
        traits: Arc<dyn TraitSource>,
        data_dir: PathBuf,
    ) -> Self {
        // Create the notification channel. Listeners subscribe through the sender.
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            ledger,
            records,
            ownership,
            traits,
            notifier,
            data_dir,
            scan: ScanSettings::default(),
            jobs: JobSettings::default(),
        }
    }

    /// Overrides the scanner settings.
    pub fn with_scan_settings(mut self, scan: ScanSettings) -> Self {
        self.scan = scan;
        self
    }

    /// Overrides the job settings.
    pub fn with_job_settings(mut self, jobs: JobSettings) -> Self {
        self.jobs = jobs;
        self
    }

    /// Subscribes a new listener to record notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// The cursor document of the game scanner.
    pub fn game_cursor_path(&self) -> PathBuf {
        self.data_dir.join("cursor-games.json")
    }

    /// The cursor document of the transfer scanner.
    pub fn transfer_cursor_path(&self) -> PathBuf {
        self.data_dir.join("cursor-transfers.json")
    }
}
