//! The scanner module walks the chain from a persisted cursor in bounded chunks and hands
//! each chunk's events to a [LogSink].

use crate::{
    config::ScanSettings,
    dispatcher::dispatch,
    events::{GameEvent, TransferEvent},
    ledger::Ledger,
    store::{CursorStore, OwnershipCache, RecordGate},
    types::{canonical, Notification},
    utils::unix_now,
};
use anyhow::Result;
use async_trait::async_trait;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::broadcast;

/// The [LogSink] trait defines what a [Scanner] fetches and how it applies the result.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// The decoded event type the sink consumes.
    type Event: Send;

    /// The name of the scanner driving this sink, recorded on every log line.
    fn name(&self) -> &'static str;

    /// Fetch every event within `[from, to]`.
    async fn fetch(&self, from: u64, to: u64) -> Result<Vec<Self::Event>>;

    /// Apply one chunk's events, in log order. An error here fails the tick and leaves the
    /// cursor in front of the chunk.
    async fn apply(&self, events: Vec<Self::Event>) -> Result<()>;
}

/// What one [Scanner::tick] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Chunks whose events were applied.
    pub chunks_applied: usize,
    /// Chunks skipped because the fetch failed. Their events are never retried.
    pub chunks_skipped: Vec<(u64, u64)>,
    /// The cursor after the tick.
    pub cursor: u64,
}

/// A cursor-driven, gap-tolerant chain scanner.
pub struct Scanner<S> {
    sink: S,
    ledger: Arc<dyn Ledger>,
    cursor: CursorStore,
    settings: ScanSettings,
}

impl<S: LogSink> Scanner<S> {
    /// Creates a new [Scanner] over the cursor document at `cursor_path`.
    pub async fn open(
        sink: S,
        ledger: Arc<dyn Ledger>,
        cursor_path: impl Into<PathBuf>,
        settings: ScanSettings,
    ) -> Result<Self> {
        Ok(Self {
            sink,
            ledger,
            cursor: CursorStore::open(cursor_path).await?,
            settings,
        })
    }

    /// The last committed block, if any.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor.last_block()
    }

    /// Scans `(cursor, height]` once.
    ///
    /// Each chunk is fetched, applied in log order, and its upper bound committed as the new
    /// cursor before the next chunk starts. A failed fetch is logged and the chunk skipped.
    /// A failed apply aborts the tick with the cursor still in front of that chunk.
    pub async fn tick(&mut self) -> Result<ScanReport> {
        let name = self.sink.name();
        let height = self.ledger.current_height().await?;

        let cursor = match self.cursor.last_block() {
            Some(cursor) => cursor,
            None => {
                let start = height.saturating_sub(self.settings.bootstrap_window);
                tracing::info!(target: "scanner", scanner = name, "No cursor found, bootstrapping at block {}", start);
                self.cursor.commit(start).await?;
                start
            }
        };

        let mut report = ScanReport {
            cursor,
            ..Default::default()
        };
        if height <= cursor {
            return Ok(report);
        }

        let chunk = self.settings.chunk_size.max(1);
        let mut from = cursor + 1;
        while from <= height {
            let to = from.saturating_add(chunk - 1).min(height);
            match self.sink.fetch(from, to).await {
                Ok(events) => {
                    tracing::debug!(target: "scanner", scanner = name, "Fetched {} events in {}..={}", events.len(), from, to);
                    self.sink.apply(events).await?;
                    report.chunks_applied += 1;
                }
                Err(e) => {
                    // Soft failure, log the error and move past the chunk.
                    tracing::error!(target: "scanner", scanner = name, "Error fetching {}..={}, skipping chunk: {:#}", from, to, e);
                    report.chunks_skipped.push((from, to));
                }
            }
            self.cursor.commit(to).await?;
            report.cursor = to;

            from = to + 1;
            if from <= height && !self.settings.chunk_delay.is_zero() {
                tokio::time::sleep(self.settings.chunk_delay).await;
            }
        }

        tracing::info!(target: "scanner", scanner = name, "Scanned up to block {} ({} chunks skipped)", report.cursor, report.chunks_skipped.len());
        Ok(report)
    }

    /// Ticks forever on the configured poll interval. Tick failures are logged and the
    /// next tick resumes from the last committed cursor.
    pub async fn run(mut self) -> Result<()> {
        let name = self.sink.name();
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!(target: "scanner", scanner = name, "Scan tick failed: {:#}", e);
            }
        }
    }
}

/// The [LogSink] for game contract events. Dispatches a chunk under the record gate and
/// persists the snapshot once per chunk.
pub struct GameSink {
    ledger: Arc<dyn Ledger>,
    records: Arc<RecordGate>,
    notifier: broadcast::Sender<Notification>,
}

impl GameSink {
    /// Creates a new [GameSink].
    pub fn new(
        ledger: Arc<dyn Ledger>,
        records: Arc<RecordGate>,
        notifier: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            ledger,
            records,
            notifier,
        }
    }
}

#[async_trait]
impl LogSink for GameSink {
    type Event = GameEvent;

    fn name(&self) -> &'static str {
        "game-scanner"
    }

    async fn fetch(&self, from: u64, to: u64) -> Result<Vec<GameEvent>> {
        self.ledger.game_events(from, to).await
    }

    async fn apply(&self, events: Vec<GameEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut records = self.records.acquire("game-scanner").await;
        let at = unix_now();
        let notifications: Vec<Notification> = events
            .iter()
            .filter_map(|event| dispatch(&mut **records, event, at))
            .collect();
        if notifications.is_empty() {
            return Ok(());
        }
        records.persist().await?;
        drop(records);

        for notification in notifications {
            // No listeners is fine; delivery is best-effort.
            let _ = self.notifier.send(notification);
        }
        Ok(())
    }
}

/// The [LogSink] for asset ledger transfers. Invalidates the ownership cache entry of every
/// wallet a transfer touches.
pub struct TransferSink {
    ledger: Arc<dyn Ledger>,
    ownership: Arc<OwnershipCache>,
}

impl TransferSink {
    /// Creates a new [TransferSink].
    pub fn new(ledger: Arc<dyn Ledger>, ownership: Arc<OwnershipCache>) -> Self {
        Self { ledger, ownership }
    }
}

#[async_trait]
impl LogSink for TransferSink {
    type Event = TransferEvent;

    fn name(&self) -> &'static str {
        "transfer-scanner"
    }

    async fn fetch(&self, from: u64, to: u64) -> Result<Vec<TransferEvent>> {
        self.ledger.transfer_events(from, to).await
    }

    async fn apply(&self, events: Vec<TransferEvent>) -> Result<()> {
        let wallets: Vec<String> = events
            .iter()
            .flat_map(TransferEvent::wallets)
            .map(|wallet| canonical(&wallet))
            .collect();
        let removed = self
            .ownership
            .invalidate(wallets.iter().map(String::as_str))
            .await?;
        if removed > 0 {
            tracing::debug!(target: "transfer-scanner", "Invalidated {} cached wallets", removed);
        }
        Ok(())
    }
}
