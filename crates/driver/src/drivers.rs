//! The `driver` module contains implementations of the [Driver] trait.

use crate::{
    discovery::discover,
    reconcile::reconcile,
    scanner::{GameSink, Scanner, TransferSink},
    Driver, DriverConfig,
};
use anyhow::Result;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};

/// Defines a new [Driver] implementation.
#[macro_export]
macro_rules! define_driver {
    ($name:ident, $target:literal, $inner:path) => {
        #[doc = concat!("Variant of the [Driver] trait: [", stringify!($name), "]")]
        pub struct $name {
            /// The configuration for all of the drivers.
            pub config: Arc<DriverConfig>,
        }

        #[async_trait]
        impl Driver for $name {
            async fn start_loop(self) -> Result<()> {
                tracing::info!(target: $target, "Starting {}...", stringify!($name));
                $inner(self.config).await
            }
        }

        impl $name {
            #[doc = concat!("Creates a new instance of the [", stringify!($name), "] driver.")]
            pub fn new(config: Arc<DriverConfig>) -> Self {
                Self { config }
            }
        }
    };
}

define_driver!(GameScanDriver, "game-scan-driver", game_scan_loop);
define_driver!(TransferScanDriver, "transfer-scan-driver", transfer_scan_loop);
define_driver!(DiscoveryDriver, "discovery-driver", discovery_loop);
define_driver!(ReconcileDriver, "reconcile-driver", reconcile_loop);

async fn game_scan_loop(config: Arc<DriverConfig>) -> Result<()> {
    let sink = GameSink::new(
        Arc::clone(&config.ledger),
        Arc::clone(&config.records),
        config.notifier.clone(),
    );
    let scanner = Scanner::open(
        sink,
        Arc::clone(&config.ledger),
        config.game_cursor_path(),
        config.scan.clone(),
    )
    .await?;
    tracing::info!(target: "game-scan-driver", "Game scanner resuming from {:?}", scanner.cursor());
    scanner.run().await
}

async fn transfer_scan_loop(config: Arc<DriverConfig>) -> Result<()> {
    let sink = TransferSink::new(Arc::clone(&config.ledger), Arc::clone(&config.ownership));
    let scanner = Scanner::open(
        sink,
        Arc::clone(&config.ledger),
        config.transfer_cursor_path(),
        config.scan.clone(),
    )
    .await?;
    tracing::info!(target: "transfer-scan-driver", "Transfer scanner resuming from {:?}", scanner.cursor());
    scanner.run().await
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn discovery_loop(config: Arc<DriverConfig>) -> Result<()> {
    let mut ticker = ticker(config.jobs.discovery_interval);
    loop {
        ticker.tick().await;
        if let Err(e) = discover(config.ledger.as_ref(), &config.records, config.jobs.pool_width).await {
            // Soft failure, log the error and wait for the next tick.
            tracing::error!(target: "discovery-driver", "Discovery tick failed: {:#}", e);
        }
    }
}

async fn reconcile_loop(config: Arc<DriverConfig>) -> Result<()> {
    let mut ticker = ticker(config.jobs.reconcile_interval);
    loop {
        ticker.tick().await;
        match reconcile(
            config.ledger.as_ref(),
            &config.records,
            config.traits.as_ref(),
            config.jobs.pool_width,
        )
        .await
        {
            Ok(report) if !report.failed.is_empty() => {
                tracing::warn!(target: "reconcile-driver", "Reconciliation skipped {} records: {:?}", report.failed.len(), report.failed);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(target: "reconcile-driver", "Reconciliation tick failed: {:#}", e);
            }
        }
    }
}
