#![doc = include_str!("../README.md")]

use anyhow::Result;
use async_trait::async_trait;

/// Contains the smart contract bindings used by the driver.
mod bindings;

/// Contains the decoded ledger event types.
pub mod events;

/// Contains the read boundary to the chain.
pub mod ledger;
pub use ledger::{ChainGame, EthersLedger, Ledger};

/// Contains the record, reveal, and notification types.
pub mod types;

/// Contains the process-wide record gate.
pub mod gate;
pub use gate::{Gate, GateGuard};

/// Contains the persisted documents.
pub mod store;

/// Contains the metadata-backed trait lookup.
pub mod metadata;

/// Contains the glue between records and the battle solver.
pub mod resolution;

/// Contains the event dispatcher.
pub mod dispatcher;

/// Contains the chunked chain scanner and its sinks.
pub mod scanner;

/// Contains the discovery job.
pub mod discovery;

/// Contains the reconciliation job.
pub mod reconcile;

/// Contains the reveal write path.
pub mod reveal;
pub use reveal::{submit_reveal, RevealError, RevealReceipt};

/// Contains the configuration for the drivers.
mod config;
pub use config::*;

/// Contains the [Driver] implementations.
mod drivers;
pub use drivers::*;

/// Contains utilities for the drivers.
mod utils;

#[cfg(test)]
mod test_utils;

/// The [Driver] trait defines the interface for all driver loops that are ran by the
/// `battle-mirror` binary.
#[async_trait]
pub trait Driver {
    /// Starts the [Driver] loop.
    async fn start_loop(self) -> Result<()>;
}
