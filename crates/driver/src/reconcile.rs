//! The reconciliation job re-reads every local record's on-chain counterpart and repairs
//! drift in settlement, reveal, and winner fields.

use crate::{
    ledger::{ChainGame, Ledger},
    metadata::TraitSource,
    resolution::{apply_chain_settlement, resolve_record, Resolution},
    store::RecordGate,
    types::{participant, GameRecord},
    utils::{fetch_bounded, unix_now},
};
use anyhow::Result;
use ethers::types::Address;

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records that differ from before the pass.
    pub repaired: Vec<u64>,
    /// Records the resolution engine resolved during the pass.
    pub resolved: Vec<u64>,
    /// Records whose chain counterpart could not be fetched.
    pub failed: Vec<u64>,
}

/// The chain view of one record: the game itself and, once settled, the posted winner.
type ChainView = (ChainGame, Option<Address>);

async fn fetch_view(ledger: &dyn Ledger, id: u64) -> Result<Option<ChainView>> {
    let Some(game) = ledger.game_by_id(id).await? else {
        return Ok(None);
    };
    let posted = if game.settled {
        ledger.posted_winner(id).await?
    } else {
        None
    };
    Ok(Some((game, posted)))
}

/// Applies the chain view to `record`. Reveal flags only ever go from false to true.
fn repair(record: &mut GameRecord, game: &ChainGame, posted: Option<Address>, at: u64) {
    if record.player2.is_none() {
        if let Some(player2) = participant(&game.player2) {
            record.player2 = Some(player2);
            record.player2_joined_at.get_or_insert(at);
        }
    }

    record.player1_revealed |= game.player1_revealed;
    record.player2_revealed |= game.player2_revealed;

    if game.cancelled && !record.cancelled {
        record.cancelled = true;
        record.cancelled_at.get_or_insert(at);
    }

    if game.settled {
        apply_chain_settlement(record, posted.as_ref().and_then(participant), at);
        // Payloads are only needed until the chain confirms settlement.
        record.reveal.clear();
    }
}

/// Runs one reconciliation pass under the record gate.
///
/// Chain reads fan out with at most `pool_width` calls in flight; per-record failures are
/// logged and skipped. Records with both reveals and no outcome are resolved. The store is
/// persisted once, and only if something changed.
pub async fn reconcile(
    ledger: &dyn Ledger,
    records: &RecordGate,
    traits: &dyn TraitSource,
    pool_width: usize,
) -> Result<ReconcileReport> {
    let mut records = records.acquire("reconcile-job").await;
    let ids: Vec<u64> = records.list_all().iter().map(|r| r.id).collect();
    tracing::debug!(target: "reconcile-job", "Reconciling {} records", ids.len());

    let fetched = fetch_bounded(ids, pool_width, |id| fetch_view(ledger, id)).await;
    let at = unix_now();
    let mut report = ReconcileReport::default();

    for (id, result) in fetched {
        let view = match result {
            Ok(view) => view,
            Err(e) => {
                // Soft failure, the next pass retries the record.
                tracing::warn!(target: "reconcile-job", "Error fetching game {}: {:#}", id, e);
                report.failed.push(id);
                continue;
            }
        };
        let Some(record) = records.get_mut(id) else {
            continue;
        };
        let before = record.clone();

        match view {
            Some((game, posted)) => repair(record, &game, posted, at),
            None => tracing::warn!(target: "reconcile-job", "Game {} is not known on-chain", id),
        }

        if record.reveals().is_some() {
            match resolve_record(record, traits).await {
                Resolution::Resolved(_) => report.resolved.push(id),
                Resolution::NotResolvable(reason) => {
                    tracing::warn!(target: "reconcile-job", "Game {} not resolvable: {}", id, reason)
                }
                Resolution::Unchanged => {}
            }
        }

        if *record != before {
            report.repaired.push(id);
        }
    }

    if !report.repaired.is_empty() {
        records.persist().await?;
        report.repaired.sort_unstable();
        tracing::info!(target: "reconcile-job", "Repaired {} records: {:?}", report.repaired.len(), report.repaired);
    }
    Ok(report)
}
