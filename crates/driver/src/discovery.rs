//! The discovery job heals gaps the scanner left behind by diffing the ledger's game count
//! against the locally known ids.

use crate::{
    ledger::{ChainGame, Ledger},
    resolution::apply_chain_settlement,
    store::RecordGate,
    types::{canonical, participant, GameRecord},
    utils::{fetch_bounded, unix_now},
};
use anyhow::Result;

/// Builds a local record from its on-chain counterpart.
pub fn record_from_chain(id: u64, game: &ChainGame, at: u64) -> GameRecord {
    let mut record = GameRecord::new(id);
    record.player1 = participant(&game.player1);
    record.player2 = participant(&game.player2);
    record.stake_token = Some(canonical(&game.stake_token));
    record.stake_amount = game.stake_amount.to_string();
    record.created_at = Some(at);
    if record.player2.is_some() {
        record.player2_joined_at = Some(at);
    }
    record.player1_revealed = game.player1_revealed;
    record.player2_revealed = game.player2_revealed;
    if game.cancelled {
        record.cancelled = true;
        record.cancelled_at = Some(at);
    }
    if game.settled {
        apply_chain_settlement(&mut record, participant(&game.winner), at);
    }
    record
}

/// Runs one discovery pass.
///
/// Missing ids in `[0, games_length)` are fetched with at most `pool_width` calls in flight.
/// Per-id failures are logged and skipped. New records are inserted under the gate and the
/// store is persisted once.
///
/// ### Returns
/// - `Ok(Vec<u64>)`: The ids that were added, ascending.
/// - `Err(anyhow::Error)`: The game count could not be read or the store could not be
///    persisted.
pub async fn discover(ledger: &dyn Ledger, records: &RecordGate, pool_width: usize) -> Result<Vec<u64>> {
    let length = ledger.games_length().await?;
    let missing: Vec<u64> = {
        let records = records.acquire("discovery-job").await;
        (0..length).filter(|id| !records.contains(*id)).collect()
    };
    if missing.is_empty() {
        tracing::debug!(target: "discovery-job", "All {} games known locally", length);
        return Ok(Vec::new());
    }
    tracing::info!(target: "discovery-job", "Fetching {} missing games of {}", missing.len(), length);

    let fetched = fetch_bounded(missing, pool_width, |id| ledger.game_by_id(id)).await;
    let at = unix_now();
    let mut found: Vec<GameRecord> = fetched
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(Some(game)) if game.is_populated() => Some(record_from_chain(id, &game, at)),
            Ok(_) => {
                tracing::debug!(target: "discovery-job", "Game {} has no participant on-chain, skipping", id);
                None
            }
            Err(e) => {
                // Soft failure, the next pass retries the id.
                tracing::warn!(target: "discovery-job", "Error fetching game {}: {:#}", id, e);
                None
            }
        })
        .collect();
    found.sort_by_key(|record| record.id);

    let mut records = records.acquire("discovery-job").await;
    let mut added = Vec::new();
    for record in found {
        // The scanner may have created it while the fan-out was running.
        if !records.contains(record.id) {
            added.push(record.id);
            records.upsert(record);
        }
    }
    if !added.is_empty() {
        records.persist().await?;
        tracing::info!(target: "discovery-job", "Discovered {} games: {:?}", added.len(), added);
    }
    Ok(added)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        gate::Gate,
        store::{MemoryRecordStore, RecordRepository},
        test_utils::MockLedger,
        types::GameState,
    };
    use ethers::types::{Address, U256};

    fn chain_game(player1: u64) -> ChainGame {
        ChainGame {
            player1: Address::from_low_u64_be(player1),
            stake_amount: U256::from(10),
            ..Default::default()
        }
    }

    fn empty_gate() -> RecordGate {
        Gate::new(Box::new(MemoryRecordStore::default()) as Box<dyn RecordRepository>)
    }

    #[tokio::test]
    async fn skips_ids_without_a_participant() {
        let ledger = MockLedger::default();
        ledger.set_game(0, chain_game(0xaa));
        ledger.set_game(1, ChainGame::default());
        ledger.set_game(2, chain_game(0xbb));
        let records = empty_gate();

        let added = discover(&ledger, &records, 5).await.unwrap();
        assert_eq!(added, vec![0, 2]);

        let records = records.acquire("test").await;
        let ids: Vec<u64> = records.list_all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(records.get(2).unwrap().state(), GameState::AwaitingPlayer2);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let ledger = MockLedger::default();
        for id in 0..6 {
            ledger.set_game(id, chain_game(0x10 + id));
        }
        ledger.fail_game(3);
        let records = Gate::new(Box::new(MemoryRecordStore::with_records([GameRecord::new(0)]))
            as Box<dyn RecordRepository>);

        let added = discover(&ledger, &records, 2).await.unwrap();
        assert_eq!(added, vec![1, 2, 4, 5]);

        ledger.clear_failures();
        let added = discover(&ledger, &records, 2).await.unwrap();
        assert_eq!(added, vec![3]);
        assert!(discover(&ledger, &records, 2).await.unwrap().is_empty());
    }

    #[test]
    fn settled_chain_games_carry_their_outcome() {
        let mut game = chain_game(0xaa);
        game.player2 = Address::from_low_u64_be(0xbb);
        game.settled = true;
        game.winner = Address::from_low_u64_be(0xbb);
        game.player1_revealed = true;
        game.player2_revealed = true;

        let record = record_from_chain(7, &game, 42);
        assert_eq!(record.state(), GameState::Settled);
        assert_eq!(record.winner, record.player2);
        assert_eq!(record.settled_at, Some(42));
        assert!(record.is_consistent());
    }
}
