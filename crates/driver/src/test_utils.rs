//! A scripted [Ledger] for unit tests.

use crate::{
    events::{GameEvent, TransferEvent},
    ledger::{ChainGame, Ledger},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::Address;
use std::{
    collections::{BTreeMap, HashSet},
    sync::Mutex,
};

#[derive(Default)]
struct MockState {
    height: u64,
    game_events: Vec<(u64, GameEvent)>,
    transfers: Vec<(u64, TransferEvent)>,
    failing_ranges: HashSet<u64>,
    requested: Vec<(u64, u64)>,
    games: BTreeMap<u64, ChainGame>,
    failing_games: HashSet<u64>,
    posted_winners: BTreeMap<u64, Address>,
}

/// A [Ledger] whose state is scripted by the test.
#[derive(Default)]
pub(crate) struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub(crate) fn set_height(&self, height: u64) {
        self.with(|s| s.height = height);
    }

    pub(crate) fn push_game_event(&self, block: u64, event: GameEvent) {
        self.with(|s| s.game_events.push((block, event)));
    }

    pub(crate) fn push_transfer(&self, block: u64, event: TransferEvent) {
        self.with(|s| s.transfers.push((block, event)));
    }

    /// Makes every event fetch starting at `from` fail.
    pub(crate) fn fail_range_from(&self, from: u64) {
        self.with(|s| s.failing_ranges.insert(from));
    }

    pub(crate) fn clear_failures(&self) {
        self.with(|s| {
            s.failing_ranges.clear();
            s.failing_games.clear();
        });
    }

    pub(crate) fn requested_ranges(&self) -> Vec<(u64, u64)> {
        self.with(|s| s.requested.clone())
    }

    pub(crate) fn set_game(&self, id: u64, game: ChainGame) {
        self.with(|s| s.games.insert(id, game));
    }

    pub(crate) fn fail_game(&self, id: u64) {
        self.with(|s| s.failing_games.insert(id));
    }

    pub(crate) fn post_winner(&self, id: u64, winner: Address) {
        self.with(|s| s.posted_winners.insert(id, winner));
    }

    fn range<T: Clone>(
        &self,
        from: u64,
        to: u64,
        pick: impl Fn(&MockState) -> &Vec<(u64, T)>,
    ) -> Result<Vec<T>> {
        self.with(|s| {
            s.requested.push((from, to));
            if s.failing_ranges.contains(&from) {
                return Err(anyhow!("request timed out for {}..={}", from, to));
            }
            Ok(pick(s)
                .iter()
                .filter(|(block, _)| (from..=to).contains(block))
                .map(|(_, event)| event.clone())
                .collect())
        })
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_height(&self) -> Result<u64> {
        Ok(self.with(|s| s.height))
    }

    async fn game_events(&self, from: u64, to: u64) -> Result<Vec<GameEvent>> {
        self.range(from, to, |s| &s.game_events)
    }

    async fn transfer_events(&self, from: u64, to: u64) -> Result<Vec<TransferEvent>> {
        self.range(from, to, |s| &s.transfers)
    }

    async fn game_by_id(&self, id: u64) -> Result<Option<ChainGame>> {
        self.with(|s| {
            if s.failing_games.contains(&id) {
                return Err(anyhow!("rate limited fetching game {}", id));
            }
            Ok(s.games.get(&id).cloned())
        })
    }

    async fn games_length(&self) -> Result<u64> {
        Ok(self.with(|s| s.games.keys().next_back().map_or(0, |last| last + 1)))
    }

    async fn posted_winner(&self, id: u64) -> Result<Option<Address>> {
        Ok(self.with(|s| s.posted_winners.get(&id).copied()))
    }
}
