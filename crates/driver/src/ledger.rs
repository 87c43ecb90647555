//! The ledger module defines the read boundary to the authoritative chain state.

use crate::{
    bindings::BattleArena,
    events::{GameEvent, TransferEvent, TRANSFER_SIGNATURE},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    contract::ContractError,
    providers::Middleware,
    types::{Address, Filter, ValueOrArray, U256},
};
use std::sync::Arc;

/// The authoritative on-chain view of a single game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainGame {
    pub player1: Address,
    pub player2: Address,
    pub stake_token: Address,
    pub stake_amount: U256,
    pub settled: bool,
    pub cancelled: bool,
    pub winner: Address,
    pub player1_revealed: bool,
    pub player2_revealed: bool,
}

impl ChainGame {
    /// Whether the ledger holds a participant for this game.
    pub fn is_populated(&self) -> bool {
        !self.player1.is_zero()
    }
}

/// The [Ledger] trait defines every read the mirror makes against the chain.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The current chain height.
    async fn current_height(&self) -> Result<u64>;

    /// All game contract events within `[from, to]`, in log order.
    async fn game_events(&self, from: u64, to: u64) -> Result<Vec<GameEvent>>;

    /// All asset ledger `Transfer` events within `[from, to]`, in log order.
    async fn transfer_events(&self, from: u64, to: u64) -> Result<Vec<TransferEvent>>;

    /// The on-chain record of game `id`, or `None` if the ledger does not know it.
    async fn game_by_id(&self, id: u64) -> Result<Option<ChainGame>>;

    /// The authoritative number of games.
    async fn games_length(&self) -> Result<u64>;

    /// The winner posted on-chain by the settlement backend, `None` if unset or zero.
    async fn posted_winner(&self, id: u64) -> Result<Option<Address>>;
}

/// The [EthersLedger] reads the game contract and the asset collections through an
/// [ethers] [Middleware].
pub struct EthersLedger<M> {
    provider: Arc<M>,
    arena: BattleArena<M>,
    collections: Vec<Address>,
}

impl<M: Middleware> EthersLedger<M> {
    /// Creates a new [EthersLedger] for the game contract at `game_contract` and the asset
    /// ledgers at `collections`.
    pub fn new(provider: Arc<M>, game_contract: Address, collections: Vec<Address>) -> Self {
        Self {
            arena: BattleArena::new(game_contract, Arc::clone(&provider)),
            provider,
            collections,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> Ledger for EthersLedger<M> {
    async fn current_height(&self) -> Result<u64> {
        let height = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("Error fetching block number: {}", e))?;
        Ok(height.as_u64())
    }

    async fn game_events(&self, from: u64, to: u64) -> Result<Vec<GameEvent>> {
        let filter = Filter::new()
            .address(self.arena.address())
            .from_block(from)
            .to_block(to);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| anyhow!("Error fetching game logs {}..={}: {}", from, to, e))?;

        Ok(logs
            .iter()
            .filter_map(|log| match GameEvent::decode(log) {
                Ok(event) => Some(event),
                Err(e) => {
                    // Soft failure, drop the log and continue.
                    tracing::warn!(target: "ledger", "Dropping undecodable game log {:?}: {}", log.transaction_hash, e);
                    None
                }
            })
            .collect())
    }

    async fn transfer_events(&self, from: u64, to: u64) -> Result<Vec<TransferEvent>> {
        if self.collections.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .address(ValueOrArray::Array(self.collections.clone()))
            .event(TRANSFER_SIGNATURE)
            .from_block(from)
            .to_block(to);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| anyhow!("Error fetching transfer logs {}..={}: {}", from, to, e))?;

        Ok(logs
            .iter()
            .filter_map(|log| match TransferEvent::decode(log) {
                Ok(event) => Some(event),
                Err(e) => {
                    // ERC-20 transfers share the signature but carry the amount in data.
                    tracing::debug!(target: "ledger", "Skipping non ERC-721 transfer log: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn game_by_id(&self, id: u64) -> Result<Option<ChainGame>> {
        match self.arena.games(U256::from(id)).call().await {
            Ok((
                player1,
                player2,
                stake_token,
                stake_amount,
                settled,
                cancelled,
                winner,
                player1_revealed,
                player2_revealed,
            )) => Ok(Some(ChainGame {
                player1,
                player2,
                stake_token,
                stake_amount,
                settled,
                cancelled,
                winner,
                player1_revealed,
                player2_revealed,
            })),
            // Out of range ids revert.
            Err(ContractError::Revert(_)) => Ok(None),
            Err(e) => Err(anyhow!("Error fetching game {}: {}", id, e)),
        }
    }

    async fn games_length(&self) -> Result<u64> {
        let length = self
            .arena
            .games_length()
            .call()
            .await
            .map_err(|e| anyhow!("Error fetching games length: {}", e))?;
        if length > U256::from(u64::MAX) {
            return Err(anyhow!("Games length does not fit a game id: {}", length));
        }
        Ok(length.as_u64())
    }

    async fn posted_winner(&self, id: u64) -> Result<Option<Address>> {
        let winner = self
            .arena
            .game_winner(U256::from(id))
            .call()
            .await
            .map_err(|e| anyhow!("Error fetching posted winner for game {}: {}", id, e))?;
        Ok((!winner.is_zero()).then_some(winner))
    }
}
