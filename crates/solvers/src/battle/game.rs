//! The game module holds the [Battle] trait and the [TraitBattle] resolver.

use super::{round_result, BattleOutcome, RoundResult, RoundWinner, Side, Team, ROUNDS};
use anyhow::{anyhow, Result};
use std::cmp::Ordering;

/// The [Battle] trait defines the interface for a fully revealed battle between two teams.
pub trait Battle {
    /// Resolve a single round.
    ///
    /// ### Takes
    /// - `index`: The 0-based round index.
    ///
    /// ### Returns
    /// - `Ok(RoundResult)`: The outcome of the round.
    /// - `Err(anyhow::Error)`: The index is past the last round.
    fn round(&self, index: usize) -> Result<RoundResult>;

    /// Resolve the whole battle.
    ///
    /// Resolution is referentially transparent: the same teams always produce the same
    /// [BattleOutcome]. Applying the outcome exactly once is the caller's job.
    fn resolve(&self) -> BattleOutcome;
}

/// A [TraitBattle] pits two revealed teams against each other, one NFT per round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitBattle {
    /// The team revealed by player 1.
    pub player1: Team,
    /// The team revealed by player 2.
    pub player2: Team,
}

impl TraitBattle {
    /// Creates a new [TraitBattle] from both revealed teams.
    pub fn new(player1: Team, player2: Team) -> Self {
        Self { player1, player2 }
    }
}

impl Battle for TraitBattle {
    fn round(&self, index: usize) -> Result<RoundResult> {
        let a = self
            .player1
            .get(index)
            .ok_or(anyhow!("Invalid round index {index}"))?;
        let b = &self.player2[index];
        Ok(round_result(index as u8 + 1, a, b))
    }

    fn resolve(&self) -> BattleOutcome {
        let rounds: [RoundResult; ROUNDS] = std::array::from_fn(|i| {
            round_result(i as u8 + 1, &self.player1[i], &self.player2[i])
        });

        let mut points = (0u8, 0u8);
        let mut total_diff = 0i64;
        for round in &rounds {
            match round.winner {
                RoundWinner::Player1 => points.0 += 1,
                RoundWinner::Player2 => points.1 += 1,
                RoundWinner::Tie => {}
            }
            total_diff = total_diff.saturating_add(round.diff);
        }

        // More round points wins; equal points fall back to the accumulated modifier gap.
        let ordering = match points.0.cmp(&points.1) {
            Ordering::Equal => total_diff.cmp(&0),
            decided => decided,
        };
        let winner = match ordering {
            Ordering::Greater => Some(Side::Player1),
            Ordering::Less => Some(Side::Player2),
            Ordering::Equal => None,
        };

        tracing::trace!(
            target: "battle-solver",
            "Resolved battle: points {:?}, total diff {}, winner {:?}",
            points,
            total_diff,
            winner
        );

        BattleOutcome {
            winner,
            rounds,
            points,
            total_diff,
        }
    }
}
