//! The types module contains all of the types relevant to the trait battle.

use serde::{Deserialize, Serialize};

/// The number of rounds in a battle. Each side fields one NFT per round.
pub const ROUNDS: usize = 3;

/// The [Traits] struct holds the five battle traits of a single NFT, in the order
/// `[attack, defense, vitality, agility, core]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Traits {
    pub attack: i64,
    pub defense: i64,
    pub vitality: i64,
    pub agility: i64,
    pub core: i64,
}

impl Traits {
    /// Creates a new [Traits] from the `[attack, defense, vitality, agility, core]` tuple.
    pub const fn new(attack: i64, defense: i64, vitality: i64, agility: i64, core: i64) -> Self {
        Self {
            attack,
            defense,
            vitality,
            agility,
            core,
        }
    }

    /// Offensive power: `attack + agility`, saturating at the `i64` bounds.
    pub fn offense(&self) -> i64 {
        self.attack.saturating_add(self.agility)
    }

    /// Defensive power: `defense + vitality`, saturating at the `i64` bounds.
    pub fn guard(&self) -> i64 {
        self.defense.saturating_add(self.vitality)
    }
}

impl From<[i64; 5]> for Traits {
    fn from(t: [i64; 5]) -> Self {
        Self::new(t[0], t[1], t[2], t[3], t[4])
    }
}

/// A [Team] is the ordered triple of NFTs a player revealed. Index `i` fights in round `i + 1`.
pub type Team = [Traits; ROUNDS];

/// One of the two participants of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    /// Returns the opposing [Side].
    pub fn opponent(self) -> Self {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }
}

/// The winner of a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundWinner {
    Player1,
    Player2,
    Tie,
}

impl RoundWinner {
    /// Returns the [RoundWinner] as seen with the two sides swapped.
    pub fn swapped(self) -> Self {
        match self {
            RoundWinner::Player1 => RoundWinner::Player2,
            RoundWinner::Player2 => RoundWinner::Player1,
            RoundWinner::Tie => RoundWinner::Tie,
        }
    }
}

impl From<Side> for RoundWinner {
    fn from(side: Side) -> Self {
        match side {
            Side::Player1 => RoundWinner::Player1,
            Side::Player2 => RoundWinner::Player2,
        }
    }
}

/// The [RoundResult] struct is the outcome of one round of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// The 1-based round number.
    pub round: u8,
    /// Who took the round.
    pub winner: RoundWinner,
    /// The round modifier gap, `mod_player1 - mod_player2`.
    pub diff: i64,
}

/// The [BattleOutcome] struct is the full, deterministic result of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    /// The winning side, or `None` for a tie.
    pub winner: Option<Side>,
    /// Per-round results, in round order.
    pub rounds: [RoundResult; ROUNDS],
    /// Round points taken by `(player1, player2)`.
    pub points: (u8, u8),
    /// Accumulated `diff` over all rounds.
    pub total_diff: i64,
}

impl BattleOutcome {
    /// Whether the battle ended in a tie.
    pub fn is_tie(&self) -> bool {
        self.winner.is_none()
    }
}
