//! The types module contains the off-chain mirror of a game and its reveal payloads.

use battle_mirror_solvers::battle::{RoundResult, Side, Traits};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Renders an [Address] in its canonical lower-cased, fully expanded hex form.
pub fn canonical(address: &Address) -> String {
    format!("{address:?}")
}

/// Canonicalises a participant address, mapping the zero address to `None`.
pub fn participant(address: &Address) -> Option<String> {
    (!address.is_zero()).then(|| canonical(address))
}

/// Lower-cases a user-supplied address string so it compares against canonical addresses.
pub fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// The lifecycle state of a [GameRecord], derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    AwaitingPlayer2,
    AwaitingReveals,
    AwaitingSettlement,
    Settled,
    Cancelled,
}

/// The [RevealPayload] a player discloses for the commit-reveal phase of a game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealPayload {
    /// The commitment salt, kept as a decimal string to avoid precision loss.
    pub salt: String,
    /// The NFT contract of each team member, in round order.
    pub nft_contracts: Vec<String>,
    /// The token id of each team member, in round order.
    pub token_ids: Vec<String>,
    /// Battle traits derived from token metadata, if the lookup succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_traits: Option<Vec<Traits>>,
    /// Backgrounds derived from token metadata, if the lookup succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backgrounds: Option<Vec<String>>,
}

/// The [GameRecord] struct is the local mirror of one on-chain game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: u64,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub stake_token: Option<String>,
    /// Wei-precision integer as a decimal string. Never parsed as a float.
    pub stake_amount: String,
    pub created_at: Option<u64>,
    pub player2_joined_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub settled_at: Option<u64>,
    pub cancelled: bool,
    pub settled: bool,
    pub player1_revealed: bool,
    pub player2_revealed: bool,
    /// Pending reveal payloads keyed by canonical participant address.
    #[serde(default)]
    pub reveal: BTreeMap<String, RevealPayload>,
    pub winner: Option<String>,
    #[serde(default)]
    pub round_results: Vec<RoundResult>,
    pub tie: bool,
}

impl GameRecord {
    /// Creates an empty [GameRecord] for `id`.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            stake_amount: "0".to_string(),
            ..Default::default()
        }
    }

    /// Derives the lifecycle [GameState] of the record.
    pub fn state(&self) -> GameState {
        if self.cancelled {
            GameState::Cancelled
        } else if self.settled {
            GameState::Settled
        } else if self.player2.is_none() {
            GameState::AwaitingPlayer2
        } else if self.is_resolved() || (self.player1_revealed && self.player2_revealed) {
            GameState::AwaitingSettlement
        } else {
            GameState::AwaitingReveals
        }
    }

    /// Whether the game can no longer accept reveals.
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), GameState::Settled | GameState::Cancelled)
    }

    /// Whether the resolution engine has already produced round results for this record.
    pub fn is_resolved(&self) -> bool {
        !self.round_results.is_empty()
    }

    /// Maps a canonical address to the [Side] it plays, if any.
    pub fn side_of(&self, address: &str) -> Option<Side> {
        if self.player1.as_deref() == Some(address) {
            Some(Side::Player1)
        } else if self.player2.as_deref() == Some(address) {
            Some(Side::Player2)
        } else {
            None
        }
    }

    /// The canonical address playing `side`.
    pub fn address_of(&self, side: Side) -> Option<&str> {
        match side {
            Side::Player1 => self.player1.as_deref(),
            Side::Player2 => self.player2.as_deref(),
        }
    }

    /// Both reveal payloads, in `(player1, player2)` order, if both are present.
    pub fn reveals(&self) -> Option<(&RevealPayload, &RevealPayload)> {
        let p1 = self.reveal.get(self.player1.as_deref()?)?;
        let p2 = self.reveal.get(self.player2.as_deref()?)?;
        Some((p1, p2))
    }

    /// Sets the reveal flag for `side`. Flags are monotonic and never cleared.
    pub fn mark_revealed(&mut self, side: Side) {
        match side {
            Side::Player1 => self.player1_revealed = true,
            Side::Player2 => self.player2_revealed = true,
        }
    }

    /// Checks the outcome invariants: at most one of `winner`/`tie`, a joined timestamp only
    /// with a second player, and reveal entries only for participants.
    pub fn is_consistent(&self) -> bool {
        let outcome_ok = !(self.winner.is_some() && self.tie);
        let join_ok = self.player2_joined_at.is_none() || self.player2.is_some();
        let reveal_ok = self.reveal.keys().all(|k| self.side_of(k).is_some());
        outcome_ok && join_ok && reveal_ok
    }
}

/// The kind of mutation a [Notification] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    GameCreated,
    PlayerJoined,
    GameCancelled,
    GameSettled,
    TeamRevealed,
    GameResolved,
}

/// An out-of-band notification published after an accepted mutation has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub game_id: u64,
    pub args: serde_json::Value,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_addresses_are_lowercase_hex() {
        let address: Address = "0x00000000000000000000000000000000000000AB".parse().unwrap();
        assert_eq!(
            canonical(&address),
            "0x00000000000000000000000000000000000000ab"
        );
        assert_eq!(participant(&Address::zero()), None);
        assert_eq!(normalize(" 0xABcd "), "0xabcd");
    }

    #[test]
    fn state_follows_lifecycle() {
        let mut record = GameRecord::new(3);
        record.player1 = Some("0xaa".into());
        assert_eq!(record.state(), GameState::AwaitingPlayer2);

        record.player2 = Some("0xbb".into());
        assert_eq!(record.state(), GameState::AwaitingReveals);

        record.mark_revealed(Side::Player1);
        record.mark_revealed(Side::Player2);
        assert_eq!(record.state(), GameState::AwaitingSettlement);

        record.settled = true;
        assert_eq!(record.state(), GameState::Settled);
        assert!(record.is_closed());

        record.cancelled = true;
        assert_eq!(record.state(), GameState::Cancelled);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut record = GameRecord::new(1);
        record.player2_joined_at = Some(10);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["player2JoinedAt"], 10);
        assert_eq!(json["stakeAmount"], "0");
        assert_eq!(json["player1Revealed"], false);
    }

    #[test]
    fn reveal_for_stranger_is_inconsistent() {
        let mut record = GameRecord::new(1);
        record.player1 = Some("0xaa".into());
        assert!(record.is_consistent());
        record
            .reveal
            .insert("0xcc".into(), RevealPayload::default());
        assert!(!record.is_consistent());
    }
}
