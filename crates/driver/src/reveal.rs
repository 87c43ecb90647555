//! The reveal module is the write path for commit-reveal disclosures. It is called by the
//! presentation boundary once a player discloses their team.

use crate::{
    config::DriverConfig,
    resolution::{derive_profiles, resolve_record, Resolution},
    types::{canonical, normalize, GameRecord, Notification, NotificationKind, RevealPayload},
};
use battle_mirror_solvers::battle::{Side, ROUNDS};
use ethers::types::Address;
use serde_json::json;
use thiserror::Error;

/// Why a reveal was rejected.
#[derive(Error, Debug)]
pub enum RevealError {
    #[error("Game {0} is not known")]
    UnknownGame(u64),

    #[error("{address} is not a participant of game {game_id}")]
    NotParticipant { game_id: u64, address: String },

    #[error("Game {0} no longer accepts reveals")]
    GameClosed(u64),

    #[error("{address} already revealed for game {game_id}")]
    AlreadyRevealed { game_id: u64, address: String },

    #[error("Malformed reveal payload: {0}")]
    Malformed(String),

    #[error("Error persisting reveal: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// The result of an accepted reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealReceipt {
    /// Whether the team's traits were derived from metadata.
    pub traits_derived: bool,
    /// What the resolution attempt did.
    pub resolution: Resolution,
}

fn is_decimal(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Checks the shape of `payload` and rewrites its contracts in canonical form.
fn validate(payload: &mut RevealPayload) -> Result<(), RevealError> {
    if payload.nft_contracts.len() != ROUNDS || payload.token_ids.len() != ROUNDS {
        return Err(RevealError::Malformed(format!(
            "expected {} NFTs, got {} contracts and {} token ids",
            ROUNDS,
            payload.nft_contracts.len(),
            payload.token_ids.len()
        )));
    }
    if !is_decimal(&payload.salt) {
        return Err(RevealError::Malformed("salt must be a decimal integer".to_string()));
    }
    if let Some(token_id) = payload.token_ids.iter().find(|id| !is_decimal(id)) {
        return Err(RevealError::Malformed(format!(
            "token id `{}` is not a decimal integer",
            token_id
        )));
    }
    payload.nft_contracts = payload
        .nft_contracts
        .iter()
        .map(|contract| {
            contract
                .trim()
                .parse::<Address>()
                .map(|address| canonical(&address))
                .map_err(|_| RevealError::Malformed(format!("`{}` is not a contract address", contract)))
        })
        .collect::<Result<_, _>>()?;
    Ok(())
}

/// Checks that `address` may still reveal for `record`, returning the side it plays.
fn admit(record: &GameRecord, address: &str) -> Result<Side, RevealError> {
    let side = record
        .side_of(address)
        .ok_or_else(|| RevealError::NotParticipant {
            game_id: record.id,
            address: address.to_string(),
        })?;
    if record.is_closed() || record.is_resolved() {
        return Err(RevealError::GameClosed(record.id));
    }
    if record.reveal.contains_key(address) {
        return Err(RevealError::AlreadyRevealed {
            game_id: record.id,
            address: address.to_string(),
        });
    }
    Ok(side)
}

/// Records `payload` as the reveal of `address` in game `game_id`.
///
/// A reveal is written at most once per address and game. Team traits are derived from
/// metadata outside the record gate; a failed lookup keeps the reveal but leaves the game
/// unresolvable until a later reconciliation pass. The admission rules are checked again
/// under the gate before the reveal is written. Once both players have revealed, the game
/// is resolved.
pub async fn submit_reveal(
    config: &DriverConfig,
    game_id: u64,
    address: &str,
    mut payload: RevealPayload,
) -> Result<RevealReceipt, RevealError> {
    validate(&mut payload)?;
    let address = normalize(address);
    payload.team_traits = None;
    payload.backgrounds = None;

    {
        let records = config.records.acquire("reveal").await;
        let record = records.get(game_id).ok_or(RevealError::UnknownGame(game_id))?;
        admit(record, &address)?;
    }

    let traits_derived = match derive_profiles(&mut payload, config.traits.as_ref()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(target: "reveal", "Could not derive traits for {} in game {}: {:#}", address, game_id, e);
            false
        }
    };

    let mut records = config.records.acquire("reveal").await;
    let record = records.get_mut(game_id).ok_or(RevealError::UnknownGame(game_id))?;
    // The game may have moved on while the metadata was read.
    let side = admit(record, &address)?;

    record.reveal.insert(address.clone(), payload);
    record.mark_revealed(side);
    let resolution = if record.reveals().is_some() {
        resolve_record(record, config.traits.as_ref()).await
    } else {
        Resolution::Unchanged
    };
    let winner = record.winner.clone();
    records.persist().await?;
    drop(records);

    tracing::info!(target: "reveal", "Accepted reveal of {} for game {}", address, game_id);
    let _ = config.notifier.send(Notification {
        kind: NotificationKind::TeamRevealed,
        game_id,
        args: json!({ "player": address, "side": side }),
    });
    if let Resolution::Resolved(outcome) = &resolution {
        let _ = config.notifier.send(Notification {
            kind: NotificationKind::GameResolved,
            game_id,
            args: json!({
                "winner": winner,
                "tie": outcome.is_tie(),
                "roundResults": outcome.rounds,
            }),
        });
    }

    Ok(RevealReceipt {
        traits_derived,
        resolution,
    })
}
