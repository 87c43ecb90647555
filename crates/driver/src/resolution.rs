//! The resolution module connects revealed [GameRecord]s to the battle solver and holds the
//! single rule for applying a chain settlement to a record.

use crate::{
    metadata::TraitSource,
    types::{GameRecord, RevealPayload},
    utils::unix_now,
};
use anyhow::{anyhow, Result};
use battle_mirror_solvers::battle::{Battle, BattleOutcome, Team, TraitBattle, Traits, ROUNDS};

/// The result of attempting to resolve a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The outcome was computed and written to the record.
    Resolved(BattleOutcome),
    /// The record already carries an outcome, or is closed. Nothing was written.
    Unchanged,
    /// A payload or its metadata is missing. The record was left untouched.
    NotResolvable(String),
}

/// Fills in `team_traits`/`backgrounds` of `payload` from `traits`.
///
/// Any lookup failure leaves the payload without derived data and is returned as an error.
pub async fn derive_profiles(payload: &mut RevealPayload, traits: &dyn TraitSource) -> Result<()> {
    if payload.nft_contracts.len() != ROUNDS || payload.token_ids.len() != ROUNDS {
        return Err(anyhow!(
            "Reveal must name {} NFTs, got {} contracts and {} token ids",
            ROUNDS,
            payload.nft_contracts.len(),
            payload.token_ids.len()
        ));
    }

    let mut team = Vec::with_capacity(ROUNDS);
    let mut backgrounds = Vec::with_capacity(ROUNDS);
    for (contract, token_id) in payload.nft_contracts.iter().zip(&payload.token_ids) {
        let profile = traits.profile(contract, token_id).await?;
        team.push(profile.traits);
        backgrounds.push(profile.background.unwrap_or_default());
    }

    payload.team_traits = Some(team);
    payload.backgrounds = Some(backgrounds);
    Ok(())
}

fn team_of(payload: &RevealPayload) -> Result<Team> {
    let traits: &[Traits] = payload
        .team_traits
        .as_deref()
        .ok_or(anyhow!("Reveal has no derived team traits"))?;
    traits
        .try_into()
        .map_err(|_| anyhow!("Reveal carries {} traits, expected {}", traits.len(), ROUNDS))
}

/// Resolves `record` if both reveals are present and no outcome was recorded yet.
///
/// Payloads whose traits could not be derived when they were revealed get a second lookup
/// through `traits`. The record is only written on [Resolution::Resolved].
pub async fn resolve_record(record: &mut GameRecord, traits: &dyn TraitSource) -> Resolution {
    if record.is_resolved() || record.is_closed() {
        return Resolution::Unchanged;
    }
    let Some((p1, p2)) = record.reveals() else {
        return Resolution::NotResolvable(format!("Game {} is missing a reveal payload", record.id));
    };
    let (mut p1, mut p2) = (p1.clone(), p2.clone());

    for payload in [&mut p1, &mut p2] {
        if payload.team_traits.is_none() {
            if let Err(e) = derive_profiles(payload, traits).await {
                return Resolution::NotResolvable(format!("Game {}: {:#}", record.id, e));
            }
        }
    }
    let teams = team_of(&p1).and_then(|a| Ok((a, team_of(&p2)?)));
    let (team1, team2) = match teams {
        Ok(teams) => teams,
        Err(e) => return Resolution::NotResolvable(format!("Game {}: {}", record.id, e)),
    };

    let outcome = TraitBattle::new(team1, team2).resolve();
    if let (Some(a), Some(b)) = (record.player1.clone(), record.player2.clone()) {
        record.reveal.insert(a, p1);
        record.reveal.insert(b, p2);
    }
    apply_outcome(record, &outcome);
    tracing::info!(target: "resolution", "Resolved game {}: winner {:?}, points {:?}", record.id, record.winner, outcome.points);
    Resolution::Resolved(outcome)
}

fn apply_outcome(record: &mut GameRecord, outcome: &BattleOutcome) {
    record.winner = outcome
        .winner
        .and_then(|side| record.address_of(side).map(str::to_string));
    record.tie = outcome.is_tie();
    record.round_results = outcome.rounds.to_vec();
    record.settled_at.get_or_insert_with(unix_now);
}

/// Applies a chain-confirmed settlement to `record`.
///
/// A non-zero `posted_winner` is recorded as the winner. Without one the game is marked
/// cancelled with no winner. The posted value confirms the local outcome; a disagreement is
/// logged and the chain value kept.
pub fn apply_chain_settlement(record: &mut GameRecord, posted_winner: Option<String>, at: u64) {
    record.settled = true;
    record.settled_at.get_or_insert(at);

    match posted_winner {
        Some(winner) => {
            if record.is_resolved() && record.winner.as_deref() != Some(winner.as_str()) {
                tracing::warn!(
                    target: "resolution",
                    "Posted winner {} for game {} disagrees with local outcome {:?}",
                    winner,
                    record.id,
                    record.winner
                );
            }
            record.winner = Some(winner);
            record.tie = false;
            record.cancelled = false;
        }
        None => {
            // Refunded on-chain. A locally computed tie keeps its flag and round results.
            record.winner = None;
            if !record.cancelled {
                record.cancelled = true;
                record.cancelled_at.get_or_insert(at);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{metadata::test::StaticTraits, types::GameState};
    use battle_mirror_solvers::battle::{RoundWinner, Side};

    pub(crate) fn payload(traits: [i64; 5]) -> RevealPayload {
        RevealPayload {
            salt: "340282366920938463463374607431768211455".into(),
            nft_contracts: vec!["0xc1".into(); ROUNDS],
            token_ids: vec!["1".into(), "2".into(), "3".into()],
            team_traits: Some(vec![Traits::from(traits); ROUNDS]),
            backgrounds: None,
        }
    }

    fn revealed_record(p1: RevealPayload, p2: RevealPayload) -> GameRecord {
        let mut record = GameRecord::new(9);
        record.player1 = Some("0xaa".into());
        record.player2 = Some("0xbb".into());
        record.player1_revealed = true;
        record.player2_revealed = true;
        record.reveal.insert("0xaa".into(), p1);
        record.reveal.insert("0xbb".into(), p2);
        record
    }

    #[tokio::test]
    async fn resolves_by_hand_scenario() {
        let mut record = revealed_record(payload([5, 3, 2, 4, 1]), payload([1, 5, 3, 2, 5]));
        let resolution = resolve_record(&mut record, &StaticTraits::default()).await;

        assert!(matches!(resolution, Resolution::Resolved(_)));
        assert_eq!(record.winner.as_deref(), Some("0xbb"));
        assert_eq!(record.side_of("0xbb"), Some(Side::Player2));
        assert!(!record.tie);
        assert_eq!(record.round_results.len(), ROUNDS);
        assert!(record
            .round_results
            .iter()
            .all(|r| r.winner == RoundWinner::Player2 && r.diff == -3));
        assert!(record.settled_at.is_some());
        assert!(record.is_consistent());

        // A second call never re-applies the outcome.
        let snapshot = record.clone();
        assert_eq!(
            resolve_record(&mut record, &StaticTraits::default()).await,
            Resolution::Unchanged
        );
        assert_eq!(record, snapshot);
    }

    #[tokio::test]
    async fn equal_teams_resolve_to_tie() {
        let mut record = revealed_record(payload([4, 4, 4, 4, 4]), payload([4, 4, 4, 4, 4]));
        resolve_record(&mut record, &StaticTraits::default()).await;
        assert!(record.tie);
        assert_eq!(record.winner, None);
        assert!(record.round_results.iter().all(|r| r.diff == 0));
    }

    #[tokio::test]
    async fn missing_metadata_leaves_record_untouched() {
        let mut p2 = payload([1, 1, 1, 1, 1]);
        p2.team_traits = None;
        let mut record = revealed_record(payload([5, 3, 2, 4, 1]), p2);
        let before = record.clone();

        let resolution = resolve_record(&mut record, &StaticTraits::default()).await;
        assert!(matches!(resolution, Resolution::NotResolvable(_)));
        assert_eq!(record, before);
    }

    #[tokio::test]
    async fn retries_metadata_lookup_at_resolution() {
        let mut p2 = payload([0; 5]);
        p2.team_traits = None;
        let mut record = revealed_record(payload([5, 3, 2, 4, 1]), p2);

        let mut traits = StaticTraits::default();
        for id in ["1", "2", "3"] {
            traits
                .0
                .insert(("0xc1".into(), id.into()), Traits::new(1, 5, 3, 2, 5));
        }
        let resolution = resolve_record(&mut record, &traits).await;
        assert!(matches!(resolution, Resolution::Resolved(_)));
        assert_eq!(record.winner.as_deref(), Some("0xbb"));
        assert!(record.reveal["0xbb"].team_traits.is_some());
    }

    #[test]
    fn chain_settlement_rules() {
        let mut record = GameRecord::new(1);
        record.player1 = Some("0xaa".into());
        record.player2 = Some("0xbb".into());

        let mut won = record.clone();
        apply_chain_settlement(&mut won, Some("0xaa".into()), 50);
        assert!(won.settled && !won.cancelled && !won.tie);
        assert_eq!(won.winner.as_deref(), Some("0xaa"));
        assert_eq!(won.settled_at, Some(50));

        let mut refunded = record.clone();
        apply_chain_settlement(&mut refunded, None, 50);
        assert!(refunded.settled && refunded.cancelled);
        assert_eq!(refunded.winner, None);

        let mut drawn = record;
        drawn.tie = true;
        drawn.round_results = vec![
            battle_mirror_solvers::battle::RoundResult {
                round: 1,
                winner: RoundWinner::Tie,
                diff: 0
            };
            ROUNDS
        ];
        apply_chain_settlement(&mut drawn, None, 50);
        assert!(drawn.settled && drawn.cancelled && drawn.tie);
        assert_eq!(drawn.winner, None);
        assert_eq!(drawn.cancelled_at, Some(50));
        assert_eq!(drawn.state(), GameState::Cancelled);
        assert!(drawn.is_consistent());

        // Re-applying is a no-op.
        let again = drawn.clone();
        apply_chain_settlement(&mut drawn, None, 99);
        assert_eq!(drawn, again);
    }
}
