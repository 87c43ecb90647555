//! The round module resolves a single round between two [Traits].

use super::{RoundResult, RoundWinner, Traits};
use std::cmp::Ordering;

/// Computes the round modifier of `defender` when hit by `attacker`.
///
/// `damage = max(0, offense(attacker) - guard(defender))` and the modifier is
/// `max(0, core(defender) - damage)`.
pub fn round_modifier(defender: &Traits, attacker: &Traits) -> i64 {
    let damage = attacker.offense().saturating_sub(defender.guard()).max(0);
    defender.core.saturating_sub(damage).max(0)
}

/// The tie-break total used when both modifiers are equal: the sum of every trait but `core`.
pub fn tiebreak_total(traits: &Traits) -> i64 {
    traits.offense().saturating_add(traits.guard())
}

/// Resolves round `round` (1-based) between `a` (player 1) and `b` (player 2).
///
/// ### Takes
/// - `round`: The 1-based round number, recorded as-is in the result.
/// - `a`: The traits player 1 fields this round.
/// - `b`: The traits player 2 fields this round.
///
/// ### Returns
/// - `RoundResult`: The round winner and the modifier gap `mod_a - mod_b`.
pub fn round_result(round: u8, a: &Traits, b: &Traits) -> RoundResult {
    let mod_a = round_modifier(a, b);
    let mod_b = round_modifier(b, a);

    let ordering = match mod_a.cmp(&mod_b) {
        Ordering::Equal => tiebreak_total(a).cmp(&tiebreak_total(b)),
        decided => decided,
    };
    let winner = match ordering {
        Ordering::Greater => RoundWinner::Player1,
        Ordering::Less => RoundWinner::Player2,
        Ordering::Equal => RoundWinner::Tie,
    };

    RoundResult {
        round,
        winner,
        // Both modifiers are non-negative, so the gap cannot overflow.
        diff: mod_a - mod_b,
    }
}
