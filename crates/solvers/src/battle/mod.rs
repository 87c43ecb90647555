//! Data structures, types, and the resolution logic for the commit-reveal trait battle.

mod types;
pub use types::*;

mod round;
pub use round::{round_modifier, round_result, tiebreak_total};

mod game;
pub use game::{Battle, TraitBattle};
