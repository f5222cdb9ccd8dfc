use crate::battle::{BattleResult, Termination};
use serde::{Deserialize, Serialize};

pub const MAX_RATING: f64 = 1000.0;
pub const EVEN_RATING: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    /// Result for `side`. Knockouts decide directly; a timeout goes to the
    /// side with the higher rating.
    pub fn for_side(result: &BattleResult, side: usize) -> Self {
        match result.termination {
            Termination::DoubleFaint => Outcome::Tie,
            Termination::Faint => match result.winner() {
                Some(winner) if winner == side => Outcome::Win,
                Some(_) => Outcome::Loss,
                None => Outcome::Tie,
            },
            Termination::Timeout => {
                let mine = battle_rating(result, side);
                let theirs = battle_rating(result, 1 - side);
                if mine > theirs {
                    Outcome::Win
                } else if mine < theirs {
                    Outcome::Loss
                } else {
                    Outcome::Tie
                }
            }
        }
    }
}

/// Battle rating in 0..=1000 for one side.
///
/// Half of the scale comes from the remaining-HP differential, the other half
/// from damage dealt to the opponent.
pub fn battle_rating(result: &BattleResult, side: usize) -> f64 {
    let opponent = 1 - side;
    let health = 0.5 + (result.hp_fraction[side] - result.hp_fraction[opponent]) / 2.0;
    let rating = (health + result.damage_fraction[side]) * EVEN_RATING;
    rating.clamp(0.0, MAX_RATING)
}

/// Ratings for both sides of one battle.
pub fn pair_ratings(result: &BattleResult) -> [f64; 2] {
    [battle_rating(result, 0), battle_rating(result, 1)]
}
