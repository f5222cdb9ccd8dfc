use crate::battle::compute_damage;
use crate::model::MoveDef;
use crate::profile::{CombatProfile, StatStages};
use std::cmp::Reverse;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Fast,
    /// Index into the profile's charged moves.
    Charged(usize),
    Wait,
}

/// What one side can observe about itself or its opponent.
#[derive(Clone, Copy, Debug)]
pub struct SideView<'a> {
    pub profile: &'a CombatProfile,
    pub hp: u32,
    pub energy: u32,
    pub shields: u8,
    pub cooldown: u32,
    pub stages: StatStages,
}

#[derive(Clone, Copy, Debug)]
pub struct DecisionView<'a> {
    pub turn: u32,
    pub me: SideView<'a>,
    pub opponent: SideView<'a>,
    pub damage_bonus: f64,
}

impl DecisionView<'_> {
    pub fn damage_to_opponent(&self, mv: &MoveDef) -> u32 {
        compute_damage(
            self.me.profile,
            self.me.stages,
            self.opponent.profile,
            self.opponent.stages,
            mv,
            self.damage_bonus,
        )
    }

    pub fn damage_from_opponent(&self, mv: &MoveDef) -> u32 {
        compute_damage(
            self.opponent.profile,
            self.opponent.stages,
            self.me.profile,
            self.me.stages,
            mv,
            self.damage_bonus,
        )
    }

    /// Charged move indices the deciding side can pay for right now.
    pub fn affordable(&self) -> Vec<usize> {
        self.me
            .profile
            .charged_moves
            .iter()
            .enumerate()
            .filter(|(_, m)| self.me.energy >= m.energy)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// A charged move about to hit; `view` is from the defender's side.
#[derive(Clone, Copy, Debug)]
pub struct IncomingAttack<'a> {
    pub view: DecisionView<'a>,
    pub move_def: &'a MoveDef,
    pub damage: u32,
}

pub trait ActionPolicy: Send + Sync {
    fn choose_action(&self, view: &DecisionView<'_>) -> Action;
    fn should_shield(&self, incoming: &IncomingAttack<'_>) -> bool;
}

/// Deterministic shield/bait policy used for rankings.
#[derive(Clone, Debug)]
pub struct StandardPolicy {
    /// Shield when incoming damage exceeds this share of current HP.
    pub shield_threshold: f64,
    /// Throw the cheaper charged move first while the opponent has shields.
    pub baiting: bool,
}

impl Default for StandardPolicy {
    fn default() -> Self {
        Self {
            shield_threshold: 0.25,
            baiting: true,
        }
    }
}

impl StandardPolicy {
    fn in_danger(&self, view: &DecisionView<'_>) -> bool {
        let me = &view.me;
        let opp = &view.opponent;
        if view.damage_from_opponent(&opp.profile.fast_move) >= me.hp {
            return true;
        }
        me.shields == 0
            && opp
                .profile
                .charged_moves
                .iter()
                .any(|m| opp.energy >= m.energy && view.damage_from_opponent(m) >= me.hp)
    }
}

impl ActionPolicy for StandardPolicy {
    fn choose_action(&self, view: &DecisionView<'_>) -> Action {
        let affordable = view.affordable();
        if affordable.is_empty() {
            return Action::Fast;
        }
        let moves = &view.me.profile.charged_moves;
        let opp_hp = view.opponent.hp;
        if view.damage_to_opponent(&view.me.profile.fast_move) >= opp_hp {
            return Action::Fast;
        }
        let damage: Vec<u32> = moves.iter().map(|m| view.damage_to_opponent(m)).collect();

        if view.opponent.shields == 0 {
            let lethal = affordable
                .iter()
                .copied()
                .filter(|&i| damage[i] >= opp_hp)
                .min_by_key(|&i| (moves[i].energy, i));
            if let Some(i) = lethal {
                return Action::Charged(i);
            }
        }
        if self.in_danger(view) {
            return Action::Charged(hardest_hitting(&affordable, &damage, |i| moves[i].energy));
        }
        if view.opponent.shields > 0 && self.baiting {
            return Action::Charged(cheapest(&affordable, &damage, |i| moves[i].energy));
        }

        let all: Vec<usize> = (0..moves.len()).collect();
        let strongest = hardest_hitting(&all, &damage, |i| moves[i].energy);
        if view.me.energy >= moves[strongest].energy {
            Action::Charged(strongest)
        } else {
            Action::Fast
        }
    }

    fn should_shield(&self, incoming: &IncomingAttack<'_>) -> bool {
        let hp = incoming.view.me.hp;
        if incoming.damage >= hp {
            return true;
        }
        incoming.damage as f64 > self.shield_threshold * hp as f64
    }
}

// Candidates are never empty at the call sites.
fn hardest_hitting(candidates: &[usize], damage: &[u32], cost: impl Fn(usize) -> u32) -> usize {
    candidates
        .iter()
        .copied()
        .max_by_key(|&i| (damage[i], Reverse(cost(i)), Reverse(i)))
        .unwrap_or(0)
}

fn cheapest(candidates: &[usize], damage: &[u32], cost: impl Fn(usize) -> u32) -> usize {
    candidates
        .iter()
        .copied()
        .min_by_key(|&i| (cost(i), Reverse(damage[i]), i))
        .unwrap_or(0)
}
