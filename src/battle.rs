use crate::battle_log::{LogEvent, Phase, SideSnapshot, TurnLog};
use crate::error::{Error, Result};
use crate::model::{MoveDef, MoveEffect};
use crate::policy::{Action, ActionPolicy, DecisionView, IncomingAttack, SideView, StandardPolicy};
use crate::profile::{CombatProfile, StatStages};
use crate::types::type_effectiveness;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_ENERGY: u32 = 100;
pub const MAX_SHIELDS: u8 = 2;
pub const STAB_MULTIPLIER: f64 = 1.2;
/// Four minutes of half-second turns.
pub const DEFAULT_MAX_TURNS: u32 = 480;
const STAGE_DIVISOR: f64 = 4.0;

fn default_weight() -> f64 {
    1.0
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

/// Starting conditions for one battle. Index 0 is the combatant being rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub slug: String,
    pub shields: [u8; 2],
    /// Head start per side, counted in fast moves.
    #[serde(default)]
    pub energy: [u8; 2],
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl Scenario {
    pub fn new(shields: [u8; 2], energy: [u8; 2]) -> Self {
        Self {
            slug: String::new(),
            shields,
            energy,
            weight: 1.0,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn is_symmetric(&self) -> bool {
        self.shields[0] == self.shields[1] && self.energy[0] == self.energy[1]
    }

    /// Same scenario seen from side 1.
    pub fn mirrored(&self) -> Self {
        Self {
            slug: self.slug.clone(),
            shields: [self.shields[1], self.shields[0]],
            energy: [self.energy[1], self.energy[0]],
            weight: self.weight,
            max_turns: self.max_turns,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.shields.iter().any(|&s| s > MAX_SHIELDS) {
            return Err(Error::config(format!(
                "scenario '{}' allots {:?} shields; at most {MAX_SHIELDS} per side",
                self.slug, self.shields
            )));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(Error::config(format!(
                "scenario '{}' has weight {}; weights must be positive",
                self.slug, self.weight
            )));
        }
        if self.max_turns == 0 {
            return Err(Error::config(format!(
                "scenario '{}' allows zero turns",
                self.slug
            )));
        }
        Ok(())
    }
}

/// Order of two charged moves thrown on the same turn by attackers with equal
/// attack stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpTieBreak {
    #[default]
    Simultaneous,
    SideA,
    SideB,
}

/// How effect chances below 100% are treated. Battles stay deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffRoll {
    #[default]
    GuaranteedOnly,
    Always,
    Never,
}

impl BuffRoll {
    fn applies(self, chance: f64) -> bool {
        match self {
            BuffRoll::GuaranteedOnly => chance >= 1.0,
            BuffRoll::Always => chance > 0.0,
            BuffRoll::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleOptions {
    pub damage_bonus: f64,
    pub cmp_tie_break: CmpTieBreak,
    pub buff_roll: BuffRoll,
    pub record_log: bool,
}

impl Default for BattleOptions {
    fn default() -> Self {
        Self {
            damage_bonus: 1.3,
            cmp_tie_break: CmpTieBreak::default(),
            buff_roll: BuffRoll::default(),
            record_log: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Faint,
    DoubleFaint,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleResult {
    pub termination: Termination,
    pub turns: u32,
    pub hp: [u32; 2],
    pub max_hp: [u32; 2],
    pub hp_fraction: [f64; 2],
    /// Share of the opponent's max HP removed by each side.
    pub damage_fraction: [f64; 2],
    pub fainted: [bool; 2],
    pub shields_used: [u8; 2],
    pub energy: [u32; 2],
    pub charged_thrown: [u32; 2],
    pub log: Option<TurnLog>,
}

impl BattleResult {
    /// Index of the side that won outright, if any.
    pub fn winner(&self) -> Option<usize> {
        match self.fainted {
            [false, true] => Some(0),
            [true, false] => Some(1),
            _ => None,
        }
    }
}

pub fn stage_multiplier(stage: i8) -> f64 {
    let stage = stage.clamp(StatStages::MIN, StatStages::MAX) as f64;
    if stage >= 0.0 {
        (STAGE_DIVISOR + stage) / STAGE_DIVISOR
    } else {
        STAGE_DIVISOR / (STAGE_DIVISOR - stage)
    }
}

/// Damage of `mv` from `attacker` to `defender`; always at least 1.
pub fn compute_damage(
    attacker: &CombatProfile,
    attacker_stages: StatStages,
    defender: &CombatProfile,
    defender_stages: StatStages,
    mv: &MoveDef,
    bonus: f64,
) -> u32 {
    let attack = attacker.attack * stage_multiplier(attacker_stages.attack);
    let defense = defender.defense * stage_multiplier(defender_stages.defense);
    let effectiveness = type_effectiveness(mv.move_type, &defender.types);
    let stab = if attacker.has_type(mv.move_type) {
        STAB_MULTIPLIER
    } else {
        1.0
    };
    let raw = 0.5 * mv.power as f64 * (attack / defense) * effectiveness * stab * bonus;
    raw.floor() as u32 + 1
}

fn add_deltas(total: &mut [(i8, i8); 2], more: [(i8, i8); 2]) {
    for (t, m) in total.iter_mut().zip(more) {
        t.0 = t.0.saturating_add(m.0);
        t.1 = t.1.saturating_add(m.1);
    }
}

#[derive(Debug, Clone)]
struct Combatant<'a> {
    profile: &'a CombatProfile,
    hp: u32,
    energy: u32,
    shields: u8,
    shields_used: u8,
    cooldown: u32,
    locked: bool,
    stages: StatStages,
    charged_thrown: u32,
}

impl<'a> Combatant<'a> {
    fn new(profile: &'a CombatProfile, shields: u8, head_start: u8) -> Self {
        let energy = (profile.fast_move.energy * head_start as u32).min(MAX_ENERGY);
        Self {
            profile,
            hp: profile.hp,
            energy,
            shields,
            shields_used: 0,
            cooldown: 0,
            locked: false,
            stages: profile.start_stages,
            charged_thrown: 0,
        }
    }

    fn phase(&self) -> Phase {
        if self.locked {
            Phase::Locked
        } else if self.cooldown > 0 {
            Phase::Cooldown
        } else {
            Phase::Ready
        }
    }

    fn view(&self) -> SideView<'a> {
        SideView {
            profile: self.profile,
            hp: self.hp,
            energy: self.energy,
            shields: self.shields,
            cooldown: self.cooldown,
            stages: self.stages,
        }
    }

    fn snapshot(&self) -> SideSnapshot {
        SideSnapshot {
            hp: self.hp,
            energy: self.energy,
            shields: self.shields,
            phase: self.phase(),
        }
    }

    fn is_fainted(&self) -> bool {
        self.hp == 0
    }
}

/// Battle-scoped state. Never shared between battles.
struct Battle<'a> {
    sides: [Combatant<'a>; 2],
    turn: u32,
    max_turns: u32,
    options: &'a BattleOptions,
    policy: &'a dyn ActionPolicy,
    log: Option<TurnLog>,
}

impl<'a> Battle<'a> {
    fn new(
        a: &'a CombatProfile,
        b: &'a CombatProfile,
        scenario: &Scenario,
        options: &'a BattleOptions,
        policy: &'a dyn ActionPolicy,
    ) -> Self {
        let log = options.record_log.then(|| TurnLog::new(a.id(), b.id()));
        Self {
            sides: [
                Combatant::new(a, scenario.shields[0], scenario.energy[0]),
                Combatant::new(b, scenario.shields[1], scenario.energy[1]),
            ],
            turn: 0,
            max_turns: scenario.max_turns,
            options,
            policy,
            log,
        }
    }

    fn run(mut self) -> BattleResult {
        while self.turn < self.max_turns {
            self.turn += 1;
            let ended = self.step();
            self.close_turn();
            if let Some(termination) = ended {
                return self.finish(termination);
            }
        }
        self.record(LogEvent::Timeout);
        self.finish(Termination::Timeout)
    }

    fn decision_view(&self, side: usize) -> DecisionView<'a> {
        DecisionView {
            turn: self.turn,
            me: self.sides[side].view(),
            opponent: self.sides[1 - side].view(),
            damage_bonus: self.options.damage_bonus,
        }
    }

    fn step(&mut self) -> Option<Termination> {
        // Both sides decide from the same pre-turn state.
        let actions: [Option<Action>; 2] = [0, 1].map(|side| {
            (self.sides[side].cooldown == 0)
                .then(|| self.policy.choose_action(&self.decision_view(side)))
        });

        let mut charged: [Option<usize>; 2] = [None, None];
        for side in 0..2 {
            let fighter = &mut self.sides[side];
            match actions[side] {
                Some(Action::Charged(idx))
                    if fighter
                        .profile
                        .charged_moves
                        .get(idx)
                        .is_some_and(|m| fighter.energy >= m.energy) =>
                {
                    charged[side] = Some(idx);
                }
                Some(Action::Fast) | Some(Action::Charged(_)) => {
                    fighter.cooldown = fighter.profile.fast_move.turns.max(1);
                }
                Some(Action::Wait) | None => {}
            }
        }

        if charged.iter().any(Option::is_some) {
            for fighter in self.sides.iter_mut() {
                fighter.locked = true;
            }
            return self.resolve_charged(charged);
        }
        self.advance_fast_moves()
    }

    fn close_turn(&mut self) {
        let turn = self.turn;
        let snapshots = [self.sides[0].snapshot(), self.sides[1].snapshot()];
        if let Some(log) = self.log.as_mut() {
            log.end_turn(turn, snapshots);
        }
        for fighter in self.sides.iter_mut() {
            fighter.locked = false;
        }
    }

    fn record(&mut self, event: LogEvent) {
        if let Some(log) = self.log.as_mut() {
            log.push(event);
        }
    }

    fn damage(&self, attacker: usize, mv: &MoveDef) -> u32 {
        let defender = 1 - attacker;
        compute_damage(
            self.sides[attacker].profile,
            self.sides[attacker].stages,
            self.sides[defender].profile,
            self.sides[defender].stages,
            mv,
            self.options.damage_bonus,
        )
    }

    /// Charge Move Priority: the higher attack stat resolves first.
    fn cmp_first(&self) -> Option<usize> {
        let a = self.sides[0].profile.attack;
        let b = self.sides[1].profile.attack;
        if a > b {
            Some(0)
        } else if b > a {
            Some(1)
        } else {
            match self.options.cmp_tie_break {
                CmpTieBreak::Simultaneous => None,
                CmpTieBreak::SideA => Some(0),
                CmpTieBreak::SideB => Some(1),
            }
        }
    }

    fn resolve_charged(&mut self, charged: [Option<usize>; 2]) -> Option<Termination> {
        match charged {
            [Some(idx), None] => self.resolve_sequential(&[(0, idx)]),
            [None, Some(idx)] => self.resolve_sequential(&[(1, idx)]),
            [Some(a), Some(b)] => match self.cmp_first() {
                Some(0) => self.resolve_sequential(&[(0, a), (1, b)]),
                Some(_) => self.resolve_sequential(&[(1, b), (0, a)]),
                None => self.resolve_simultaneous([a, b]),
            },
            [None, None] => None,
        }
    }

    fn resolve_sequential(&mut self, order: &[(usize, usize)]) -> Option<Termination> {
        for &(attacker, idx) in order {
            if self.sides[attacker].is_fainted() {
                continue;
            }
            let mv = Arc::clone(&self.sides[attacker].profile.charged_moves[idx]);
            let shielded = self.shield_decision(attacker, &mv);
            self.land_charged(attacker, &mv, shielded);
            let deltas = self.effect_deltas(attacker, &mv);
            self.apply_stage_deltas(deltas);
            if let Some(end) = self.faint_check() {
                return Some(end);
            }
        }
        None
    }

    fn resolve_simultaneous(&mut self, idx: [usize; 2]) -> Option<Termination> {
        let moves = [0, 1].map(|side| {
            Arc::clone(&self.sides[side].profile.charged_moves[idx[side]])
        });
        let shielded = [
            self.shield_decision(0, &moves[0]),
            self.shield_decision(1, &moves[1]),
        ];
        let damage = [self.damage(0, &moves[0]), self.damage(1, &moves[1])];
        for attacker in 0..2 {
            self.apply_charged_hit(attacker, &moves[attacker], damage[attacker], shielded[attacker]);
        }
        let mut deltas = [(0i8, 0i8); 2];
        for attacker in 0..2 {
            add_deltas(&mut deltas, self.effect_deltas(attacker, &moves[attacker]));
        }
        self.apply_stage_deltas(deltas);
        self.faint_check()
    }

    /// Whether the defender of `attacker`'s charged move raises a shield.
    fn shield_decision(&self, attacker: usize, mv: &MoveDef) -> bool {
        let defender = 1 - attacker;
        if self.sides[defender].shields == 0 {
            return false;
        }
        let incoming = IncomingAttack {
            view: self.decision_view(defender),
            move_def: mv,
            damage: self.damage(attacker, mv),
        };
        self.policy.should_shield(&incoming)
    }

    fn land_charged(&mut self, attacker: usize, mv: &MoveDef, shielded: bool) {
        let damage = self.damage(attacker, mv);
        self.apply_charged_hit(attacker, mv, damage, shielded);
    }

    fn apply_charged_hit(&mut self, attacker: usize, mv: &MoveDef, damage: u32, shielded: bool) {
        let defender = 1 - attacker;
        {
            let fighter = &mut self.sides[attacker];
            fighter.energy = fighter.energy.saturating_sub(mv.energy);
            fighter.charged_thrown += 1;
        }
        let dealt = if shielded {
            let target = &mut self.sides[defender];
            target.shields -= 1;
            target.shields_used += 1;
            0
        } else {
            damage
        };
        let target = &mut self.sides[defender];
        target.hp = target.hp.saturating_sub(dealt);
        self.record(LogEvent::ChargedMove {
            side: attacker,
            move_id: mv.id.clone(),
            damage: dealt,
            shielded,
        });
    }

    fn advance_fast_moves(&mut self) -> Option<Termination> {
        let mut landed = [false; 2];
        for (side, fighter) in self.sides.iter_mut().enumerate() {
            if fighter.cooldown > 0 {
                fighter.cooldown -= 1;
                landed[side] = fighter.cooldown == 0;
            }
        }
        if !landed.iter().any(|&l| l) {
            return None;
        }
        // Damage is computed before either hit lands.
        let damage = [0, 1].map(|side| {
            if landed[side] {
                self.damage(side, &self.sides[side].profile.fast_move)
            } else {
                0
            }
        });
        let mut deltas = [(0i8, 0i8); 2];
        for side in 0..2 {
            if !landed[side] {
                continue;
            }
            let mv = Arc::clone(&self.sides[side].profile.fast_move);
            let gain = mv.energy;
            {
                let fighter = &mut self.sides[side];
                fighter.energy = (fighter.energy + gain).min(MAX_ENERGY);
            }
            let target = &mut self.sides[1 - side];
            target.hp = target.hp.saturating_sub(damage[side]);
            self.record(LogEvent::FastMove {
                side,
                move_id: mv.id.clone(),
                damage: damage[side],
                energy: gain,
            });
            add_deltas(&mut deltas, self.effect_deltas(side, &mv));
        }
        self.apply_stage_deltas(deltas);
        self.faint_check()
    }

    /// Stage changes `mv` would cause, per side, as (attack, defense).
    fn effect_deltas(&self, attacker: usize, mv: &MoveDef) -> [(i8, i8); 2] {
        let mut deltas = [(0i8, 0i8); 2];
        if mv.effects.is_empty() || !self.options.buff_roll.applies(mv.effect_chance) {
            return deltas;
        }
        for effect in &mv.effects {
            let (target, attack, defense) = match *effect {
                MoveEffect::SelfStages { attack, defense } => (attacker, attack, defense),
                MoveEffect::OpponentStages { attack, defense } => (1 - attacker, attack, defense),
            };
            deltas[target].0 = deltas[target].0.saturating_add(attack);
            deltas[target].1 = deltas[target].1.saturating_add(defense);
        }
        deltas
    }

    fn apply_stage_deltas(&mut self, deltas: [(i8, i8); 2]) {
        for (side, (attack, defense)) in deltas.into_iter().enumerate() {
            if attack == 0 && defense == 0 {
                continue;
            }
            let fighter = &mut self.sides[side];
            fighter.stages = fighter.stages.shifted(attack, defense);
            self.record(LogEvent::StatChange {
                side,
                attack,
                defense,
            });
        }
    }

    fn faint_check(&mut self) -> Option<Termination> {
        let fainted = [self.sides[0].is_fainted(), self.sides[1].is_fainted()];
        for (side, &down) in fainted.iter().enumerate() {
            if down {
                self.record(LogEvent::Faint { side });
            }
        }
        match fainted {
            [true, true] => Some(Termination::DoubleFaint),
            [true, false] | [false, true] => Some(Termination::Faint),
            [false, false] => None,
        }
    }

    fn finish(self, termination: Termination) -> BattleResult {
        let [a, b] = &self.sides;
        let max_hp = [a.profile.hp, b.profile.hp];
        let hp = [a.hp, b.hp];
        let hp_fraction = [
            hp[0] as f64 / max_hp[0] as f64,
            hp[1] as f64 / max_hp[1] as f64,
        ];
        BattleResult {
            termination,
            turns: self.turn,
            hp,
            max_hp,
            hp_fraction,
            damage_fraction: [1.0 - hp_fraction[1], 1.0 - hp_fraction[0]],
            fainted: [a.is_fainted(), b.is_fainted()],
            shields_used: [a.shields_used, b.shields_used],
            energy: [a.energy, b.energy],
            charged_thrown: [a.charged_thrown, b.charged_thrown],
            log: self.log,
        }
    }
}

/// Run one battle with the default policy.
pub fn simulate(
    a: &CombatProfile,
    b: &CombatProfile,
    scenario: &Scenario,
    options: &BattleOptions,
) -> Result<BattleResult> {
    simulate_with_policy(a, b, scenario, options, &StandardPolicy::default())
}

pub fn simulate_with_policy(
    a: &CombatProfile,
    b: &CombatProfile,
    scenario: &Scenario,
    options: &BattleOptions,
    policy: &dyn ActionPolicy,
) -> Result<BattleResult> {
    scenario.validate()?;
    Ok(Battle::new(a, b, scenario, options, policy).run())
}
