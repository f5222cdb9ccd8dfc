use crate::error::{Error, Result};
use crate::format::Format;
use crate::profile::StatStages;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Fast,
    Charged,
}

/// Stat stage change carried by a move. Interpreted by the battle engine's
/// single effect routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveEffect {
    SelfStages {
        #[serde(default)]
        attack: i8,
        #[serde(default)]
        defense: i8,
    },
    OpponentStages {
        #[serde(default)]
        attack: i8,
        #[serde(default)]
        defense: i8,
    },
}

impl MoveEffect {
    /// Same effect with each stage change limited to the stage range.
    pub fn clamped(self) -> Self {
        let clamp = |v: i8| v.clamp(StatStages::MIN, StatStages::MAX);
        match self {
            MoveEffect::SelfStages { attack, defense } => MoveEffect::SelfStages {
                attack: clamp(attack),
                defense: clamp(defense),
            },
            MoveEffect::OpponentStages { attack, defense } => MoveEffect::OpponentStages {
                attack: clamp(attack),
                defense: clamp(defense),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveFlags {
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub elite: bool,
}

fn default_turns() -> u32 {
    1
}

fn default_chance() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDef {
    #[serde(rename = "moveId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub move_type: Type,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: u32,
    /// Energy gained by a fast move, or spent by a charged move.
    pub energy: u32,
    /// Duration of a fast move in turns. Charged moves resolve in the turn
    /// they are thrown.
    #[serde(default = "default_turns")]
    pub turns: u32,
    #[serde(default)]
    pub effects: Vec<MoveEffect>,
    #[serde(default = "default_chance")]
    pub effect_chance: f64,
    #[serde(default)]
    pub flags: MoveFlags,
}

impl MoveDef {
    pub fn is_fast(&self) -> bool {
        self.category == MoveCategory::Fast
    }

    pub fn is_charged(&self) -> bool {
        self.category == MoveCategory::Charged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    pub atk: u32,
    pub def: u32,
    pub hp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ivs {
    pub atk: u8,
    pub def: u8,
    pub hp: u8,
}

impl Ivs {
    pub const fn new(atk: u8, def: u8, hp: u8) -> Self {
        Self { atk, def, hp }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesEntry {
    pub species_id: String,
    #[serde(default)]
    pub species_name: String,
    #[serde(default)]
    pub dex: u32,
    pub base_stats: BaseStats,
    pub types: Vec<Type>,
    pub fast_moves: Vec<String>,
    pub charged_moves: Vec<String>,
    #[serde(default)]
    pub legacy_moves: Vec<String>,
    #[serde(default)]
    pub elite_moves: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub released: bool,
    /// IV presets keyed by CP cap, e.g. `"cp1500"`.
    #[serde(default)]
    pub default_ivs: HashMap<String, Ivs>,
}

impl SpeciesEntry {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn knows(&self, move_id: &str) -> bool {
        self.fast_moves.iter().any(|m| m == move_id)
            || self.charged_moves.iter().any(|m| m == move_id)
    }

    pub fn is_elite(&self, mv: &MoveDef) -> bool {
        mv.flags.elite || self.elite_moves.iter().any(|m| *m == mv.id)
    }

    pub fn iv_preset(&self, cp_cap: Option<u32>) -> Option<Ivs> {
        let key = match cp_cap {
            Some(cap) => format!("cp{cap}"),
            None => "cp10000".to_string(),
        };
        self.default_ivs.get(&key).copied()
    }
}

fn default_shadow_attack() -> f64 {
    1.2
}

fn default_shadow_defense() -> f64 {
    0.833_333_31
}

fn default_damage_bonus() -> f64 {
    1.3
}

fn default_max_level() -> f64 {
    50.0
}

fn default_ivs() -> Ivs {
    Ivs::new(15, 15, 15)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_shadow_attack")]
    pub shadow_attack_multiplier: f64,
    #[serde(default = "default_shadow_defense")]
    pub shadow_defense_multiplier: f64,
    /// PvP damage bonus applied to every hit.
    #[serde(default = "default_damage_bonus")]
    pub damage_bonus: f64,
    #[serde(default = "default_max_level")]
    pub max_level: f64,
    #[serde(default = "default_ivs")]
    pub default_ivs: Ivs,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shadow_attack_multiplier: default_shadow_attack(),
            shadow_defense_multiplier: default_shadow_defense(),
            damage_bonus: default_damage_bonus(),
            max_level: default_max_level(),
            default_ivs: default_ivs(),
        }
    }
}

/// Raw dataset as supplied by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMaster {
    #[serde(default)]
    pub settings: Settings,
    /// CP multipliers starting at level 1 in half-level steps.
    pub cp_multipliers: Vec<f64>,
    pub pokemon: Vec<SpeciesEntry>,
    pub moves: Vec<MoveDef>,
    #[serde(default)]
    pub formats: Vec<Format>,
}

/// Indexed, read-only view of a [`GameMaster`].
#[derive(Debug)]
pub struct Dataset {
    settings: Settings,
    cp_multipliers: Vec<f64>,
    species: Vec<SpeciesEntry>,
    species_index: HashMap<String, usize>,
    moves: HashMap<String, Arc<MoveDef>>,
    formats: Vec<Format>,
}

impl Dataset {
    pub fn new(gm: GameMaster) -> Result<Self> {
        if gm.cp_multipliers.is_empty() {
            return Err(Error::config("dataset has no CP multipliers"));
        }
        let species_index = gm
            .pokemon
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.species_id.clone(), idx))
            .collect();
        let moves = gm
            .moves
            .into_iter()
            .map(|mut m| {
                m.effects = m.effects.into_iter().map(MoveEffect::clamped).collect();
                (m.id.clone(), Arc::new(m))
            })
            .collect();
        Ok(Self {
            settings: gm.settings,
            cp_multipliers: gm.cp_multipliers,
            species: gm.pokemon,
            species_index,
            moves,
            formats: gm.formats,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let gm: GameMaster = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("malformed dataset: {e}")))?;
        Self::new(gm)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn species(&self, species_id: &str) -> Option<&SpeciesEntry> {
        self.species_index
            .get(species_id)
            .map(|&idx| &self.species[idx])
    }

    /// Species in dataset order.
    pub fn all_species(&self) -> &[SpeciesEntry] {
        &self.species
    }

    pub fn move_def(&self, move_id: &str) -> Option<&Arc<MoveDef>> {
        self.moves.get(move_id)
    }

    pub fn format(&self, format_id: &str) -> Option<&Format> {
        self.formats.iter().find(|f| f.id == format_id)
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    /// CP multiplier for a level in half-level steps starting at 1.
    pub fn cp_multiplier(&self, level: f64) -> Option<f64> {
        if !level.is_finite() || level < 1.0 {
            return None;
        }
        let steps = (level - 1.0) * 2.0;
        if (steps - steps.round()).abs() > 1e-9 {
            return None;
        }
        self.cp_multipliers.get(steps.round() as usize).copied()
    }

    /// Highest level present in the CP multiplier table.
    pub fn max_table_level(&self) -> f64 {
        1.0 + (self.cp_multipliers.len() - 1) as f64 / 2.0
    }
}
