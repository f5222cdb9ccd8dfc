use crate::error::{Error, Result};
use crate::model::{BaseStats, Dataset, Ivs, MoveDef, SpeciesEntry};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

pub const MIN_CP: u32 = 10;
pub const MIN_HP: u32 = 10;
pub const MAX_CHARGED_MOVES: usize = 2;
pub const SHADOW_ELIGIBLE_TAG: &str = "shadoweligible";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    #[default]
    Normal,
    Shadow,
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Normal => f.write_str("normal"),
            Form::Shadow => f.write_str("shadow"),
        }
    }
}

/// Ranking identifier: species id plus a `_shadow` suffix for shadow forms.
pub fn ranking_id(species_id: &str, form: Form) -> String {
    match form {
        Form::Normal => species_id.to_string(),
        Form::Shadow => format!("{species_id}_shadow"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Moveset {
    pub fast: String,
    pub charged: Vec<String>,
}

impl Moveset {
    pub fn new(fast: impl Into<String>, charged: &[&str]) -> Self {
        Self {
            fast: fast.into(),
            charged: charged.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for Moveset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.fast, self.charged.join("/"))
    }
}

/// Stat stages in the -4..=4 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatStages {
    pub attack: i8,
    pub defense: i8,
}

impl StatStages {
    pub const MIN: i8 = -4;
    pub const MAX: i8 = 4;

    pub fn shifted(self, attack: i8, defense: i8) -> Self {
        Self {
            attack: (self.attack as i16 + attack as i16).clamp(Self::MIN as i16, Self::MAX as i16)
                as i8,
            defense: (self.defense as i16 + defense as i16)
                .clamp(Self::MIN as i16, Self::MAX as i16) as i8,
        }
    }
}

/// Everything needed to build one combat profile.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatantSpec {
    pub species_id: String,
    pub form: Form,
    pub moveset: Moveset,
    /// Explicit level; `None` picks the highest level that fits the CP cap.
    pub level: Option<f64>,
    pub ivs: Option<Ivs>,
    pub level_cap: Option<f64>,
}

impl CombatantSpec {
    pub fn new(species_id: impl Into<String>, moveset: Moveset) -> Self {
        Self {
            species_id: species_id.into(),
            form: Form::Normal,
            moveset,
            level: None,
            ivs: None,
            level_cap: None,
        }
    }

    pub fn shadow(mut self) -> Self {
        self.form = Form::Shadow;
        self
    }

    pub fn at_level(mut self, level: f64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_ivs(mut self, ivs: Ivs) -> Self {
        self.ivs = Some(ivs);
        self
    }

    pub fn ranking_id(&self) -> String {
        ranking_id(&self.species_id, self.form)
    }
}

#[derive(Debug, Clone)]
pub struct CombatProfile {
    pub species_id: String,
    pub form: Form,
    pub level: f64,
    pub ivs: Ivs,
    pub cp: u32,
    pub attack: f64,
    pub defense: f64,
    pub hp: u32,
    pub types: Vec<Type>,
    pub fast_move: Arc<MoveDef>,
    pub charged_moves: Vec<Arc<MoveDef>>,
    pub start_stages: StatStages,
}

impl CombatProfile {
    pub fn id(&self) -> String {
        ranking_id(&self.species_id, self.form)
    }

    pub fn has_type(&self, t: Type) -> bool {
        self.types.contains(&t)
    }

    pub fn moveset(&self) -> Moveset {
        Moveset {
            fast: self.fast_move.id.clone(),
            charged: self.charged_moves.iter().map(|m| m.id.clone()).collect(),
        }
    }
}

pub fn compute_cp(base: &BaseStats, ivs: Ivs, cpm: f64) -> u32 {
    let atk = (base.atk + ivs.atk as u32) as f64;
    let def = (base.def + ivs.def as u32) as f64;
    let hp = (base.hp + ivs.hp as u32) as f64;
    let cp = (atk * def.sqrt() * hp.sqrt() * cpm * cpm / 10.0).floor() as u32;
    cp.max(MIN_CP)
}

/// Build a profile from dataset entries. `cp_cap` of `None` means uncapped.
pub fn resolve(dataset: &Dataset, spec: &CombatantSpec, cp_cap: Option<u32>) -> Result<CombatProfile> {
    let species = dataset
        .species(&spec.species_id)
        .ok_or_else(|| Error::MissingSpeciesData(spec.species_id.clone()))?;
    if spec.form == Form::Shadow && !species.has_tag(SHADOW_ELIGIBLE_TAG) {
        return Err(Error::UnsupportedForm {
            species: species.species_id.clone(),
            form: spec.form.to_string(),
        });
    }
    let (fast_move, charged_moves) = resolve_moves(dataset, species, &spec.moveset)?;

    let settings = dataset.settings();
    let level_cap = spec
        .level_cap
        .unwrap_or(settings.max_level)
        .min(dataset.max_table_level());
    let ivs = spec
        .ivs
        .or_else(|| species.iv_preset(cp_cap))
        .unwrap_or(settings.default_ivs);

    let level = match spec.level {
        Some(level) => {
            if level > level_cap || dataset.cp_multiplier(level).is_none() {
                return Err(Error::InvalidLevel {
                    species: species.species_id.clone(),
                    level,
                });
            }
            level
        }
        None => highest_fitting_level(dataset, species, ivs, cp_cap, level_cap),
    };
    let cpm = dataset.cp_multiplier(level).ok_or_else(|| Error::InvalidLevel {
        species: species.species_id.clone(),
        level,
    })?;

    let cp = compute_cp(&species.base_stats, ivs, cpm);
    if let Some(cap) = cp_cap {
        if cp > cap {
            return Err(Error::CpCapExceeded {
                species: species.species_id.clone(),
                cp,
                cap,
            });
        }
    }

    let (atk_mult, def_mult) = match spec.form {
        Form::Normal => (1.0, 1.0),
        Form::Shadow => (
            settings.shadow_attack_multiplier,
            settings.shadow_defense_multiplier,
        ),
    };
    let base = species.base_stats;
    let hp = (((base.hp + ivs.hp as u32) as f64) * cpm).floor() as u32;

    Ok(CombatProfile {
        species_id: species.species_id.clone(),
        form: spec.form,
        level,
        ivs,
        cp,
        attack: (base.atk + ivs.atk as u32) as f64 * cpm * atk_mult,
        defense: (base.def + ivs.def as u32) as f64 * cpm * def_mult,
        hp: hp.max(MIN_HP),
        types: species.types.clone(),
        fast_move,
        charged_moves,
        start_stages: StatStages::default(),
    })
}

fn resolve_moves(
    dataset: &Dataset,
    species: &SpeciesEntry,
    moveset: &Moveset,
) -> Result<(Arc<MoveDef>, Vec<Arc<MoveDef>>)> {
    let invalid = |reason: String| Error::InvalidMoveset {
        species: species.species_id.clone(),
        reason,
    };

    if !species.fast_moves.iter().any(|m| *m == moveset.fast) {
        return Err(invalid(format!("{} is not a legal fast move", moveset.fast)));
    }
    let fast = dataset
        .move_def(&moveset.fast)
        .ok_or_else(|| Error::MissingMoveData(moveset.fast.clone()))?;
    if !fast.is_fast() {
        return Err(invalid(format!("{} is not a fast move", fast.id)));
    }

    if moveset.charged.is_empty() || moveset.charged.len() > MAX_CHARGED_MOVES {
        return Err(invalid(format!(
            "expected 1 or 2 charged moves, got {}",
            moveset.charged.len()
        )));
    }
    if moveset.charged.len() == 2 && moveset.charged[0] == moveset.charged[1] {
        return Err(invalid(format!("{} is listed twice", moveset.charged[0])));
    }
    let mut charged = Vec::with_capacity(moveset.charged.len());
    for id in &moveset.charged {
        if !species.charged_moves.iter().any(|m| m == id) {
            return Err(invalid(format!("{id} is not a legal charged move")));
        }
        let def = dataset
            .move_def(id)
            .ok_or_else(|| Error::MissingMoveData(id.clone()))?;
        if !def.is_charged() {
            return Err(invalid(format!("{id} is not a charged move")));
        }
        charged.push(Arc::clone(def));
    }
    Ok((Arc::clone(fast), charged))
}

fn highest_fitting_level(
    dataset: &Dataset,
    species: &SpeciesEntry,
    ivs: Ivs,
    cp_cap: Option<u32>,
    level_cap: f64,
) -> f64 {
    let Some(cap) = cp_cap else {
        return (level_cap * 2.0).floor() / 2.0;
    };
    let mut level = (level_cap * 2.0).floor() / 2.0;
    while level > 1.0 {
        if let Some(cpm) = dataset.cp_multiplier(level) {
            if compute_cp(&species.base_stats, ivs, cpm) <= cap {
                return level;
            }
        }
        level -= 0.5;
    }
    // Level 1 may still exceed the cap; the caller reports that.
    1.0
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProfileKey {
    species_id: String,
    form: Form,
    moveset: Moveset,
    level_steps: Option<u32>,
    ivs: Option<Ivs>,
    level_cap_steps: Option<u32>,
    cp_cap: Option<u32>,
}

impl ProfileKey {
    fn new(spec: &CombatantSpec, cp_cap: Option<u32>) -> Self {
        let steps = |level: f64| (level * 2.0).round() as u32;
        Self {
            species_id: spec.species_id.clone(),
            form: spec.form,
            moveset: spec.moveset.clone(),
            level_steps: spec.level.map(steps),
            ivs: spec.ivs,
            level_cap_steps: spec.level_cap.map(steps),
            cp_cap,
        }
    }
}

/// Lazily filled profile cache shared by every worker of a run.
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: RwLock<HashMap<ProfileKey, Arc<CombatProfile>>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve(
        &self,
        dataset: &Dataset,
        spec: &CombatantSpec,
        cp_cap: Option<u32>,
    ) -> Result<Arc<CombatProfile>> {
        let key = ProfileKey::new(spec, cp_cap);
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }
        let profile = Arc::new(resolve(dataset, spec, cp_cap)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another worker may have resolved the same key meanwhile; keep the first.
        let stored = entries.entry(key).or_insert(profile);
        Ok(Arc::clone(stored))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&mut self) {
        self.entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
