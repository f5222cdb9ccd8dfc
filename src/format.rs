use crate::battle::Scenario;
use crate::error::{Error, Result};
use crate::model::{Dataset, SpeciesEntry};
use crate::moveset::MovesetMode;
use crate::profile::{ranking_id, CombatantSpec, Form, Moveset, SHADOW_ELIGIBLE_TAG};
use crate::types::Type;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named starting conditions: (shields, energy head start in fast moves).
pub static SCENARIO_PRESETS: phf::Map<&'static str, ([u8; 2], [u8; 2])> = phf_map! {
    "leads" => ([1, 1], [0, 0]),
    "closers" => ([0, 0], [0, 0]),
    "switches" => ([1, 1], [0, 4]),
    "chargers" => ([1, 1], [6, 0]),
    "attackers" => ([0, 1], [0, 0]),
};

/// Order used when a format does not list its scenarios.
pub const DEFAULT_SCENARIOS: [&str; 5] = ["leads", "closers", "switches", "chargers", "attackers"];

pub const DEFAULT_ITERATIONS: usize = 7;

pub fn preset_scenario(slug: &str) -> Option<Scenario> {
    SCENARIO_PRESETS
        .get(slug)
        .map(|&(shields, energy)| Scenario::new(shields, energy).with_slug(slug))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioRef {
    Preset(String),
    Custom(Scenario),
}

impl ScenarioRef {
    pub fn resolve(&self) -> Result<Scenario> {
        match self {
            ScenarioRef::Preset(slug) => preset_scenario(slug)
                .ok_or_else(|| Error::config(format!("unknown scenario preset '{slug}'"))),
            ScenarioRef::Custom(scenario) => Ok(scenario.clone()),
        }
    }
}

fn default_scenarios() -> Vec<ScenarioRef> {
    DEFAULT_SCENARIOS
        .iter()
        .map(|slug| ScenarioRef::Preset(slug.to_string()))
        .collect()
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_true() -> bool {
    true
}

/// Structured eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", content = "values", rename_all = "lowercase")]
pub enum FilterRule {
    /// Species ids, or ranking ids such as `medicham_shadow` to target a form.
    Species(Vec<String>),
    Type(Vec<Type>),
    Tag(Vec<String>),
    Move(Vec<String>),
    Dex { min: u32, max: u32 },
}

impl FilterRule {
    pub fn matches(&self, species: &SpeciesEntry, form: Form) -> bool {
        match self {
            FilterRule::Species(ids) => {
                let id = ranking_id(&species.species_id, form);
                ids.iter().any(|s| *s == species.species_id || *s == id)
            }
            FilterRule::Type(types) => species.types.iter().any(|t| types.contains(t)),
            FilterRule::Tag(tags) => tags.iter().any(|t| species.has_tag(t)),
            FilterRule::Move(moves) => moves.iter().any(|m| species.knows(m)),
            FilterRule::Dex { min, max } => (*min..=*max).contains(&species.dex),
        }
    }
}

/// Post-aggregation score shaping. Monotonic and continuous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAdjustment {
    pub high: f64,
    pub compression: f64,
    pub low: f64,
    pub amplification: f64,
}

impl Default for ScoreAdjustment {
    fn default() -> Self {
        Self {
            high: 700.0,
            compression: 0.5,
            low: 300.0,
            amplification: 1.5,
        }
    }
}

impl ScoreAdjustment {
    pub fn apply(&self, score: f64) -> f64 {
        if score > self.high {
            self.high + (score - self.high) * self.compression
        } else if score < self.low {
            (self.low - (self.low - score) * self.amplification).max(0.0)
        } else {
            score
        }
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.high, self.compression, self.low, self.amplification]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.compression < 0.0 || self.amplification < 0.0 {
            return Err(Error::config(format!(
                "score adjustment {self:?} must use finite, non-negative factors"
            )));
        }
        if self.low > self.high {
            return Err(Error::config(format!(
                "score adjustment thresholds are inverted: low {} > high {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// A competitive format ("cup"): rules plus ranking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `None` for uncapped leagues.
    #[serde(default)]
    pub cp_cap: Option<u32>,
    #[serde(default)]
    pub level_cap: Option<f64>,
    #[serde(default)]
    pub include: Vec<FilterRule>,
    #[serde(default)]
    pub exclude: Vec<FilterRule>,
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioRef>,
    #[serde(default)]
    pub moveset_mode: MovesetMode,
    /// Forced movesets keyed by ranking id.
    #[serde(default)]
    pub movesets: BTreeMap<String, Moveset>,
    /// Influence multipliers keyed by ranking id; 1.0 when absent.
    #[serde(default)]
    pub weight_modifiers: BTreeMap<String, f64>,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub adjustment: ScoreAdjustment,
    #[serde(default = "default_true")]
    pub include_shadows: bool,
    #[serde(default)]
    pub allow_unreleased: bool,
    #[serde(default)]
    pub allow_elite: bool,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            id: "all".to_string(),
            name: String::new(),
            cp_cap: None,
            level_cap: None,
            include: Vec::new(),
            exclude: Vec::new(),
            scenarios: default_scenarios(),
            moveset_mode: MovesetMode::default(),
            movesets: BTreeMap::new(),
            weight_modifiers: BTreeMap::new(),
            iterations: DEFAULT_ITERATIONS,
            adjustment: ScoreAdjustment::default(),
            include_shadows: true,
            allow_unreleased: false,
            allow_elite: false,
        }
    }
}

impl Format {
    pub fn new(id: impl Into<String>, cp_cap: Option<u32>) -> Self {
        Self {
            id: id.into(),
            cp_cap,
            ..Self::default()
        }
    }

    pub fn weight_modifier(&self, id: &str) -> f64 {
        self.weight_modifiers.get(id).copied().unwrap_or(1.0)
    }

    pub fn resolved_scenarios(&self) -> Result<Vec<Scenario>> {
        self.scenarios.iter().map(ScenarioRef::resolve).collect()
    }

    /// Checks everything that would make a ranking run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("format id is empty"));
        }
        if self.cp_cap == Some(0) {
            return Err(Error::config(format!("format '{}' has a CP cap of 0", self.id)));
        }
        if let Some(level) = self.level_cap {
            if !level.is_finite() || level < 1.0 {
                return Err(Error::config(format!(
                    "format '{}' has level cap {level}",
                    self.id
                )));
            }
        }
        if self.scenarios.is_empty() {
            return Err(Error::config(format!("format '{}' lists no scenarios", self.id)));
        }
        for scenario in self.resolved_scenarios()? {
            scenario.validate()?;
        }
        for (id, modifier) in &self.weight_modifiers {
            if !modifier.is_finite() || *modifier < 0.0 {
                return Err(Error::config(format!(
                    "weight modifier for {id} is {modifier}; expected a finite value >= 0"
                )));
            }
        }
        self.adjustment.validate()
    }
}

/// One combatant allowed into a ranking run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub species_id: String,
    pub form: Form,
}

impl Candidate {
    pub fn new(species_id: impl Into<String>, form: Form) -> Self {
        Self {
            species_id: species_id.into(),
            form,
        }
    }

    pub fn id(&self) -> String {
        ranking_id(&self.species_id, self.form)
    }

    /// Resolver input for this candidate under the format's level cap.
    pub fn spec(&self, moveset: Moveset, format: &Format) -> CombatantSpec {
        CombatantSpec {
            species_id: self.species_id.clone(),
            form: self.form,
            moveset,
            level: None,
            ivs: None,
            level_cap: format.level_cap,
        }
    }
}

/// Decides which combatants take part in a format.
pub trait EligibilityFilter: Send + Sync {
    fn eligible(&self, dataset: &Dataset, format: &Format) -> Vec<Candidate>;
}

/// Include/exclude rule evaluation over the dataset, in dataset order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFilter;

impl RuleFilter {
    fn admits(format: &Format, species: &SpeciesEntry, form: Form) -> bool {
        let included = format.include.is_empty()
            || format.include.iter().any(|r| r.matches(species, form));
        included && !format.exclude.iter().any(|r| r.matches(species, form))
    }
}

impl EligibilityFilter for RuleFilter {
    fn eligible(&self, dataset: &Dataset, format: &Format) -> Vec<Candidate> {
        let mut out = Vec::new();
        for species in dataset.all_species() {
            if !species.released && !format.allow_unreleased {
                continue;
            }
            if Self::admits(format, species, Form::Normal) {
                out.push(Candidate::new(&species.species_id, Form::Normal));
            }
            if format.include_shadows
                && species.has_tag(SHADOW_ELIGIBLE_TAG)
                && Self::admits(format, species, Form::Shadow)
            {
                out.push(Candidate::new(&species.species_id, Form::Shadow));
            }
        }
        out
    }
}
