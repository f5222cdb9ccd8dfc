use crate::battle::{simulate, BattleOptions, Scenario};
use crate::error::{Error, Result};
use crate::format::{preset_scenario, Candidate, Format};
use crate::model::{Dataset, MoveDef, SpeciesEntry};
use crate::profile::{CombatProfile, Moveset, ProfileCache};
use crate::rating::battle_rating;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Movesets keyed by ranking id, taken from an earlier ranking run.
pub type ReferenceMovesets = BTreeMap<String, Moveset>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovesetMode {
    /// Reuse format overrides or a reference ranking.
    #[default]
    Forced,
    /// Search every legal combination. Expensive.
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoSelectOptions {
    pub max_opponents: usize,
    pub seed: u64,
    pub scenario: Scenario,
}

impl Default for AutoSelectOptions {
    fn default() -> Self {
        Self {
            max_opponents: 20,
            seed: 0,
            scenario: preset_scenario("leads")
                .unwrap_or_else(|| Scenario::new([1, 1], [0, 0]).with_slug("leads")),
        }
    }
}

impl AutoSelectOptions {
    /// Options for the candidate at `idx` in the roster, with its own seed.
    pub fn for_candidate(&self, idx: usize) -> Self {
        Self {
            seed: self.seed ^ ((idx as u64) << 32),
            ..self.clone()
        }
    }
}

fn usable<'a>(
    dataset: &'a Dataset,
    species: &SpeciesEntry,
    ids: &[String],
    allow_elite: bool,
    want_fast: bool,
) -> Vec<&'a Arc<MoveDef>> {
    ids.iter()
        .filter_map(|id| dataset.move_def(id))
        .filter(|m| m.is_fast() == want_fast)
        .filter(|m| allow_elite || !species.is_elite(m))
        .collect()
}

/// Every legal fast move crossed with every pair of legal charged moves.
/// Species with a single charged move get single-move sets.
pub fn candidate_movesets(
    dataset: &Dataset,
    species: &SpeciesEntry,
    allow_elite: bool,
) -> Vec<Moveset> {
    let fast = usable(dataset, species, &species.fast_moves, allow_elite, true);
    let charged = usable(dataset, species, &species.charged_moves, allow_elite, false);

    let mut charged_sets: Vec<Vec<String>> = Vec::new();
    for i in 0..charged.len() {
        for j in (i + 1)..charged.len() {
            charged_sets.push(vec![charged[i].id.clone(), charged[j].id.clone()]);
        }
    }
    if charged_sets.is_empty() {
        charged_sets.extend(charged.iter().map(|m| vec![m.id.clone()]));
    }

    fast.iter()
        .flat_map(|f| {
            charged_sets.iter().map(move |c| Moveset {
                fast: f.id.clone(),
                charged: c.clone(),
            })
        })
        .collect()
}

/// Cheap heuristic pick used for opponents and as a fallback.
pub fn baseline_moveset(
    dataset: &Dataset,
    species: &SpeciesEntry,
    allow_elite: bool,
) -> Option<Moveset> {
    let fast = usable(dataset, species, &species.fast_moves, allow_elite, true);
    let mut charged = usable(dataset, species, &species.charged_moves, allow_elite, false);

    let mut best_fast: Option<&Arc<MoveDef>> = None;
    for m in fast {
        if best_fast.map_or(true, |b| output_per_turn(m) > output_per_turn(b)) {
            best_fast = Some(m);
        }
    }

    // Stable sort keeps dataset order on ties.
    charged.sort_by(|a, b| damage_per_energy(b).total_cmp(&damage_per_energy(a)));
    if charged.is_empty() {
        return None;
    }
    Some(Moveset {
        fast: best_fast?.id.clone(),
        charged: charged.iter().take(2).map(|m| m.id.clone()).collect(),
    })
}

fn output_per_turn(m: &MoveDef) -> f64 {
    (m.power + m.energy) as f64 / m.turns.max(1) as f64
}

fn damage_per_energy(m: &MoveDef) -> f64 {
    m.power as f64 / m.energy.max(1) as f64
}

/// Format override first, then the reference ranking.
pub fn forced_moveset(
    format: &Format,
    reference: Option<&ReferenceMovesets>,
    candidate: &Candidate,
) -> Option<Moveset> {
    let id = candidate.id();
    format
        .movesets
        .get(&id)
        .or_else(|| reference.and_then(|r| r.get(&id)))
        .cloned()
}

/// Runs every candidate moveset in one reduced scenario against a sampled
/// opponent pool and keeps the best mean rating.
pub fn select_auto(
    dataset: &Dataset,
    cache: &ProfileCache,
    format: &Format,
    candidate: &Candidate,
    pool: &[Arc<CombatProfile>],
    options: &AutoSelectOptions,
    battle: &BattleOptions,
) -> Result<Moveset> {
    let species = dataset
        .species(&candidate.species_id)
        .ok_or_else(|| Error::MissingSpeciesData(candidate.species_id.clone()))?;
    let movesets = candidate_movesets(dataset, species, format.allow_elite);
    if movesets.is_empty() {
        return Err(Error::InvalidMoveset {
            species: species.species_id.clone(),
            reason: "no legal moveset".to_string(),
        });
    }

    let id = candidate.id();
    let others: Vec<&Arc<CombatProfile>> = pool.iter().filter(|p| p.id() != id).collect();
    let mut rng = SmallRng::seed_from_u64(options.seed);
    let opponents: Vec<&Arc<CombatProfile>> = others
        .choose_multiple(&mut rng, options.max_opponents)
        .copied()
        .collect();

    let scored: Vec<(usize, Result<f64>)> = movesets
        .par_iter()
        .enumerate()
        .map(|(idx, moveset)| {
            let score = cache
                .get_or_resolve(dataset, &candidate.spec(moveset.clone(), format), format.cp_cap)
                .and_then(|profile| mean_rating(&profile, &opponents, options, battle));
            (idx, score)
        })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    let mut first_err = None;
    for (idx, score) in scored {
        match score {
            Ok(score) => {
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((idx, score));
                }
            }
            Err(e) => {
                debug!(combatant = %id, moveset = %movesets[idx], error = %e, "skipping moveset");
                first_err.get_or_insert(e);
            }
        }
    }
    match (best, first_err) {
        (Some((idx, score)), _) => {
            debug!(combatant = %id, moveset = %movesets[idx], score, "auto moveset selected");
            Ok(movesets[idx].clone())
        }
        (None, Some(e)) => Err(e),
        (None, None) => Err(Error::InvalidMoveset {
            species: species.species_id.clone(),
            reason: "no legal moveset".to_string(),
        }),
    }
}

fn mean_rating(
    profile: &CombatProfile,
    opponents: &[&Arc<CombatProfile>],
    options: &AutoSelectOptions,
    battle: &BattleOptions,
) -> Result<f64> {
    if opponents.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for opponent in opponents {
        let result = simulate(profile, opponent, &options.scenario, battle)?;
        total += battle_rating(&result, 0);
    }
    Ok(total / opponents.len() as f64)
}
