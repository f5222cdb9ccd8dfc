use crate::battle::BattleOptions;
use crate::error::{Error, Result};
use crate::format::{Candidate, EligibilityFilter, Format};
use crate::matrix::{compute_matrix, MatchupMatrix};
use crate::model::Dataset;
use crate::moveset::{
    baseline_moveset, forced_moveset, select_auto, AutoSelectOptions, MovesetMode,
    ReferenceMovesets,
};
use crate::profile::{CombatProfile, Form, Moveset, ProfileCache};
use crate::rating::EVEN_RATING;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TOP_MATCHUPS: usize = 5;

/// Cooperative cancellation, checked between re-weighting passes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RankOptions {
    pub battle: BattleOptions,
    pub auto: AutoSelectOptions,
    /// Overrides the format's moveset mode.
    pub mode: Option<MovesetMode>,
    pub reference: Option<ReferenceMovesets>,
    pub cancel: Option<CancelToken>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchupScore {
    pub opponent: String,
    pub rating: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub id: String,
    pub species_id: String,
    pub form: Form,
    pub moveset: Moveset,
    pub level: f64,
    pub cp: u32,
    /// Adjusted score used for ordering.
    pub score: f64,
    pub raw_score: f64,
    pub matchups: Vec<MatchupScore>,
    pub top_matchups: Vec<MatchupScore>,
    pub top_counters: Vec<MatchupScore>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub id: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingReport {
    pub format_id: String,
    pub entries: Vec<RankingEntry>,
    pub excluded: Vec<Exclusion>,
    /// Largest per-combatant score change of each re-weighting pass.
    pub iteration_deltas: Vec<f64>,
    pub convergence_flagged: bool,
    pub battles: usize,
}

impl RankingReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Movesets of this run, usable as the reference for a forced run.
    pub fn movesets(&self) -> ReferenceMovesets {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.moveset.clone()))
            .collect()
    }

    pub fn entry(&self, id: &str) -> Option<&RankingEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub scores: Vec<f64>,
    pub deltas: Vec<f64>,
}

impl Aggregation {
    /// True when the final pass moved scores more than the one before it.
    pub fn diverging(&self) -> bool {
        match self.deltas.as_slice() {
            [.., prev, last] => last > prev,
            _ => false,
        }
    }
}

fn mean_score(row: &[Option<f64>]) -> f64 {
    let (sum, count) = row
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), r| (s + r, c + 1));
    if count == 0 {
        EVEN_RATING
    } else {
        sum / count as f64
    }
}

fn reweighted_score(row: &[Option<f64>], prev: &[f64], modifiers: &[f64], own: f64) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;
    for (j, rating) in row.iter().enumerate() {
        if let Some(rating) = rating {
            let w = prev[j] * modifiers[j];
            total += rating * w;
            weight += w;
        }
    }
    if weight > 0.0 {
        total / weight
    } else {
        own
    }
}

/// Power-ranking fixed point: start from plain means, then run exactly
/// `iterations` passes weighting each opponent by its previous score times
/// its weight modifier.
pub fn aggregate_scores(
    matchups: &[Vec<Option<f64>>],
    modifiers: &[f64],
    iterations: usize,
    cancel: Option<&CancelToken>,
) -> Result<Aggregation> {
    let mut scores: Vec<f64> = matchups.iter().map(|row| mean_score(row)).collect();
    let mut deltas = Vec::with_capacity(iterations);
    for pass in 0..iterations {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled(pass));
        }
        let prev = &scores;
        let next: Vec<f64> = matchups
            .par_iter()
            .enumerate()
            .map(|(i, row)| reweighted_score(row, prev, modifiers, prev[i]))
            .collect();
        let delta = next
            .iter()
            .zip(prev)
            .map(|(n, p)| (n - p).abs())
            .fold(0.0, f64::max);
        debug!(pass = pass + 1, delta, "re-weighting pass");
        deltas.push(delta);
        scores = next;
    }
    Ok(Aggregation { scores, deltas })
}

/// Adjusted score desc, raw score desc, id asc.
pub fn leaderboard_order(a: &RankingEntry, b: &RankingEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.raw_score.total_cmp(&a.raw_score))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_leaderboard(entries: &mut [RankingEntry]) {
    entries.sort_by(leaderboard_order);
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
}

fn top_by(matchups: &[MatchupScore], best_first: bool) -> Vec<MatchupScore> {
    let mut sorted = matchups.to_vec();
    sorted.sort_by(|a, b| {
        let by_rating = if best_first {
            b.rating.total_cmp(&a.rating)
        } else {
            a.rating.total_cmp(&b.rating)
        };
        by_rating.then_with(|| a.opponent.cmp(&b.opponent))
    });
    sorted.truncate(TOP_MATCHUPS);
    sorted
}

enum Plan {
    Ready(Moveset),
    Auto,
}

fn plan_moveset(
    format: &Format,
    mode: MovesetMode,
    reference: Option<&ReferenceMovesets>,
    candidate: &Candidate,
) -> Plan {
    if mode == MovesetMode::Auto {
        return Plan::Auto;
    }
    match forced_moveset(format, reference, candidate) {
        Some(moveset) => Plan::Ready(moveset),
        None => {
            debug!(combatant = %candidate.id(), "no forced moveset, falling back to auto selection");
            Plan::Auto
        }
    }
}

struct Roster {
    profiles: Vec<Arc<CombatProfile>>,
    excluded: Vec<Exclusion>,
}

fn exclude(id: String, err: Error, excluded: &mut Vec<Exclusion>) -> Result<()> {
    if err.is_fatal() {
        return Err(err);
    }
    warn!(combatant = %id, error = %err, "excluded from ranking");
    excluded.push(Exclusion {
        id,
        reason: err.to_string(),
    });
    Ok(())
}

fn build_roster(
    dataset: &Dataset,
    cache: &ProfileCache,
    format: &Format,
    candidates: &[Candidate],
    options: &RankOptions,
) -> Result<Roster> {
    let mode = options.mode.unwrap_or(format.moveset_mode);
    let reference = options.reference.as_ref();
    let plans: Vec<Plan> = candidates
        .iter()
        .map(|c| plan_moveset(format, mode, reference, c))
        .collect();

    let resolve = |candidate: &Candidate, moveset: Moveset| {
        cache.get_or_resolve(dataset, &candidate.spec(moveset, format), format.cp_cap)
    };

    // Opponent pool for auto selection: forced or baseline movesets.
    let needs_auto = plans.iter().any(|p| matches!(p, Plan::Auto));
    let pool: Vec<Arc<CombatProfile>> = if needs_auto {
        candidates
            .par_iter()
            .zip(plans.par_iter())
            .filter_map(|(candidate, plan)| {
                let moveset = match plan {
                    Plan::Ready(m) => Some(m.clone()),
                    Plan::Auto => dataset
                        .species(&candidate.species_id)
                        .and_then(|s| baseline_moveset(dataset, s, format.allow_elite)),
                };
                resolve(candidate, moveset?).ok()
            })
            .collect()
    } else {
        Vec::new()
    };

    let resolved: Vec<Result<Arc<CombatProfile>>> = candidates
        .par_iter()
        .zip(plans.into_par_iter())
        .enumerate()
        .map(|(idx, (candidate, plan))| {
            let moveset = match plan {
                Plan::Ready(m) => m,
                Plan::Auto => select_auto(
                    dataset,
                    cache,
                    format,
                    candidate,
                    &pool,
                    &options.auto.for_candidate(idx),
                    &options.battle,
                )?,
            };
            resolve(candidate, moveset)
        })
        .collect();

    let mut profiles = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();
    for (candidate, result) in candidates.iter().zip(resolved) {
        match result {
            Ok(profile) => profiles.push(profile),
            Err(err) => exclude(candidate.id(), err, &mut excluded)?,
        }
    }
    Ok(Roster { profiles, excluded })
}

fn build_entries(
    profiles: &[Arc<CombatProfile>],
    matrix: &MatchupMatrix,
    blended: &[Vec<Option<f64>>],
    aggregation: &Aggregation,
    format: &Format,
) -> Vec<RankingEntry> {
    profiles
        .iter()
        .enumerate()
        .map(|(i, profile)| {
            let matchups: Vec<MatchupScore> = blended[i]
                .iter()
                .enumerate()
                .filter_map(|(j, rating)| {
                    rating.map(|rating| MatchupScore {
                        opponent: matrix.ids[j].clone(),
                        rating,
                    })
                })
                .collect();
            let raw_score = aggregation.scores[i];
            RankingEntry {
                rank: 0,
                id: profile.id(),
                species_id: profile.species_id.clone(),
                form: profile.form,
                moveset: profile.moveset(),
                level: profile.level,
                cp: profile.cp,
                score: format.adjustment.apply(raw_score),
                raw_score,
                top_matchups: top_by(&matchups, true),
                top_counters: top_by(&matchups, false),
                matchups,
            }
        })
        .collect()
}

/// Full ranking run for one format.
pub fn rank(
    dataset: &Dataset,
    cache: &ProfileCache,
    format: &Format,
    filter: &dyn EligibilityFilter,
    options: &RankOptions,
) -> Result<RankingReport> {
    format.validate()?;
    let scenarios = format.resolved_scenarios()?;

    let candidates = filter.eligible(dataset, format);
    info!(format = %format.id, candidates = candidates.len(), "starting ranking run");

    let Roster { profiles, excluded } = build_roster(dataset, cache, format, &candidates, options)?;
    if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
        return Err(Error::Cancelled(0));
    }

    let matrix = compute_matrix(&profiles, &scenarios, &options.battle);
    let blended = matrix.blended();
    let modifiers: Vec<f64> = matrix.ids.iter().map(|id| format.weight_modifier(id)).collect();
    let aggregation = aggregate_scores(&blended, &modifiers, format.iterations, options.cancel.as_ref())?;

    let convergence_flagged = aggregation.diverging();
    if convergence_flagged {
        warn!(
            format = %format.id,
            deltas = ?aggregation.deltas,
            "scores still diverging after the last re-weighting pass"
        );
    }

    let mut entries = build_entries(&profiles, &matrix, &blended, &aggregation, format);
    sort_leaderboard(&mut entries);
    info!(
        format = %format.id,
        ranked = entries.len(),
        excluded = excluded.len(),
        battles = matrix.battles,
        "ranking run complete"
    );

    Ok(RankingReport {
        format_id: format.id.clone(),
        entries,
        excluded,
        iteration_deltas: aggregation.deltas,
        convergence_flagged,
        battles: matrix.battles,
    })
}
