use crate::battle::{simulate, BattleOptions, Scenario};
use crate::profile::CombatProfile;
use crate::rating::{battle_rating, pair_ratings};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Per-scenario ratings for every ordered pair of combatants.
#[derive(Debug, Clone)]
pub struct MatchupMatrix {
    pub ids: Vec<String>,
    pub scenarios: Vec<Scenario>,
    /// `ratings[s][i][j]`: rating of `i` against `j` with `i` as side 0 of
    /// scenario `s`. `None` on the diagonal and for failed battles.
    ratings: Vec<Vec<Vec<Option<f64>>>>,
    pub battles: usize,
}

struct CellResult {
    scenario: usize,
    a_idx: usize,
    b_idx: usize,
    ratings: [Option<f64>; 2],
    battles: usize,
}

fn unordered_pairs(len: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(len * len.saturating_sub(1) / 2);
    for i in 0..len {
        for j in (i + 1)..len {
            pairs.push((i, j));
        }
    }
    pairs
}

fn run_cell(
    profiles: &[Arc<CombatProfile>],
    scenarios: &[Scenario],
    options: &BattleOptions,
    (s_idx, a_idx, b_idx): (usize, usize, usize),
) -> CellResult {
    let scenario = &scenarios[s_idx];
    let a = &profiles[a_idx];
    let b = &profiles[b_idx];
    let rate = |x: &CombatProfile, y: &CombatProfile, sc: &Scenario| match simulate(x, y, sc, options) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(a = %x.id(), b = %y.id(), scenario = %sc.slug, error = %e, "battle failed");
            None
        }
    };

    if scenario.is_symmetric() {
        let ratings = rate(a, b, scenario)
            .map(|r| pair_ratings(&r))
            .map_or([None, None], |[ra, rb]| [Some(ra), Some(rb)]);
        CellResult {
            scenario: s_idx,
            a_idx,
            b_idx,
            ratings,
            battles: 1,
        }
    } else {
        // Each side is rated as side 0 of the scenario.
        let forward = rate(a, b, scenario).map(|r| battle_rating(&r, 0));
        let reverse = rate(b, a, scenario).map(|r| battle_rating(&r, 0));
        CellResult {
            scenario: s_idx,
            a_idx,
            b_idx,
            ratings: [forward, reverse],
            battles: 2,
        }
    }
}

/// Simulates every unordered pair in every scenario in parallel.
pub fn compute_matrix(
    profiles: &[Arc<CombatProfile>],
    scenarios: &[Scenario],
    options: &BattleOptions,
) -> MatchupMatrix {
    let n = profiles.len();
    let tasks: Vec<(usize, usize, usize)> = (0..scenarios.len())
        .flat_map(|s| unordered_pairs(n).into_iter().map(move |(a, b)| (s, a, b)))
        .collect();
    let cell_results: Vec<CellResult> = tasks
        .par_iter()
        .map(|&task| run_cell(profiles, scenarios, options, task))
        .collect();

    let mut ratings = vec![vec![vec![None; n]; n]; scenarios.len()];
    let mut battles = 0;
    for cell in cell_results {
        ratings[cell.scenario][cell.a_idx][cell.b_idx] = cell.ratings[0];
        ratings[cell.scenario][cell.b_idx][cell.a_idx] = cell.ratings[1];
        battles += cell.battles;
    }
    MatchupMatrix {
        ids: profiles.iter().map(|p| p.id()).collect(),
        scenarios: scenarios.to_vec(),
        ratings,
        battles,
    }
}

impl MatchupMatrix {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn scenario_rating(&self, scenario: usize, a: usize, b: usize) -> Option<f64> {
        self.ratings.get(scenario)?.get(a)?.get(b).copied().flatten()
    }

    /// Scenario ratings blended by scenario weight, one score per
    /// pair-direction. Scenarios whose battle failed are left out of the mean.
    pub fn blended(&self) -> Vec<Vec<Option<f64>>> {
        let n = self.len();
        let mut out = vec![vec![None; n]; n];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut weight = 0.0;
                for (s, scenario) in self.scenarios.iter().enumerate() {
                    if let Some(r) = self.scenario_rating(s, i, j) {
                        sum += r * scenario.weight;
                        weight += scenario.weight;
                    }
                }
                if weight > 0.0 {
                    *cell = Some(sum / weight);
                }
            }
        }
        out
    }
}

/// Writes a blended matrix with a header row of ids; empty cells for gaps.
pub fn write_csv(ids: &[String], matrix: &[Vec<Option<f64>>], path: &Path) -> anyhow::Result<()> {
    let mut out = String::from("id");
    for id in ids {
        out.push(',');
        out.push_str(id);
    }
    out.push('\n');
    for (row_idx, row) in matrix.iter().enumerate() {
        out.push_str(&ids[row_idx]);
        for value in row {
            out.push(',');
            if let Some(value) = value {
                out.push_str(&format!("{value:.1}"));
            }
        }
        if row_idx + 1 < matrix.len() {
            out.push('\n');
        }
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_unordered_and_complete() {
        assert_eq!(unordered_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(unordered_pairs(1).is_empty());
        assert!(unordered_pairs(0).is_empty());
    }

    #[test]
    fn csv_leaves_gaps_blank() {
        let dir = std::env::temp_dir().join("pvp_matrix_csv_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("m.csv");
        let ids = vec!["a".to_string(), "b".to_string()];
        let matrix = vec![vec![None, Some(612.34)], vec![Some(388.0), None]];
        write_csv(&ids, &matrix, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,a,b\na,,612.3\nb,388.0,");
    }
}
