pub mod battle;
pub mod battle_log;
pub mod context;
pub mod error;
pub mod format;
pub mod matrix;
pub mod model;
pub mod moveset;
pub mod policy;
pub mod profile;
pub mod ranking;
pub mod rating;
pub mod sink;
pub mod types;

pub use crate::battle::{simulate, BattleOptions, BattleResult, Scenario, Termination};
pub use crate::context::Context;
pub use crate::error::{Error, Result};
pub use crate::format::{Candidate, EligibilityFilter, Format, RuleFilter};
pub use crate::moveset::MovesetMode;
pub use crate::profile::{CombatProfile, CombatantSpec, Form, Moveset};
pub use crate::ranking::{CancelToken, RankOptions, RankingEntry, RankingReport};

use crate::matrix::{compute_matrix, write_csv};
use crate::moveset::ReferenceMovesets;
use crate::rating::{pair_ratings, Outcome};
use crate::sink::{JsonDirSink, RankingSink};
use anyhow::Context as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RankCli {
    pub gamemaster: PathBuf,
    pub format_id: String,
    pub mode: Option<MovesetMode>,
    pub output_dir: PathBuf,
    pub matrix_path: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SimulateCli {
    pub gamemaster: PathBuf,
    pub a: CombatantSpec,
    pub b: CombatantSpec,
    pub cp_cap: Option<u32>,
    pub shields: [u8; 2],
    pub energy: [u8; 2],
    pub log: bool,
    pub log_json: bool,
}

pub fn load_dataset(path: &Path) -> anyhow::Result<model::Dataset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gamemaster at {}", path.display()))?;
    let dataset = model::Dataset::from_json_str(&raw)
        .with_context(|| format!("Failed to load gamemaster from {}", path.display()))?;
    Ok(dataset)
}

/// Reads movesets from an earlier ranking report.
pub fn load_reference(path: &Path) -> anyhow::Result<ReferenceMovesets> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference ranking at {}", path.display()))?;
    let report: RankingReport = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
    Ok(report.movesets())
}

/// Parses `species[:shadow]:FAST:CHARGED[,CHARGED]`.
pub fn parse_combatant(raw: &str) -> anyhow::Result<CombatantSpec> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (species, form, fast, charged) = match parts.as_slice() {
        [species, fast, charged] => (*species, Form::Normal, *fast, *charged),
        [species, "shadow", fast, charged] => (*species, Form::Shadow, *fast, *charged),
        _ => anyhow::bail!(
            "Invalid combatant '{raw}' (expected species[:shadow]:FAST:CHARGED[,CHARGED])"
        ),
    };
    if species.is_empty() || fast.is_empty() || charged.is_empty() {
        anyhow::bail!("Invalid combatant '{raw}': empty field");
    }
    let charged: Vec<&str> = charged.split(',').collect();
    let mut spec = CombatantSpec::new(species, Moveset::new(fast, &charged));
    spec.form = form;
    Ok(spec)
}

pub fn run_rank(opts: RankCli) -> anyhow::Result<()> {
    let dataset = load_dataset(&opts.gamemaster)?;
    let ctx = Context::new(dataset);
    let format = ctx.format(&opts.format_id)?.clone();

    let mut options = RankOptions {
        battle: ctx.battle_options(),
        mode: opts.mode,
        ..RankOptions::default()
    };
    options.auto.seed = opts.seed;
    if let Some(path) = &opts.reference {
        options.reference = Some(load_reference(path)?);
    }

    let report = ctx
        .rank(&format, &RuleFilter, &options)
        .with_context(|| format!("Ranking run for {} failed", format.id))?;

    let sink = JsonDirSink::new(&opts.output_dir);
    sink.store(&report)?;
    println!(
        "Ranked {} combatants ({} excluded, {} battles) into {}",
        report.entries.len(),
        report.excluded.len(),
        report.battles,
        sink.path_for(&report.format_id).display()
    );
    for entry in report.entries.iter().take(10) {
        println!(
            "{:>3}. {:<24} {:>6.1}  {}",
            entry.rank, entry.id, entry.score, entry.moveset
        );
    }

    if let Some(path) = &opts.matrix_path {
        // Re-resolving hits the cache populated by the run.
        let mut profiles = Vec::with_capacity(report.entries.len());
        for entry in &report.entries {
            let mut spec = CombatantSpec::new(&entry.species_id, entry.moveset.clone());
            spec.form = entry.form;
            spec.level_cap = format.level_cap;
            profiles.push(ctx.resolve(&spec, format.cp_cap)?);
        }
        let matrix = compute_matrix(&profiles, &format.resolved_scenarios()?, &options.battle);
        write_csv(&matrix.ids, &matrix.blended(), path)?;
        println!("Wrote {}x{} matrix to {}", matrix.len(), matrix.len(), path.display());
    }
    Ok(())
}

pub fn run_simulate(opts: SimulateCli) -> anyhow::Result<()> {
    let dataset = load_dataset(&opts.gamemaster)?;
    let ctx = Context::new(dataset);
    let scenario = Scenario::new(opts.shields, opts.energy);
    let mut options = ctx.battle_options();
    options.record_log = opts.log || opts.log_json;

    let a = ctx.resolve(&opts.a, opts.cp_cap)?;
    let b = ctx.resolve(&opts.b, opts.cp_cap)?;
    let result = battle::simulate(&a, &b, &scenario, &options)?;

    if let Some(log) = &result.log {
        if opts.log_json {
            println!("{}", serde_json::to_string_pretty(&log.to_json())?);
        } else {
            for line in log.lines() {
                println!("{line}");
            }
        }
    }
    let ratings = pair_ratings(&result);
    for (side, profile) in [&a, &b].into_iter().enumerate() {
        println!(
            "{} (CP {}, level {}): {}/{} HP, rating {:.0} ({:?})",
            profile.id(),
            profile.cp,
            profile.level,
            result.hp[side],
            result.max_hp[side],
            ratings[side],
            Outcome::for_side(&result, side)
        );
    }
    println!("{:?} after {} turns", result.termination, result.turns);
    Ok(())
}
