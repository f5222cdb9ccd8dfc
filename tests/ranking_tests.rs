use pokemon_pvp_rankings::battle::Scenario;
use pokemon_pvp_rankings::error::Error;
use pokemon_pvp_rankings::format::{Candidate, EligibilityFilter, Format, RuleFilter, ScenarioRef};
use pokemon_pvp_rankings::model::{Dataset, GameMaster};
use pokemon_pvp_rankings::moveset::{candidate_movesets, MovesetMode};
use pokemon_pvp_rankings::profile::{CombatantSpec, Form, Moveset};
use pokemon_pvp_rankings::ranking::{CancelToken, RankOptions, RankingReport};
use pokemon_pvp_rankings::rating::pair_ratings;
use pokemon_pvp_rankings::sink::{JsonDirSink, MemorySink, RankingSink};
use pokemon_pvp_rankings::Context;

const GAMEMASTER: &str = include_str!("../data/gamemaster.sample.json");

fn make_context() -> Context {
    Context::new(Dataset::from_json_str(GAMEMASTER).unwrap())
}

/// Sample dataset where Medicham can learn a move the move table lacks.
fn make_dataset_with_unknown_move() -> Dataset {
    let mut raw: serde_json::Value = serde_json::from_str(GAMEMASTER).unwrap();
    let medicham = raw["pokemon"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|p| p["speciesId"] == "medicham")
        .unwrap();
    medicham["fastMoves"]
        .as_array_mut()
        .unwrap()
        .push("PHANTOM_STRIKE".into());
    let gm: GameMaster = serde_json::from_value(raw).unwrap();
    Dataset::new(gm).unwrap()
}

fn make_format(ctx: &Context, id: &str) -> Format {
    ctx.format(id).unwrap().clone()
}

fn make_options(ctx: &Context) -> RankOptions {
    RankOptions {
        battle: ctx.battle_options(),
        ..RankOptions::default()
    }
}

/// Fixed roster without shadows, in a stable order.
struct Roster(Vec<&'static str>);

impl EligibilityFilter for Roster {
    fn eligible(&self, _: &Dataset, _: &Format) -> Vec<Candidate> {
        self.0.iter().map(|id| Candidate::new(*id, Form::Normal)).collect()
    }
}

fn assert_sorted(report: &RankingReport) {
    for pair in report.entries.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.score > b.score
                || (a.score == b.score && a.raw_score > b.raw_score)
                || (a.score == b.score && a.raw_score == b.raw_score && a.id < b.id),
            "{} before {}",
            a.id,
            b.id
        );
        assert_eq!(a.rank + 1, b.rank);
    }
}

#[test]
fn great_league_ranks_every_eligible_combatant() {
    let ctx = make_context();
    let format = make_format(&ctx, "great");
    let report = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap();

    // Six species plus four shadow-eligible forms.
    assert_eq!(report.entries.len() + report.excluded.len(), 10);
    assert!(report.excluded.is_empty(), "{:?}", report.excluded);
    assert_sorted(&report);
    assert_eq!(report.entries[0].rank, 1);
    assert_eq!(report.iteration_deltas.len(), format.iterations);

    let n = report.entries.len();
    for entry in &report.entries {
        assert!(entry.cp <= 1500);
        assert_eq!(entry.matchups.len(), n - 1);
        assert!(entry.top_matchups.len() <= 5);
        assert!(entry.top_counters.len() <= 5);
        assert!(entry.score >= 0.0);
    }

    let medicham = report.entry("medicham").unwrap();
    assert_eq!(medicham.moveset, Moveset::new("COUNTER", &["ICE_PUNCH", "PSYCHIC"]));
}

#[test]
fn rankings_are_idempotent() {
    let ctx = make_context();
    let format = make_format(&ctx, "great");
    let first = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap();
    let second = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let fresh = make_context();
    let third = fresh.rank(&format, &RuleFilter, &make_options(&fresh)).unwrap();
    assert_eq!(first, third);
}

#[test]
fn bad_override_excludes_only_that_combatant() {
    let ctx = make_context();
    let mut format = make_format(&ctx, "great");
    format
        .movesets
        .insert("azumarill".to_string(), Moveset::new("BUBBLE", &["FOCUS_BLAST"]));
    let roster = Roster(vec!["medicham", "azumarill", "registeel"]);
    let report = ctx.rank(&format, &roster, &make_options(&ctx)).unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].id, "azumarill");
    assert!(report.excluded[0].reason.contains("Invalid moveset"));
    assert!(report.entries.iter().all(|e| e.matchups.len() == 1));
}

#[test]
fn missing_move_data_excludes_only_that_combatant() {
    let ctx = Context::new(make_dataset_with_unknown_move());
    let mut format = make_format(&ctx, "great");
    format
        .movesets
        .insert("medicham".to_string(), Moveset::new("PHANTOM_STRIKE", &["ICE_PUNCH"]));
    let roster = Roster(vec!["medicham", "azumarill", "registeel"]);
    let report = ctx.rank(&format, &roster, &make_options(&ctx)).unwrap();

    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].id, "medicham");
    assert!(report.excluded[0].reason.contains("PHANTOM_STRIKE"));
    assert_eq!(report.entries.len(), 2);
    assert!(report.entries.iter().all(|e| e.matchups.len() == 1));
}

#[test]
fn combatants_above_the_cap_at_level_one_are_excluded() {
    let ctx = make_context();
    let mut format = make_format(&ctx, "great");
    format.cp_cap = Some(25);
    let roster = Roster(vec!["medicham", "azumarill", "registeel"]);
    let report = ctx.rank(&format, &roster, &make_options(&ctx)).unwrap();

    // Medicham (20) and Azumarill (22) fit at level 1; Registeel (34) cannot.
    let ids: Vec<_> = report.excluded.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["registeel"]);
    assert_eq!(report.entries.len(), 2);
}

#[test]
fn invalid_format_is_fatal() {
    let ctx = make_context();
    let mut format = make_format(&ctx, "great");
    format.scenarios = vec![ScenarioRef::Custom(Scenario::new([3, 1], [0, 0]))];
    let err = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    format.scenarios.clear();
    assert!(ctx.rank(&format, &RuleFilter, &make_options(&ctx)).is_err());
}

#[test]
fn cancelled_runs_stop_between_passes() {
    let ctx = make_context();
    let format = make_format(&ctx, "great");
    let token = CancelToken::new();
    token.cancel();
    let options = RankOptions {
        cancel: Some(token),
        ..make_options(&ctx)
    };
    let err = ctx.rank(&format, &RuleFilter, &options).unwrap_err();
    assert_eq!(err, Error::Cancelled(0));
}

#[test]
fn weight_modifier_leaves_own_first_pass_score_alone() {
    let ctx = make_context();
    let mut format = make_format(&ctx, "great");
    format.iterations = 1;
    let roster = Roster(vec!["medicham", "azumarill", "registeel", "altaria", "skarmory"]);
    let base = ctx.rank(&format, &roster, &make_options(&ctx)).unwrap();

    format.weight_modifiers.insert("registeel".to_string(), 0.0);
    let muted = ctx.rank(&format, &roster, &make_options(&ctx)).unwrap();

    let before = base.entry("registeel").unwrap().raw_score;
    let after = muted.entry("registeel").unwrap().raw_score;
    assert!((before - after).abs() < 1e-9);
    for entry in &muted.entries {
        assert!(entry.raw_score.is_finite());
    }
}

#[test]
fn custom_cup_uses_its_rules() {
    let ctx = make_context();
    let format = make_format(&ctx, "steel-cup");
    let report = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap();

    let mut ids: Vec<_> = report.entries.iter().map(|e| e.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, ["azumarill", "registeel", "skarmory"]);
    assert_eq!(report.iteration_deltas.len(), 5);
    // One symmetric scenario and one weighted custom scenario, one battle per pair each.
    assert_eq!(report.battles, 6);
}

#[test]
fn auto_mode_picks_legal_movesets_deterministically() {
    let ctx = make_context();
    let format = make_format(&ctx, "steel-cup");
    let options = RankOptions {
        mode: Some(MovesetMode::Auto),
        ..make_options(&ctx)
    };
    let first = ctx.rank(&format, &RuleFilter, &options).unwrap();
    let second = ctx.rank(&format, &RuleFilter, &options).unwrap();
    assert_eq!(first, second);

    for entry in &first.entries {
        let species = ctx.dataset().species(&entry.species_id).unwrap();
        let legal = candidate_movesets(ctx.dataset(), species, format.allow_elite);
        assert!(legal.contains(&entry.moveset), "{} {}", entry.id, entry.moveset);
    }
}

#[test]
fn forced_mode_uses_reference_movesets() {
    let ctx = make_context();
    let mut format = make_format(&ctx, "great");
    format.movesets.clear();
    let roster = Roster(vec!["medicham", "azumarill", "registeel"]);

    let mut reference = std::collections::BTreeMap::new();
    reference.insert(
        "medicham".to_string(),
        Moveset::new("PSYCHO_CUT", &["DYNAMIC_PUNCH", "POWER_UP_PUNCH"]),
    );
    let options = RankOptions {
        reference: Some(reference),
        ..make_options(&ctx)
    };
    let report = ctx.rank(&format, &roster, &options).unwrap();
    assert_eq!(
        report.entry("medicham").unwrap().moveset,
        Moveset::new("PSYCHO_CUT", &["DYNAMIC_PUNCH", "POWER_UP_PUNCH"])
    );
    // The rest fell back to auto selection.
    assert_eq!(report.entries.len(), 3);
}

#[test]
fn reports_round_trip_through_sinks() {
    let ctx = make_context();
    let format = make_format(&ctx, "steel-cup");
    let report = ctx.rank(&format, &RuleFilter, &make_options(&ctx)).unwrap();

    let memory = MemorySink::new();
    memory.store(&report).unwrap();
    assert_eq!(memory.reports(), vec![report.clone()]);

    let dir = std::env::temp_dir().join("pvp_rankings_sink_test");
    let sink = JsonDirSink::new(&dir);
    sink.store(&report).unwrap();
    let raw = std::fs::read_to_string(sink.path_for("steel-cup")).unwrap();
    let parsed: RankingReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.movesets(), report.movesets());
    assert_eq!(parsed.entries.len(), report.entries.len());
}

#[test]
fn context_simulates_mirror_matches_evenly() {
    let ctx = make_context();
    let spec = CombatantSpec::new("azumarill", Moveset::new("BUBBLE", &["ICE_BEAM", "PLAY_ROUGH"]));
    let leads = pokemon_pvp_rankings::format::preset_scenario("leads").unwrap();
    let result = ctx.simulate(&spec, &spec, &leads, Some(1500)).unwrap();
    let [a, b] = pair_ratings(&result);
    assert_eq!(a, b);
}
