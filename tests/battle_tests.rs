use pokemon_pvp_rankings::battle::{
    compute_damage, simulate, simulate_with_policy, BattleOptions, BuffRoll, CmpTieBreak,
    Scenario, Termination, MAX_ENERGY,
};
use pokemon_pvp_rankings::battle_log::LogEvent;
use pokemon_pvp_rankings::model::{MoveCategory, MoveDef, MoveEffect, MoveFlags, Ivs};
use pokemon_pvp_rankings::policy::{
    Action, ActionPolicy, DecisionView, IncomingAttack, StandardPolicy,
};
use pokemon_pvp_rankings::profile::{CombatProfile, Form, StatStages};
use pokemon_pvp_rankings::rating::{pair_ratings, Outcome};
use pokemon_pvp_rankings::types::Type;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn make_move(
    id: &str,
    move_type: Type,
    category: MoveCategory,
    power: u32,
    energy: u32,
    turns: u32,
) -> Arc<MoveDef> {
    Arc::new(MoveDef {
        id: id.to_string(),
        name: id.to_string(),
        move_type,
        category,
        power,
        energy,
        turns,
        effects: Vec::new(),
        effect_chance: 1.0,
        flags: MoveFlags::default(),
    })
}

fn make_profile(
    id: &str,
    types: &[Type],
    attack: f64,
    defense: f64,
    hp: u32,
    fast: Arc<MoveDef>,
    charged: Vec<Arc<MoveDef>>,
) -> CombatProfile {
    CombatProfile {
        species_id: id.to_string(),
        form: Form::Normal,
        level: 20.0,
        ivs: Ivs::new(15, 15, 15),
        cp: 1500,
        attack,
        defense,
        hp,
        types: types.to_vec(),
        fast_move: fast,
        charged_moves: charged,
        start_stages: StatStages::default(),
    }
}

fn plain_options() -> BattleOptions {
    BattleOptions {
        damage_bonus: 1.0,
        record_log: true,
        ..BattleOptions::default()
    }
}

fn random_profile(rng: &mut SmallRng, id: &str) -> CombatProfile {
    let types = [Type::Water, Type::Fire, Type::Grass, Type::Steel, Type::Fairy, Type::Dragon];
    let pick = |rng: &mut SmallRng| types[rng.gen_range(0..types.len())];
    let fast = make_move(
        "FAST",
        pick(rng),
        MoveCategory::Fast,
        rng.gen_range(1..12),
        rng.gen_range(3..14),
        rng.gen_range(1..5),
    );
    let charged = (0..rng.gen_range(1..=2))
        .map(|i| {
            make_move(
                &format!("CHARGED_{i}"),
                pick(rng),
                MoveCategory::Charged,
                rng.gen_range(40..150),
                rng.gen_range(35..80),
                1,
            )
        })
        .collect();
    make_profile(
        id,
        &[pick(rng)],
        rng.gen_range(90.0..160.0),
        rng.gen_range(90.0..160.0),
        rng.gen_range(100..180),
        fast,
        charged,
    )
}

#[test]
fn mirror_match_is_a_tie() {
    let fast = make_move("COUNTER", Type::Fighting, MoveCategory::Fast, 8, 7, 2);
    let charged = vec![
        make_move("ICE_PUNCH", Type::Ice, MoveCategory::Charged, 55, 40, 1),
        make_move("PSYCHIC", Type::Psychic, MoveCategory::Charged, 90, 55, 1),
    ];
    let a = make_profile("medicham", &[Type::Fighting, Type::Psychic], 105.0, 139.0, 141, fast, charged);
    let b = a.clone();
    for shields in 0..=2 {
        let result = simulate(&a, &b, &Scenario::new([shields, shields], [0, 0]), &plain_options())
            .unwrap();
        let [ra, rb] = pair_ratings(&result);
        assert_eq!(ra, rb, "shields {shields}");
        assert_eq!(result.hp[0], result.hp[1]);
        assert_eq!(result.shields_used[0], result.shields_used[1]);
        assert_eq!(result.winner(), None);
        assert_eq!(Outcome::for_side(&result, 0), Outcome::Tie);
        assert_eq!(Outcome::for_side(&result, 1), Outcome::Tie);
    }
}

#[test]
fn bait_is_shielded_then_burst_lands() {
    let a = make_profile(
        "attacker",
        &[Type::Normal],
        100.0,
        100.0,
        1000,
        make_move("EMBER", Type::Fire, MoveCategory::Fast, 2, 10, 1),
        vec![make_move("FLAME", Type::Fire, MoveCategory::Charged, 90, 35, 1)],
    );
    let b = make_profile(
        "defender",
        &[Type::Normal],
        50.0,
        100.0,
        100,
        make_move("POKE", Type::Normal, MoveCategory::Fast, 1, 1, 1),
        Vec::new(),
    );
    let result = simulate(&a, &b, &Scenario::new([0, 1], [0, 0]), &plain_options()).unwrap();
    let log = result.log.as_ref().unwrap();
    let charged: Vec<(u32, bool)> = log
        .events()
        .filter_map(|(_, e)| match e {
            LogEvent::ChargedMove {
                side: 0,
                damage,
                shielded,
                ..
            } => Some((*damage, *shielded)),
            _ => None,
        })
        .collect();
    assert_eq!(charged[0], (0, true));
    assert_eq!(charged[1], (46, false));
    assert_eq!(result.shields_used, [0, 1]);
    assert_eq!(result.winner(), Some(0));
}

#[test]
fn battles_are_deterministic() {
    let mut rng = SmallRng::seed_from_u64(7);
    let a = random_profile(&mut rng, "a");
    let b = random_profile(&mut rng, "b");
    let scenario = Scenario::new([1, 2], [0, 3]);
    let first = simulate(&a, &b, &scenario, &plain_options()).unwrap();
    let second = simulate(&a, &b, &scenario, &plain_options()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn random_battles_respect_resource_bounds() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    for _ in 0..60 {
        let a = random_profile(&mut rng, "a");
        let b = random_profile(&mut rng, "b");
        let scenario = Scenario::new(
            [rng.gen_range(0..=2), rng.gen_range(0..=2)],
            [rng.gen_range(0..=6), rng.gen_range(0..=6)],
        );
        let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();
        let log = result.log.as_ref().unwrap();

        for entry in log.turns() {
            for side in &entry.sides {
                assert!(side.energy <= MAX_ENERGY);
            }
        }
        for (_, event) in log.events() {
            match event {
                LogEvent::FastMove { damage, .. } => assert!(*damage >= 1),
                LogEvent::ChargedMove {
                    damage, shielded, ..
                } => assert!(*shielded || *damage >= 1),
                _ => {}
            }
        }
        assert!(result.shields_used[0] <= scenario.shields[0]);
        assert!(result.shields_used[1] <= scenario.shields[1]);
        assert!(result.turns <= scenario.max_turns);
    }
}

#[test]
fn mirrored_scenarios_mirror_results() {
    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..30 {
        let a = random_profile(&mut rng, "a");
        let b = random_profile(&mut rng, "b");
        let scenario = Scenario::new([rng.gen_range(0..=2), rng.gen_range(0..=2)], [0, 2]);
        let options = BattleOptions {
            damage_bonus: 1.3,
            ..BattleOptions::default()
        };
        let forward = simulate(&a, &b, &scenario, &options).unwrap();
        let reverse = simulate(&b, &a, &scenario.mirrored(), &options).unwrap();
        assert_eq!(forward.hp, [reverse.hp[1], reverse.hp[0]]);
        assert_eq!(forward.turns, reverse.turns);
        assert_eq!(forward.termination, reverse.termination);
        let [fa, fb] = pair_ratings(&forward);
        let [rb, ra] = pair_ratings(&reverse);
        assert_eq!((fa, fb), (ra, rb));
    }
}

#[test]
fn long_stall_times_out() {
    let fast = make_move("SPLASH", Type::Water, MoveCategory::Fast, 0, 0, 1);
    let a = make_profile("a", &[Type::Normal], 10.0, 500.0, 500, fast.clone(), Vec::new());
    let b = make_profile("b", &[Type::Normal], 10.0, 500.0, 500, fast, Vec::new());
    let scenario = Scenario::new([0, 0], [0, 0]).with_max_turns(10);
    let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();
    assert_eq!(result.termination, Termination::Timeout);
    assert_eq!(result.turns, 10);
    // Minimum damage is still dealt every turn.
    assert_eq!(result.hp, [490, 490]);
}

#[test]
fn higher_attack_throws_first() {
    let fast = make_move("TAP", Type::Normal, MoveCategory::Fast, 1, 10, 1);
    let nuke = make_move("NUKE", Type::Normal, MoveCategory::Charged, 200, 50, 1);
    let a = make_profile("a", &[Type::Fire], 120.0, 100.0, 50, fast.clone(), vec![nuke.clone()]);
    let b = make_profile("b", &[Type::Fire], 100.0, 100.0, 50, fast, vec![nuke]);
    let scenario = Scenario::new([0, 0], [5, 5]);
    let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();
    assert_eq!(result.termination, Termination::Faint);
    assert_eq!(result.winner(), Some(0));
    assert_eq!(result.charged_thrown, [1, 0]);
    assert_eq!(result.turns, 1);
}

#[test]
fn equal_attack_trades_simultaneously() {
    let fast = make_move("TAP", Type::Normal, MoveCategory::Fast, 1, 10, 1);
    let nuke = make_move("NUKE", Type::Normal, MoveCategory::Charged, 200, 50, 1);
    let a = make_profile("a", &[Type::Fire], 100.0, 100.0, 50, fast.clone(), vec![nuke.clone()]);
    let b = make_profile("b", &[Type::Fire], 100.0, 100.0, 50, fast, vec![nuke]);
    let scenario = Scenario::new([0, 0], [5, 5]);

    let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();
    assert_eq!(result.termination, Termination::DoubleFaint);
    assert_eq!(result.charged_thrown, [1, 1]);

    let options = BattleOptions {
        cmp_tie_break: CmpTieBreak::SideB,
        ..plain_options()
    };
    let result = simulate(&a, &b, &scenario, &options).unwrap();
    assert_eq!(result.winner(), Some(1));
}

#[test]
fn buff_roll_controls_stat_changes() {
    let mut pup = MoveDef::clone(&make_move("POWER_UP_PUNCH", Type::Fighting, MoveCategory::Charged, 20, 35, 1));
    pup.effects = vec![MoveEffect::SelfStages {
        attack: 1,
        defense: 0,
    }];
    pup.effect_chance = 0.5;
    let a = make_profile(
        "a",
        &[Type::Fighting],
        120.0,
        120.0,
        400,
        make_move("COUNTER", Type::Fighting, MoveCategory::Fast, 8, 7, 2),
        vec![Arc::new(pup)],
    );
    let b = make_profile(
        "b",
        &[Type::Water],
        100.0,
        120.0,
        400,
        make_move("BUBBLE", Type::Water, MoveCategory::Fast, 8, 11, 3),
        Vec::new(),
    );
    let scenario = Scenario::new([0, 0], [0, 0]);
    let stat_changes = |buff_roll: BuffRoll| {
        let options = BattleOptions {
            buff_roll,
            ..plain_options()
        };
        let result = simulate(&a, &b, &scenario, &options).unwrap();
        result
            .log
            .unwrap()
            .events()
            .filter(|(_, e)| matches!(e, LogEvent::StatChange { side: 0, .. }))
            .count()
    };
    assert_eq!(stat_changes(BuffRoll::GuaranteedOnly), 0);
    assert_eq!(stat_changes(BuffRoll::Never), 0);
    assert!(stat_changes(BuffRoll::Always) > 0);
}

#[test]
fn damage_is_never_below_one() {
    let a = make_profile(
        "a",
        &[Type::Normal],
        10.0,
        10.0,
        100,
        make_move("TACKLE", Type::Normal, MoveCategory::Fast, 0, 3, 1),
        Vec::new(),
    );
    let ghost = make_profile(
        "b",
        &[Type::Ghost],
        10.0,
        10_000.0,
        100,
        make_move("LICK", Type::Ghost, MoveCategory::Fast, 3, 3, 1),
        Vec::new(),
    );
    let weak = make_move("TACKLE", Type::Normal, MoveCategory::Fast, 5, 3, 1);
    let dmg = compute_damage(&a, StatStages::default(), &ghost, StatStages::default(), &weak, 1.3);
    assert_eq!(dmg, 1);
}

struct NeverShield;

impl ActionPolicy for NeverShield {
    fn choose_action(&self, view: &DecisionView<'_>) -> Action {
        StandardPolicy::default().choose_action(view)
    }

    fn should_shield(&self, _: &IncomingAttack<'_>) -> bool {
        false
    }
}

#[test]
fn shield_policy_can_be_replaced() {
    let mut rng = SmallRng::seed_from_u64(3);
    let a = random_profile(&mut rng, "a");
    let b = random_profile(&mut rng, "b");
    let result = simulate_with_policy(
        &a,
        &b,
        &Scenario::new([2, 2], [0, 0]),
        &plain_options(),
        &NeverShield,
    )
    .unwrap();
    assert_eq!(result.shields_used, [0, 0]);
}

#[test]
fn invalid_scenario_is_rejected() {
    let mut rng = SmallRng::seed_from_u64(1);
    let a = random_profile(&mut rng, "a");
    let b = random_profile(&mut rng, "b");
    let err = simulate(&a, &b, &Scenario::new([3, 1], [0, 0]), &plain_options()).unwrap_err();
    assert!(err.is_fatal());
    let zero_weight = Scenario::new([1, 1], [0, 0]).with_weight(0.0);
    assert!(simulate(&a, &b, &zero_weight, &plain_options()).is_err());
}

fn with_effect(mv: Arc<MoveDef>, effect: MoveEffect) -> Arc<MoveDef> {
    let mut mv = MoveDef::clone(&mv);
    mv.effects = vec![effect];
    Arc::new(mv)
}

fn fast_damage_log(result: &pokemon_pvp_rankings::BattleResult, side: usize) -> Vec<u32> {
    result
        .log
        .as_ref()
        .unwrap()
        .events()
        .filter_map(|(_, e)| match e {
            LogEvent::FastMove { side: s, damage, .. } if *s == side => Some(*damage),
            _ => None,
        })
        .collect()
}

#[test]
fn stacked_stage_changes_in_one_turn_saturate() {
    let rage = with_effect(
        make_move("RAGE", Type::Normal, MoveCategory::Fast, 3, 0, 1),
        MoveEffect::SelfStages {
            attack: 100,
            defense: 0,
        },
    );
    let taunt = with_effect(
        make_move("TAUNT", Type::Normal, MoveCategory::Fast, 3, 0, 1),
        MoveEffect::OpponentStages {
            attack: 100,
            defense: 0,
        },
    );
    let a = make_profile("a", &[Type::Normal], 100.0, 100.0, 1000, Arc::clone(&rage), Vec::new());
    let b = make_profile("b", &[Type::Normal], 100.0, 100.0, 1000, taunt, Vec::new());
    let scenario = Scenario::new([0, 0], [0, 0]).with_max_turns(4);
    let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();

    assert_eq!(result.termination, Termination::Timeout);
    let dealt = fast_damage_log(&result, 0);
    assert_eq!(dealt.len(), 4);
    let boosted = StatStages {
        attack: StatStages::MAX,
        defense: 0,
    };
    assert_eq!(dealt[0], compute_damage(&a, StatStages::default(), &b, StatStages::default(), &rage, 1.0));
    assert_eq!(dealt[1], compute_damage(&a, boosted, &b, StatStages::default(), &rage, 1.0));
    assert_eq!(dealt[3], dealt[1]);
}

#[test]
fn defense_debuff_raises_later_damage_until_clamped() {
    let screech = with_effect(
        make_move("SCREECH", Type::Normal, MoveCategory::Fast, 10, 0, 1),
        MoveEffect::OpponentStages {
            attack: 0,
            defense: -2,
        },
    );
    let a = make_profile("a", &[Type::Normal], 100.0, 100.0, 500, Arc::clone(&screech), Vec::new());
    let b = make_profile(
        "b",
        &[Type::Water],
        100.0,
        100.0,
        500,
        make_move("SPLASH", Type::Water, MoveCategory::Fast, 1, 0, 1),
        Vec::new(),
    );
    let scenario = Scenario::new([0, 0], [0, 0]).with_max_turns(5);
    let result = simulate(&a, &b, &scenario, &plain_options()).unwrap();

    let dealt = fast_damage_log(&result, 0);
    assert_eq!(dealt.len(), 5);
    for (hit, &damage) in dealt.iter().enumerate() {
        let stage = (-2 * hit as i8).max(StatStages::MIN);
        let target = StatStages {
            attack: 0,
            defense: stage,
        };
        let expected = compute_damage(&a, StatStages::default(), &b, target, &screech, 1.0);
        assert_eq!(damage, expected, "hit {hit}");
    }
    assert_eq!(dealt[0], 7);
    assert!(dealt[0] < dealt[1] && dealt[1] < dealt[2]);
    assert_eq!(dealt[2], 13);
    assert_eq!(dealt[4], dealt[2]);

    let debuffs = result
        .log
        .as_ref()
        .unwrap()
        .events()
        .filter(|(_, e)| matches!(e, LogEvent::StatChange { side: 1, defense: -2, .. }))
        .count();
    assert_eq!(debuffs, 5);
}
