//! Combat phase tests.
//!
//! Battles are driven through `resolve_turn` and the session pipeline, so
//! ordering, revalidation and elimination are seen the way players see
//! them.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use nation_turns::commands::Command;
use nation_turns::core::{
    EventKind, GameId, GameRng, NationId, PendingAction, PlayerId, RulesConfig, ScriptedRandom, Snapshot, TerritoryId,
};
use nation_turns::pipeline::combat::loss_rates;
use nation_turns::pipeline::{resolve_turn, NoNarrator, TurnEnd};
use nation_turns::session::{plan_join, plan_start, GameBuilder, GameSession, PipelineRun};
use nation_turns::store::{apply_commit, MemoryStore};

/// Avalon: a1 (capital, 10), a2 (3). Brigant: b1 (capital, 1), b2 (5), b3 (1).
fn map() -> GameBuilder {
    GameBuilder::new()
        .nation("Avalon", 500, 60)
        .nation("Brigant", 500, 60)
        .territory("a1", "Camelot", Some("Avalon"), 10, true)
        .territory("a2", "Lyonesse", Some("Avalon"), 3, false)
        .territory("b1", "Dunharrow", Some("Brigant"), 1, true)
        .territory("b2", "Westmarch", Some("Brigant"), 5, false)
        .territory("b3", "Fenmoor", Some("Brigant"), 1, false)
        .border("a1", "a2")
        .border("a1", "b2")
        .border("a1", "b3")
        .border("a2", "b1")
        .border("b1", "b2")
}

fn started(seed: u64) -> Snapshot {
    let config = RulesConfig::default();
    let mut snapshot = map().build(seed).unwrap();
    for (uid, nation) in [("p1", "Avalon"), ("p2", "Brigant")] {
        let patches = plan_join(&snapshot, &config, &PlayerId::new(uid), &NationId::new(nation), 0).unwrap();
        snapshot = apply_commit(&snapshot, &[], &patches).unwrap();
    }
    let patches = plan_start(&snapshot, &config, &PlayerId::new("p1"), 0).unwrap();
    apply_commit(&snapshot, &[], &patches).unwrap()
}

fn attack(snapshot: &mut Snapshot, nation: &str, from: &str, to: &str) {
    let turn = snapshot.turn;
    snapshot.pending_actions.push_back(PendingAction::attack(
        NationId::new(nation),
        TerritoryId::new(from),
        TerritoryId::new(to),
        turn,
    ));
}

fn quiet() -> RulesConfig {
    RulesConfig::default().with_dynamic_event_probability(0.0)
}

fn army(snapshot: &Snapshot, id: &str) -> i64 {
    snapshot.territory(&TerritoryId::new(id)).unwrap().army
}

#[test]
fn test_capital_attack_resolves_before_earlier_submission() {
    let mut snapshot = started(1);
    // Brigant queued first, but Avalon's attack targets a capital.
    attack(&mut snapshot, "Brigant", "b2", "a1");
    attack(&mut snapshot, "Avalon", "a2", "b1");

    let outcome = resolve_turn(&snapshot, &quiet(), &mut ScriptedRandom::constant(0.0), &NoNarrator);

    assert_eq!(outcome.battles.len(), 1);
    assert_eq!(outcome.battles[0].to, TerritoryId::new("b1"));
    assert_eq!(outcome.end, TurnEnd::Finished(Some(NationId::new("Avalon"))));
    assert!(outcome.snapshot.events.iter().any(|e| e.kind == EventKind::BattleError));
    assert_eq!(army(&outcome.snapshot, "a1"), 10);
}

#[test]
fn test_even_fight_leaves_defender_standing() {
    // 10 against 5 on open ground: whatever the rolls, the attacker loses
    // 4 and the defender keeps 2.
    for seed in 0..64 {
        let mut snapshot = started(seed);
        attack(&mut snapshot, "Avalon", "a1", "b2");
        let outcome = resolve_turn(&snapshot, &quiet(), &mut GameRng::for_turn(seed, 1), &NoNarrator);

        let report = &outcome.battles[0];
        assert!(!report.captured, "seed {seed}");
        assert_eq!(army(&outcome.snapshot, "b2"), 2, "seed {seed}");
        assert_eq!(army(&outcome.snapshot, "a1"), 6, "seed {seed}");
        assert!(outcome.snapshot.territory(&TerritoryId::new("b2")).unwrap().is_owned_by(&NationId::new("Brigant")));
    }
}

#[test]
fn test_lone_garrison_falls() {
    for seed in 0..64 {
        let mut snapshot = started(seed);
        attack(&mut snapshot, "Avalon", "a1", "b3");
        let outcome = resolve_turn(&snapshot, &quiet(), &mut GameRng::for_turn(seed, 1), &NoNarrator);

        let report = &outcome.battles[0];
        assert!(report.captured, "seed {seed}");
        assert_eq!(report.eliminated, None);

        let s = &outcome.snapshot;
        let left = 10 - report.attacker_losses;
        let garrison = (left as f64 * 0.6).floor() as i64;
        assert_eq!(army(s, "b3"), garrison, "seed {seed}");
        assert_eq!(army(s, "a1"), left - garrison, "seed {seed}");
        assert!(s.territory(&TerritoryId::new("b3")).unwrap().is_owned_by(&NationId::new("Avalon")));
        assert!(s.events.iter().any(|e| e.kind == EventKind::Conquest));
        assert_eq!(outcome.end, TurnEnd::Advanced(2));
    }
}

#[test]
fn test_capital_targets_precede_origin_order() {
    let mut snapshot = started(3);
    // a1 sorts before b2, but b2 is marching on a capital.
    attack(&mut snapshot, "Avalon", "a1", "b3");
    attack(&mut snapshot, "Brigant", "b2", "a1");

    let outcome = resolve_turn(&snapshot, &quiet(), &mut ScriptedRandom::constant(0.0), &NoNarrator);
    assert_eq!(outcome.battles.len(), 2);
    assert_eq!(outcome.battles[0].from, TerritoryId::new("b2"));
    assert_eq!(outcome.battles[1].from, TerritoryId::new("a1"));

    // a1 fought the second battle with what the first one left it.
    let first = &outcome.battles[0];
    assert_eq!(first.defender_losses, 3);
    assert_eq!(outcome.battles[1].attacker_power, 7.0);
}

#[test]
fn test_elimination_commits_in_one_revision() {
    let snapshot = map().build(21).unwrap();
    let session = GameSession::create(MemoryStore::new(), GameId::new("g"), quiet(), snapshot).unwrap();
    let (p1, p2) = (PlayerId::new("p1"), PlayerId::new("p2"));
    session.join_game(&p1, &NationId::new("Avalon"), 0).unwrap();
    session.join_game(&p2, &NationId::new("Brigant"), 0).unwrap();
    session.start_game(&p1, 0).unwrap();

    let seen: Arc<Mutex<Vec<Snapshot>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let subscription = session
        .subscribe(Arc::new(move |s: &Snapshot| sink.lock().unwrap().push(s.clone())))
        .unwrap();

    let outcome = session.submit_command(
        &p1,
        Command::Attack {
            from: TerritoryId::new("a2"),
            to: TerritoryId::new("b1"),
        },
        1,
    );
    assert!(outcome.success, "{}", outcome.message);
    session.end_turn(&p1, 2).unwrap();
    session.end_turn(&p2, 2).unwrap();

    let before = session.snapshot().unwrap();
    let run = session.run_pipeline_if_ready(&p1, &before, 3).unwrap();
    assert_eq!(
        run,
        PipelineRun::Finished {
            winner: Some(NationId::new("Avalon"))
        }
    );

    let after = session.snapshot().unwrap();
    assert_eq!(after.revision, before.revision + 1);
    assert_eq!(after.territory_count(&NationId::new("Avalon")), 5);

    // No published state ever shows an eliminated nation holding land.
    for snapshot in seen.lock().unwrap().iter() {
        for nation in snapshot.nations.values().filter(|n| !n.is_active()) {
            assert_eq!(snapshot.territory_count(&nation.name), 0);
        }
    }
    subscription.unsubscribe();
}

#[test]
fn test_loss_rates_hit_the_clamps() {
    let config = RulesConfig::default();
    let (attacker, defender) = loss_rates(&config, 1000.0, 1.0);
    assert!((attacker - config.loss_rate_min).abs() < 1e-12);
    assert!((defender - config.loss_rate_max).abs() < 1e-12);

    let (attacker, defender) = loss_rates(&config, 1.0, 1000.0);
    assert!((attacker - config.loss_rate_max).abs() < 1e-12);
    assert!((defender - config.loss_rate_min).abs() < 1e-12);
}

proptest! {
    #[test]
    fn prop_loss_rates_stay_in_bounds(attacker in 0.0f64..1e6, defender in 0.0f64..1e6) {
        let config = RulesConfig::default();
        let (a, d) = loss_rates(&config, attacker, defender);
        prop_assert!((config.loss_rate_min..=config.loss_rate_max).contains(&a));
        prop_assert!((config.loss_rate_min..=config.loss_rate_max).contains(&d));
    }

    #[test]
    fn prop_armies_never_negative(seed in any::<u64>(), garrison in 0i64..40) {
        let mut snapshot = started(seed);
        snapshot.territories.get_mut(&TerritoryId::new("b2")).unwrap().army = garrison;
        attack(&mut snapshot, "Avalon", "a1", "b2");
        attack(&mut snapshot, "Brigant", "b2", "a1");

        let outcome = resolve_turn(&snapshot, &quiet(), &mut GameRng::new(seed), &NoNarrator);
        for territory in outcome.snapshot.territories.values() {
            prop_assert!(territory.army >= 0);
        }
    }
}
