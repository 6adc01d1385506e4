//! Phase C: combat resolution.
//!
//! Every attack queued this turn is fought here, in a fixed order:
//!
//! 1. Attacks on capitals, then attacks on other territories
//! 2. Within each group, by attacking territory id
//!
//! Each attack is re-checked against the running state first. An earlier
//! battle may have taken the origin or the target, in which case the
//! attack is dropped with a `battle_error` event.
//!
//! ## Formulas
//!
//! - `bonus = engineering_level * (effect_per_level + fixed_increment)`
//! - defender adds terrain, and the capital bonus at a capital
//! - `power = army * U(1, 1 + variance) * (1 + bonus)`
//! - loss rates are clamped to `[loss_rate_min, loss_rate_max]`
//!
//! A defender left with no army loses the territory. Losing a capital
//! eliminates the nation, and [`cascade_eliminate`] hands every other
//! territory it owned to the conqueror.

use tracing::{debug, info, warn};

use crate::core::{
    Event, EventKind, NationId, NationStatus, PendingAction, PendingKind, PlayerStatus, RandomSource, RulesConfig, Snapshot,
    Technology, Territory, TerritoryId,
};
use crate::error::ValidationError;
use crate::store::{Field, Patch, Value};

/// Outcome of one fought battle.
#[derive(Clone, Debug, PartialEq)]
pub struct BattleReport {
    /// Nation that launched the attack.
    pub attacker: NationId,
    /// Owner of the target, `None` for unclaimed land.
    pub defender: Option<NationId>,
    /// Territory the attack was launched from.
    pub from: TerritoryId,
    /// Territory under attack.
    pub to: TerritoryId,
    /// Attacking army scaled by the variance roll and engineering.
    pub attacker_power: f64,
    /// Defending garrison scaled by the variance roll and defense bonuses.
    pub defender_power: f64,
    /// Troops the origin territory lost.
    pub attacker_losses: i64,
    /// Troops the target garrison lost.
    pub defender_losses: i64,
    /// Whether the garrison was wiped out and the target changed hands.
    pub captured: bool,
    /// Set when the battle took a capital.
    pub eliminated: Option<NationId>,
}

/// Sort this turn's attacks into resolution order.
///
/// Capital status is read from `state` as it is before any battle.
#[must_use]
pub fn order_attacks(state: &Snapshot) -> Vec<PendingAction> {
    let mut attacks: Vec<_> = state
        .pending_actions
        .iter()
        .filter(|a| a.turn == state.turn && a.attack_route().is_some())
        .cloned()
        .collect();

    attacks.sort_by_cached_key(|action| {
        let route = action.attack_route();
        let targets_capital = route
            .and_then(|(_, to)| state.territory(to))
            .is_some_and(|t| t.is_capital);
        (!targets_capital, route.map(|(from, _)| from.clone()))
    });
    attacks
}

/// Engineering bonus shared by both sides.
#[must_use]
pub fn engineering_bonus(config: &RulesConfig, engineering_level: u32) -> f64 {
    f64::from(engineering_level) * (config.engineering_effect_per_level + config.tech_fixed_increment)
}

/// Total defender bonus.
#[must_use]
pub fn defender_bonus(config: &RulesConfig, engineering_level: u32, at_capital: bool) -> f64 {
    let capital = if at_capital { config.capital_defense_bonus } else { 0.0 };
    engineering_bonus(config, engineering_level) + config.terrain_defense_bonus + capital
}

/// Combat power of one side.
#[must_use]
pub fn power(army: i64, roll: f64, bonus: f64) -> f64 {
    army as f64 * roll * (1.0 + bonus)
}

/// `(attacker_rate, defender_rate)` for the given powers, clamped.
#[must_use]
pub fn loss_rates(config: &RulesConfig, attacker_power: f64, defender_power: f64) -> (f64, f64) {
    let total = attacker_power + defender_power;
    if total <= 0.0 {
        return (config.loss_rate_min, config.loss_rate_min);
    }
    (
        config.clamp_loss_rate(defender_power / total * config.attacker_loss_factor),
        config.clamp_loss_rate(attacker_power / total * config.defender_loss_factor),
    )
}

/// Units lost by an army at the given rate.
#[must_use]
pub fn casualties(army: i64, rate: f64) -> i64 {
    (army as f64 * rate).round() as i64
}

/// Re-check a queued attack against the running state.
pub fn revalidate(state: &Snapshot, action: &PendingAction) -> Result<(TerritoryId, TerritoryId), ValidationError> {
    let PendingKind::Attack { from_id, to_id } = &action.kind;
    if !state.nation(&action.from_nation).is_some_and(|n| n.is_active()) {
        return Err(ValidationError::NationEliminated(action.from_nation.clone()));
    }

    let from = state
        .territory(from_id)
        .ok_or_else(|| ValidationError::UnknownTerritory(from_id.clone()))?;
    let to = state
        .territory(to_id)
        .ok_or_else(|| ValidationError::UnknownTerritory(to_id.clone()))?;

    if !from.is_owned_by(&action.from_nation) {
        return Err(ValidationError::NotOwned(from_id.clone()));
    }
    if from.army <= 0 {
        return Err(ValidationError::NoArmy(from_id.clone()));
    }
    if !from.is_adjacent(to_id) {
        return Err(ValidationError::NotAdjacent {
            from: from_id.clone(),
            to: to_id.clone(),
        });
    }
    if to.is_owned_by(&action.from_nation) {
        return Err(ValidationError::OwnTerritory(to_id.clone()));
    }
    Ok((from_id.clone(), to_id.clone()))
}

/// Fight one validated attack and apply its outcome to `state`.
pub fn resolve_battle(
    state: &mut Snapshot,
    config: &RulesConfig,
    rng: &mut dyn RandomSource,
    attacker: &NationId,
    from_id: &TerritoryId,
    to_id: &TerritoryId,
) -> Option<BattleReport> {
    let from = state.territory(from_id)?.clone();
    let to = state.territory(to_id)?.clone();
    let defender = to.owner.clone();

    let level = |nation: Option<&NationId>| {
        nation
            .and_then(|n| state.nation(n))
            .map_or(0, |n| n.tech_level(Technology::Engineering))
    };
    let attacker_bonus = engineering_bonus(config, level(Some(attacker)));
    let defense_bonus = defender_bonus(config, level(defender.as_ref()), to.is_capital);

    let attacker_roll = rng.uniform(1.0, 1.0 + config.combat_variance);
    let defender_roll = rng.uniform(1.0, 1.0 + config.combat_variance);
    let attacker_power = power(from.army, attacker_roll, attacker_bonus);
    let defender_power = power(to.army, defender_roll, defense_bonus);

    let (attacker_rate, defender_rate) = loss_rates(config, attacker_power, defender_power);
    let attacker_losses = casualties(from.army, attacker_rate);
    let defender_losses = casualties(to.army, defender_rate);
    let attacker_left = (from.army - attacker_losses).max(0);
    let defender_left = to.army - defender_losses;

    let mut report = BattleReport {
        attacker: attacker.clone(),
        defender: defender.clone(),
        from: from_id.clone(),
        to: to_id.clone(),
        attacker_power,
        defender_power,
        attacker_losses,
        defender_losses,
        captured: defender_left <= 0,
        eliminated: None,
    };

    let turn = state.turn;
    let defender_name = defender.as_ref().map_or("the locals", NationId::as_str).to_string();
    state.push_event(
        Event::new(
            turn,
            EventKind::Battle,
            format!(
                "{attacker} attacked {} from {}: {attacker} lost {attacker_losses}, {defender_name} lost {defender_losses}",
                to.name, from.name
            ),
        )
        .about(attacker.clone()),
    );

    if report.captured {
        let garrison = (attacker_left as f64 * config.capture_garrison_fraction).floor() as i64;
        capture_territory(state, to_id, attacker, garrison);
        if let Some(origin) = state.territories.get_mut(from_id) {
            origin.army = attacker_left - garrison;
        }
        state.push_event(
            Event::new(
                turn,
                EventKind::Conquest,
                format!("{attacker} captured {} with {garrison} troops", to.name),
            )
            .about(attacker.clone()),
        );

        if let Some(loser) = defender.filter(|_| to.is_capital) {
            for patch in cascade_eliminate(state, &loser, attacker, config) {
                if let Err(err) = patch.apply(state) {
                    warn!(%loser, error = %err, "cascade patch skipped");
                }
            }
            state.push_event(
                Event::new(
                    turn,
                    EventKind::Elimination,
                    format!("{loser} lost its capital and was absorbed by {attacker}"),
                )
                .about(loser.clone()),
            );
            info!(%loser, conqueror = %attacker, "nation eliminated");
            report.eliminated = Some(loser);
        }
    } else {
        if let Some(origin) = state.territories.get_mut(from_id) {
            origin.army = attacker_left;
        }
        if let Some(target) = state.territories.get_mut(to_id) {
            target.army = defender_left;
        }
    }

    Some(report)
}

/// Transfer a territory to `conqueror` with the given garrison.
///
/// A captured capital stops being a capital.
pub fn capture_territory(state: &mut Snapshot, territory: &TerritoryId, conqueror: &NationId, garrison: i64) {
    if let Some(t) = state.territories.get_mut(territory) {
        t.owner = Some(conqueror.clone());
        t.army = garrison.max(0);
        t.is_capital = false;
    }
}

/// Patches that absorb an eliminated nation into its conqueror.
///
/// Covers every territory the loser still owns (garrison reduced to
/// `max(1, floor(army * cascade_garrison_fraction))`), the loser's status,
/// and its player's status. Applied together, no state exists in which an
/// eliminated nation owns territory.
#[must_use]
pub fn cascade_eliminate(state: &Snapshot, loser: &NationId, conqueror: &NationId, config: &RulesConfig) -> Vec<Patch> {
    let mut patches: Vec<Patch> = state
        .territories_of(loser)
        .map(|t| {
            let garrison = ((t.army as f64 * config.cascade_garrison_fraction).floor() as i64).max(1);
            Patch::set(
                Field::Territory(t.id.clone()),
                Value::Territory(Territory {
                    owner: Some(conqueror.clone()),
                    army: garrison,
                    ..t.clone()
                }),
            )
        })
        .collect();

    if let Some(nation) = state.nation(loser) {
        let mut nation = nation.clone();
        nation.status = NationStatus::Eliminated;
        patches.push(Patch::set(Field::Nation(loser.clone()), Value::Nation(nation)));
    }
    if let Some(player) = state.player_for_nation(loser) {
        let mut player = player.clone();
        player.status = PlayerStatus::Eliminated;
        player.is_turn_ready = false;
        patches.push(Patch::set(Field::Player(player.uid.clone()), Value::Player(player)));
    }
    patches
}

/// Resolve every attack of the turn.
pub fn run(state: &mut Snapshot, config: &RulesConfig, rng: &mut dyn RandomSource) -> Vec<BattleReport> {
    let turn = state.turn;
    let mut reports = Vec::new();

    for action in order_attacks(state) {
        match revalidate(state, &action) {
            Ok((from, to)) => {
                if let Some(report) = resolve_battle(state, config, rng, &action.from_nation, &from, &to) {
                    debug!(
                        attacker = %report.attacker,
                        from = %report.from,
                        to = %report.to,
                        captured = report.captured,
                        "battle resolved"
                    );
                    reports.push(report);
                }
            }
            Err(reason) => {
                debug!(nation = %action.from_nation, %reason, "attack dropped");
                state.push_event(
                    Event::new(turn, EventKind::BattleError, format!("An attack by {} was called off: {reason}", action.from_nation))
                        .about(action.from_nation.clone()),
                );
            }
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GameStatus, Nation, Player, PlayerId, ScriptedRandom};

    /// Avalon: a1 (capital, 10), a2 (3). Brigant: b1 (capital, 1), b2 (5), b3 (8).
    /// Links: a1-b2, a2-b1, b1-b2, b2-b3.
    fn world() -> Snapshot {
        let mut s = Snapshot::new(9);
        s.status = GameStatus::Playing;
        for (nation, player) in [("Avalon", "p1"), ("Brigant", "p2")] {
            let mut n = Nation::new(nation, 500, 50);
            n.owner = Some(PlayerId::new(player));
            s.nations.insert(n.name.clone(), n);
            s.players.push_back(Player::new(player, Some(NationId::new(nation)), 0));
        }

        let layout = [
            ("a1", "Avalon", 10, true),
            ("a2", "Avalon", 3, false),
            ("b1", "Brigant", 1, true),
            ("b2", "Brigant", 5, false),
            ("b3", "Brigant", 8, false),
        ];
        for (id, owner, army, capital) in layout {
            let mut t = Territory::new(id, id.to_uppercase());
            t.owner = Some(NationId::new(owner));
            t.army = army;
            t.is_capital = capital;
            s.territories.insert(t.id.clone(), t);
        }
        for (a, b) in [("a1", "b2"), ("a2", "b1"), ("b1", "b2"), ("b2", "b3")] {
            s.territories.get_mut(&TerritoryId::new(a)).unwrap().neighbors.push(TerritoryId::new(b));
            s.territories.get_mut(&TerritoryId::new(b)).unwrap().neighbors.push(TerritoryId::new(a));
        }
        s
    }

    fn queue(s: &mut Snapshot, nation: &str, from: &str, to: &str) {
        let turn = s.turn;
        s.pending_actions.push_back(PendingAction::attack(
            NationId::new(nation),
            TerritoryId::new(from),
            TerritoryId::new(to),
            turn,
        ));
    }

    #[test]
    fn test_capital_targets_first() {
        let mut s = world();
        queue(&mut s, "Avalon", "a1", "b2");
        queue(&mut s, "Avalon", "a2", "b1");

        let order: Vec<_> = order_attacks(&s)
            .iter()
            .map(|a| a.attack_route().unwrap().0.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["a2", "a1"]);
    }

    #[test]
    fn test_ties_break_by_origin_id() {
        let mut s = world();
        queue(&mut s, "Brigant", "b3", "a1");
        queue(&mut s, "Avalon", "a1", "b3");
        queue(&mut s, "Brigant", "b2", "a1");

        let order: Vec<_> = order_attacks(&s)
            .iter()
            .map(|a| a.attack_route().unwrap().0.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["b2", "b3", "a1"]);
    }

    #[test]
    fn test_stale_turn_actions_ignored() {
        let mut s = world();
        s.pending_actions.push_back(PendingAction::attack(
            NationId::new("Avalon"),
            TerritoryId::new("a1"),
            TerritoryId::new("b2"),
            0,
        ));
        assert!(order_attacks(&s).is_empty());
    }

    #[test]
    fn test_loss_rates_clamped() {
        let config = RulesConfig::default();
        let (atk, def) = loss_rates(&config, 1000.0, 1.0);
        assert!((atk - 0.10).abs() < 1e-12);
        assert!((def - 0.70).abs() < 1e-12);

        let (atk, def) = loss_rates(&config, 1.0, 1000.0);
        assert!((atk - 0.70).abs() < 1e-12);
        assert!((def - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_bonuses() {
        let config = RulesConfig::default();
        assert!((engineering_bonus(&config, 2) - 0.30).abs() < 1e-12);
        assert!((defender_bonus(&config, 0, false) - 0.10).abs() < 1e-12);
        assert!((defender_bonus(&config, 1, true) - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_battle_without_capture() {
        let mut s = world();
        let config = RulesConfig::default();
        // Both rolls at 1.0: attacker 10, defender 5 * 1.1 = 5.5.
        let report = resolve_battle(
            &mut s,
            &config,
            &mut ScriptedRandom::constant(0.0),
            &NationId::new("Avalon"),
            &TerritoryId::new("a1"),
            &TerritoryId::new("b2"),
        )
        .unwrap();

        // attacker rate 5.5/15.5*1.1 = 0.390 -> 4 lost; defender rate 10/15.5 = 0.645 -> 3 lost
        assert_eq!(report.attacker_losses, 4);
        assert_eq!(report.defender_losses, 3);
        assert!(!report.captured);
        assert_eq!(s.territory(&TerritoryId::new("a1")).unwrap().army, 6);
        assert_eq!(s.territory(&TerritoryId::new("b2")).unwrap().army, 2);
        assert!(s.territory(&TerritoryId::new("b2")).unwrap().is_owned_by(&NationId::new("Brigant")));
    }

    #[test]
    fn test_capital_capture_cascades() {
        let mut s = world();
        let config = RulesConfig::default();
        queue(&mut s, "Avalon", "a2", "b1");

        let reports = run(&mut s, &config, &mut ScriptedRandom::constant(0.0));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].eliminated, Some(NationId::new("Brigant")));

        let brigant = NationId::new("Brigant");
        assert!(!s.nation(&brigant).unwrap().is_active());
        assert!(!s.player(&PlayerId::new("p2")).unwrap().is_playing());
        assert_eq!(s.territory_count(&brigant), 0);

        // b2: floor(5 * 0.3) = 1; b3: floor(8 * 0.3) = 2
        assert_eq!(s.territory(&TerritoryId::new("b2")).unwrap().army, 1);
        assert_eq!(s.territory(&TerritoryId::new("b3")).unwrap().army, 2);
        assert_eq!(s.territory_count(&NationId::new("Avalon")), 5);

        let b1 = s.territory(&TerritoryId::new("b1")).unwrap();
        assert!(!b1.is_capital);
        assert!(s.events.iter().any(|e| e.kind == EventKind::Elimination));
    }

    #[test]
    fn test_cascade_patches_are_complete() {
        let s = world();
        let patches = cascade_eliminate(&s, &NationId::new("Brigant"), &NationId::new("Avalon"), &RulesConfig::default());
        let next = crate::store::apply_commit(&s, &[], &patches).unwrap();

        for nation in next.nations.values().filter(|n| !n.is_active()) {
            assert_eq!(next.territory_count(&nation.name), 0);
        }
        assert!(!next.player(&PlayerId::new("p2")).unwrap().is_playing());
    }

    #[test]
    fn test_invalidated_attack_reports_error() {
        let mut s = world();
        let config = RulesConfig::default();
        // Avalon takes Brigant's capital first; Brigant's b2 attack then has no owner.
        queue(&mut s, "Avalon", "a2", "b1");
        queue(&mut s, "Brigant", "b2", "a1");

        let reports = run(&mut s, &config, &mut ScriptedRandom::constant(0.0));
        assert_eq!(reports.len(), 1);
        assert!(s.events.iter().any(|e| e.kind == EventKind::BattleError));
        assert_eq!(s.territory(&TerritoryId::new("a1")).unwrap().army, 10);
    }
}
