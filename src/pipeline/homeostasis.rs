//! Phase E: loyalty and stability homeostasis.
//!
//! Loyalty drifts back toward the recovery target and never stays below
//! the floor. Stability then reacts to disloyal advisors and poverty. A
//! nation whose stability reaches zero collapses: it is eliminated and its
//! territories are released, not handed to anyone.

use tracing::info;

use crate::core::{clamp_score, Event, EventKind, NationId, PlayerId, RulesConfig, Snapshot};

/// New loyalty of one advisor.
///
/// Below the floor an advisor is topped up; below the recovery target it
/// recovers, one point faster in a highly stable nation. Loyal advisors are
/// left alone. Returns `(loyalty, topped_up)`.
#[must_use]
pub fn recover_loyalty(config: &RulesConfig, loyalty: i64, nation_stability: i64) -> (i64, bool) {
    if loyalty < config.loyalty_floor {
        return (config.loyalty_floor, true);
    }
    if loyalty >= config.loyalty_recovery_target {
        return (loyalty, false);
    }
    let mut next = loyalty + 2 + (config.loyalty_recovery_target - loyalty) / 10;
    if nation_stability > config.high_stability_threshold {
        next += 1;
    }
    (clamp_score(next), false)
}

/// Stability change for a nation.
#[must_use]
pub fn stability_delta(config: &RulesConfig, low_loyalty_count: i64, resources: i64, stability: i64) -> i64 {
    let mut delta = -(low_loyalty_count.min(2) + (low_loyalty_count - 2).max(0));
    if resources < config.recovery_threshold {
        delta -= config.poverty_stability_penalty;
    }
    if stability < config.stability_rebound_threshold {
        delta += 1;
    }
    delta
}

/// Apply loyalty recovery, then stability, to every active nation.
///
/// Returns the nations that collapsed.
pub fn run(state: &mut Snapshot, config: &RulesConfig) -> Vec<NationId> {
    let turn = state.turn;
    let ruled: Vec<(PlayerId, NationId)> = state
        .playing_players()
        .filter_map(|p| Some((p.uid.clone(), p.nation.clone()?)))
        .filter(|(_, nation)| state.nation(nation).is_some_and(|n| n.is_active()))
        .collect();

    for (uid, nation) in &ruled {
        let stability = state.nation(nation).map_or(0, |n| n.stability);
        let keys: Vec<_> = state.advisors_of(uid).map(|a| a.key()).collect();
        for key in keys {
            let Some(advisor) = state.advisors.get_mut(&key) else {
                continue;
            };
            let (loyalty, topped_up) = recover_loyalty(config, advisor.loyalty, stability);
            advisor.loyalty = loyalty;
            if topped_up {
                state.push_event(
                    Event::new(
                        turn,
                        EventKind::LoyaltyFloor,
                        format!("Your {} advisor was placated and is back to loyalty {loyalty}", key.1),
                    )
                    .about(nation.clone())
                    .private_to(uid.clone()),
                );
            }
        }
    }

    let mut collapsed = Vec::new();
    for (uid, nation_id) in ruled {
        let low = state
            .advisors_of(&uid)
            .filter(|a| a.loyalty < config.low_loyalty_threshold)
            .count();
        let Some(nation) = state.nations.get_mut(&nation_id) else {
            continue;
        };
        let delta = stability_delta(config, i64::try_from(low).unwrap_or(i64::MAX), nation.resources, nation.stability);
        nation.stability = clamp_score(nation.stability + delta);
        let stability = nation.stability;

        if stability == 0 {
            state.mark_eliminated(&nation_id);
            let released: Vec<_> = state.territories_of(&nation_id).map(|t| t.id.clone()).collect();
            for id in released {
                if let Some(territory) = state.territories.get_mut(&id) {
                    territory.owner = None;
                }
            }
            state.push_event(
                Event::new(
                    turn,
                    EventKind::Collapse,
                    format!("{nation_id} collapsed into anarchy; its lands are ungoverned"),
                )
                .about(nation_id.clone()),
            );
            info!(nation = %nation_id, "nation collapsed");
            collapsed.push(nation_id);
        } else if stability <= config.stability_warning_threshold {
            state.push_event(
                Event::new(
                    turn,
                    EventKind::StabilityWarning,
                    format!("Unrest is spreading: stability has fallen to {stability}"),
                )
                .about(nation_id)
                .private_to(uid),
            );
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Advisor, GameStatus, Nation, Player, Portfolio, Territory, TerritoryId};

    fn snapshot(loyalties: [i64; 4], resources: i64, stability: i64) -> Snapshot {
        let mut s = Snapshot::new(1);
        s.status = GameStatus::Playing;
        s.nations.insert(NationId::new("Avalon"), Nation::new("Avalon", resources, stability));
        s.players.push_back(Player::new("p1", Some(NationId::new("Avalon")), 0));
        for (portfolio, loyalty) in Portfolio::ALL.into_iter().zip(loyalties) {
            let advisor = Advisor::new(PlayerId::new("p1"), portfolio, loyalty);
            s.advisors.insert(advisor.key(), advisor);
        }
        let mut capital = Territory::new("a1", "Camelot");
        capital.owner = Some(NationId::new("Avalon"));
        capital.is_capital = true;
        s.territories.insert(capital.id.clone(), capital);
        s
    }

    #[test]
    fn test_loyalty_recovery_rules() {
        let config = RulesConfig::default();
        assert_eq!(recover_loyalty(&config, 0, 50), (15, true));
        assert_eq!(recover_loyalty(&config, 15, 50), (20, false));
        assert_eq!(recover_loyalty(&config, 45, 50), (47, false));
        assert_eq!(recover_loyalty(&config, 60, 50), (60, false));
        assert_eq!(recover_loyalty(&config, 0, 90), (15, true));
        assert_eq!(recover_loyalty(&config, 45, 90), (48, false));
        assert_eq!(recover_loyalty(&config, 49, 81), (52, false));
        assert_eq!(recover_loyalty(&config, 60, 90), (60, false));
        assert_eq!(recover_loyalty(&config, 100, 90), (100, false));
    }

    #[test]
    fn test_stability_delta() {
        let config = RulesConfig::default();
        assert_eq!(stability_delta(&config, 0, 500, 50), 0);
        assert_eq!(stability_delta(&config, 3, 500, 50), -3);
        assert_eq!(stability_delta(&config, 1, 50, 50), -4);
        assert_eq!(stability_delta(&config, 0, 500, 10), 1);
    }

    #[test]
    fn test_floor_tops_up_privately() {
        let mut s = snapshot([0, 60, 60, 60], 500, 50);
        run(&mut s, &RulesConfig::default());

        assert!(s.advisors_of(&PlayerId::new("p1")).all(|a| a.loyalty >= 15));
        let event = s.events.iter().find(|e| e.kind == EventKind::LoyaltyFloor).unwrap();
        assert!(!event.visible_to(&PlayerId::new("p2")));
    }

    #[test]
    fn test_warning_below_threshold() {
        let mut s = snapshot([60, 60, 60, 60], 50, 12);
        run(&mut s, &RulesConfig::default());

        // -3 poverty, +1 rebound
        assert_eq!(s.nation(&NationId::new("Avalon")).unwrap().stability, 10);
        assert!(s.events.iter().any(|e| e.kind == EventKind::StabilityWarning && e.is_private()));
    }

    #[test]
    fn test_collapse_releases_territories() {
        let mut s = snapshot([0, 0, 0, 0], 0, 2);
        let collapsed = run(&mut s, &RulesConfig::default());

        assert_eq!(collapsed, vec![NationId::new("Avalon")]);
        assert!(!s.nation(&NationId::new("Avalon")).unwrap().is_active());
        assert!(!s.player(&PlayerId::new("p1")).unwrap().is_playing());
        assert_eq!(s.territory(&TerritoryId::new("a1")).unwrap().owner, None);
        assert!(s.events.iter().any(|e| e.kind == EventKind::Collapse));
    }
}
