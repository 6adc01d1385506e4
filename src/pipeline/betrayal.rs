//! Phase A: advisor betrayal.
//!
//! A disloyal advisor may embezzle part of the treasury. The victim learns
//! who did it; everyone else only sees an unexplained loss.

use tracing::debug;

use crate::core::{Event, EventKind, Portfolio, RandomSource, RulesConfig, Snapshot};

/// Roll betrayal for every advisor of every active player.
///
/// Returns the number of betrayals.
pub fn run(state: &mut Snapshot, config: &RulesConfig, rng: &mut dyn RandomSource) -> usize {
    let turn = state.turn;

    // Players in join order, advisors in portfolio order: the draw sequence is fixed.
    let suspects: Vec<_> = state
        .playing_players()
        .filter_map(|player| Some((player.uid.clone(), player.nation.clone()?)))
        .flat_map(|(uid, nation)| {
            Portfolio::ALL
                .into_iter()
                .map(move |portfolio| (uid.clone(), nation.clone(), portfolio))
        })
        .filter(|(uid, _, portfolio)| {
            state
                .advisors
                .get(&(uid.clone(), *portfolio))
                .is_some_and(|a| a.loyalty < config.betrayal_loyalty_threshold)
        })
        .collect();

    let mut betrayals = 0;
    for (uid, nation_id, portfolio) in suspects {
        if !rng.chance(config.betrayal_probability) {
            continue;
        }
        let Some(nation) = state.nations.get_mut(&nation_id) else {
            continue;
        };
        if !nation.is_active() {
            continue;
        }

        let loss = (nation.resources as f64 * config.betrayal_loss_fraction).floor() as i64;
        nation.resources = (nation.resources - loss).max(0);
        betrayals += 1;
        debug!(%uid, %portfolio, loss, "advisor betrayal");

        state.push_event(
            Event::new(
                turn,
                EventKind::Betrayal,
                format!("Your {portfolio} advisor betrayed you and embezzled {loss} resources"),
            )
            .about(nation_id.clone())
            .private_to(uid),
        );
        state.push_event(
            Event::new(
                turn,
                EventKind::UnexplainedLoss,
                format!("{nation_id} lost {loss} resources under unexplained circumstances"),
            )
            .about(nation_id),
        );
    }
    betrayals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Advisor, GameStatus, Nation, NationId, Player, PlayerId, ScriptedRandom};

    fn snapshot(loyalty: i64) -> Snapshot {
        let mut s = Snapshot::new(1);
        s.status = GameStatus::Playing;
        s.nations.insert(NationId::new("Avalon"), Nation::new("Avalon", 505, 50));
        s.players.push_back(Player::new("p1", Some(NationId::new("Avalon")), 0));
        for portfolio in Portfolio::ALL {
            let loyalty = if portfolio == Portfolio::Finance { loyalty } else { 60 };
            let advisor = Advisor::new(PlayerId::new("p1"), portfolio, loyalty);
            s.advisors.insert(advisor.key(), advisor);
        }
        s
    }

    #[test]
    fn test_betrayal_events_split_by_audience() {
        let mut s = snapshot(10);
        let count = run(&mut s, &RulesConfig::default(), &mut ScriptedRandom::constant(0.0));

        assert_eq!(count, 1);
        assert_eq!(s.nation(&NationId::new("Avalon")).unwrap().resources, 455);

        let private = s.events.iter().find(|e| e.kind == EventKind::Betrayal).unwrap();
        assert!(private.visible_to(&PlayerId::new("p1")));
        assert!(!private.visible_to(&PlayerId::new("p2")));
        assert!(private.content.contains("finance"));

        let public = s.events.iter().find(|e| e.kind == EventKind::UnexplainedLoss).unwrap();
        assert!(public.visible_to(&PlayerId::new("p2")));
        assert!(!public.content.contains("finance"));
    }

    #[test]
    fn test_failed_roll_spares_treasury() {
        let mut s = snapshot(10);
        let mut rng = ScriptedRandom::constant(0.5);
        assert_eq!(run(&mut s, &RulesConfig::default(), &mut rng), 0);
        assert_eq!(rng.consumed(), 1);
        assert_eq!(s.nation(&NationId::new("Avalon")).unwrap().resources, 505);
    }

    #[test]
    fn test_loyal_advisors_never_roll() {
        let mut s = snapshot(20);
        let mut rng = ScriptedRandom::constant(0.0);
        assert_eq!(run(&mut s, &RulesConfig::default(), &mut rng), 0);
        assert_eq!(rng.consumed(), 0);
    }
}
