//! Phase F: victory check and turn advance.

use tracing::info;

use crate::core::{Event, EventKind, GameStatus, NationId, Snapshot};

/// How the turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEnd {
    /// Play continues at this turn.
    Advanced(u32),
    /// The game is over; `None` if nobody survived.
    Finished(Option<NationId>),
}

/// Finish the game if at most one nation is still played, otherwise
/// open the next turn.
///
/// Pending actions are cleared either way: each is consumed exactly once.
pub fn run(state: &mut Snapshot) -> TurnEnd {
    let turn = state.turn;
    let survivors: Vec<NationId> = state
        .playing_players()
        .filter_map(|p| p.nation.clone())
        .filter(|n| state.nation(n).is_some_and(|n| n.is_active()))
        .collect();

    state.pending_actions.clear();

    if survivors.len() <= 1 {
        let winner = survivors.into_iter().next();
        state.status = GameStatus::Finished;
        state.winner = winner.clone();
        let content = match &winner {
            Some(nation) => format!("{nation} stands alone and wins the game"),
            None => "No nation survived".to_string(),
        };
        let mut event = Event::new(turn, EventKind::Victory, content);
        if let Some(nation) = &winner {
            event = event.about(nation.clone());
        }
        state.push_event(event);
        info!(turn, winner = ?winner, "game finished");
        return TurnEnd::Finished(winner);
    }

    for player in state.players.iter_mut().filter(|p| p.is_playing()) {
        player.is_turn_ready = false;
    }
    state.turn = turn + 1;
    TurnEnd::Advanced(state.turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Nation, PendingAction, Player, PlayerId, TerritoryId};

    fn snapshot() -> Snapshot {
        let mut s = Snapshot::new(1);
        s.status = GameStatus::Playing;
        for (nation, player) in [("Avalon", "p1"), ("Brigant", "p2")] {
            s.nations.insert(NationId::new(nation), Nation::new(nation, 100, 50));
            let mut p = Player::new(player, Some(NationId::new(nation)), 0);
            p.is_turn_ready = true;
            s.players.push_back(p);
        }
        s.pending_actions.push_back(PendingAction::attack(
            NationId::new("Avalon"),
            TerritoryId::new("a1"),
            TerritoryId::new("b1"),
            1,
        ));
        s
    }

    #[test]
    fn test_turn_advances_and_resets() {
        let mut s = snapshot();
        assert_eq!(run(&mut s), TurnEnd::Advanced(2));
        assert_eq!(s.turn, 2);
        assert!(s.players.iter().all(|p| !p.is_turn_ready));
        assert!(s.pending_actions.is_empty());
        assert_eq!(s.status, GameStatus::Playing);
    }

    #[test]
    fn test_last_nation_wins() {
        let mut s = snapshot();
        s.mark_eliminated(&NationId::new("Brigant"));

        assert_eq!(run(&mut s), TurnEnd::Finished(Some(NationId::new("Avalon"))));
        assert_eq!(s.status, GameStatus::Finished);
        assert_eq!(s.winner, Some(NationId::new("Avalon")));
        assert_eq!(s.turn, 1);
        assert!(s.player(&PlayerId::new("p1")).unwrap().is_turn_ready);
        assert!(s.events.iter().any(|e| e.kind == EventKind::Victory));
    }

    #[test]
    fn test_nobody_left() {
        let mut s = snapshot();
        s.mark_eliminated(&NationId::new("Avalon"));
        s.mark_eliminated(&NationId::new("Brigant"));
        assert_eq!(run(&mut s), TurnEnd::Finished(None));
        assert_eq!(s.winner, None);
    }
}
