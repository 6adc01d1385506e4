//! Deferred player intents.
//!
//! Attacks are never resolved at submit time. The validator records a
//! [`PendingAction`]; combat consumes every pending action of the turn
//! exactly once and the list is cleared when the turn advances.

use serde::{Deserialize, Serialize};

use super::ids::{NationId, TerritoryId};

/// What a pending action will do when resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingKind {
    /// Attack `to_id` with the garrison of `from_id`.
    Attack {
        /// Attacking territory.
        from_id: TerritoryId,
        /// Target territory.
        to_id: TerritoryId,
    },
}

/// A queued intent awaiting the turn pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingAction {
    /// Nation that submitted the intent.
    pub from_nation: NationId,

    /// The intent itself.
    pub kind: PendingKind,

    /// Turn the intent was submitted in.
    pub turn: u32,
}

impl PendingAction {
    /// Queue an attack.
    #[must_use]
    pub fn attack(from_nation: NationId, from_id: TerritoryId, to_id: TerritoryId, turn: u32) -> Self {
        Self {
            from_nation,
            kind: PendingKind::Attack { from_id, to_id },
            turn,
        }
    }

    /// Attacking and target territory, if this is an attack.
    #[must_use]
    pub fn attack_route(&self) -> Option<(&TerritoryId, &TerritoryId)> {
        match &self.kind {
            PendingKind::Attack { from_id, to_id } => Some((from_id, to_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_route() {
        let action = PendingAction::attack(
            NationId::new("Avalon"),
            TerritoryId::new("a1"),
            TerritoryId::new("b1"),
            4,
        );

        let (from, to) = action.attack_route().unwrap();
        assert_eq!(from.as_str(), "a1");
        assert_eq!(to.as_str(), "b1");
        assert_eq!(action.turn, 4);
    }

    #[test]
    fn test_pending_action_wire_shape() {
        let action = PendingAction::attack(
            NationId::new("Avalon"),
            TerritoryId::new("a1"),
            TerritoryId::new("b1"),
            1,
        );
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["from_nation"], "Avalon");
        assert_eq!(value["kind"]["action"], "attack");
        assert_eq!(value["kind"]["to_id"], "b1");
    }
}
