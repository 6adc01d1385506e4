//! The append-only game log.
//!
//! Every mutating command and every pipeline phase reports what happened
//! as an [`Event`]. Events are the only channel through which pipeline
//! outcomes reach players, so visibility matters: a private event is
//! shown to its recipient only.

use serde::{Deserialize, Serialize};

use super::ids::{NationId, PlayerId};

/// What kind of thing happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A player joined and claimed a nation.
    Join,
    /// The game left the lobby.
    GameStart,
    /// An attack was queued.
    AttackOrdered,
    /// Troops were raised at a capital.
    Recruitment,
    /// A technology level was researched.
    Research,
    /// Troops moved between owned territories.
    TroopMovement,
    /// A player gave an order through an advisor.
    AdvisorOrder,
    /// A disloyal advisor embezzled resources (private: cause named).
    Betrayal,
    /// A nation lost resources for reasons unknown to others.
    UnexplainedLoss,
    /// Narrative of the dynamic external event.
    DynamicEvent,
    /// A technology advanced outside of research.
    TechAdvance,
    /// A battle was fought.
    Battle,
    /// A queued attack was no longer valid when resolved.
    BattleError,
    /// A territory changed hands.
    Conquest,
    /// A nation lost its capital and was absorbed.
    Elimination,
    /// Per-turn production summary.
    Production,
    /// A struggling treasury received a subsidy.
    RecoverySubsidy,
    /// Production hit the resource cap.
    ResourceCap,
    /// An advisor's loyalty was topped up to the floor.
    LoyaltyFloor,
    /// Stability is dangerously low (private).
    StabilityWarning,
    /// A nation collapsed from zero stability.
    Collapse,
    /// The game ended with a winner.
    Victory,
    /// A new host took over the game.
    HostChange,
}

/// Who may see an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Every player.
    #[default]
    Public,
    /// Only the named player.
    Private(PlayerId),
}

/// One entry of the game log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Turn during which the event happened.
    pub turn: u32,
    /// Event type.
    pub kind: EventKind,
    /// Nation the event is about, if any.
    pub nation: Option<NationId>,
    /// Human-readable description.
    pub content: String,
    /// Audience.
    pub visibility: Visibility,
}

impl Event {
    /// Create a public event.
    pub fn new(turn: u32, kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            turn,
            kind,
            nation: None,
            content: content.into(),
            visibility: Visibility::Public,
        }
    }

    /// Attach the nation the event is about (builder pattern).
    #[must_use]
    pub fn about(mut self, nation: NationId) -> Self {
        self.nation = Some(nation);
        self
    }

    /// Restrict the event to one recipient (builder pattern).
    #[must_use]
    pub fn private_to(mut self, recipient: PlayerId) -> Self {
        self.visibility = Visibility::Private(recipient);
        self
    }

    /// Check if the event is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        matches!(self.visibility, Visibility::Private(_))
    }

    /// Check if a player may see this event.
    #[must_use]
    pub fn visible_to(&self, player: &PlayerId) -> bool {
        match &self.visibility {
            Visibility::Public => true,
            Visibility::Private(recipient) => recipient == player,
        }
    }
}
