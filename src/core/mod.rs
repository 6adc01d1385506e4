//! Core types: identifiers, entities, events, pending actions, the
//! snapshot, rules configuration and injectable randomness.
//!
//! Nothing in this module knows about rules; commands and pipeline
//! phases build on these types.

pub mod ids;
pub mod entity;
pub mod event;
pub mod action;
pub mod state;
pub mod config;
pub mod rng;

pub use ids::{GameId, NationId, PlayerId, TerritoryId};
pub use entity::{
    clamp_score, Advisor, AdvisorKey, Nation, NationStatus, Player, PlayerStatus, Portfolio,
    Technology, Territory,
};
pub use event::{Event, EventKind, Visibility};
pub use action::{PendingAction, PendingKind};
pub use state::{GameStatus, HostLease, Snapshot};
pub use config::{CommandKind, LoyaltyDeltas, RulesConfig};
pub use rng::{GameRng, RandomSource, ScriptedRandom};
