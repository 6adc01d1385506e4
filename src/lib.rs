//! # nation-turns
//!
//! Command admission and turn resolution for multi-player nation
//! strategy games played against one shared game document.
//!
//! ## Design Principles
//!
//! 1. **Snapshot In, Snapshot Out**: The turn pipeline is a pure pass over
//!    an owned `Snapshot` copy. Nothing is published until one atomic commit.
//!
//! 2. **Field-Scoped Writes**: Commands commit increments and appends on
//!    individual fields behind guards, so concurrent players never clobber
//!    each other.
//!
//! 3. **Configuration Over Constants**: Every balance number lives in
//!    `RulesConfig`.
//!
//! ## Architecture
//!
//! - **Deferred Attacks**: Attacks are queued at submit time and fought in
//!   a fixed order during the pipeline, so submission timing never matters.
//!
//! - **Persistent Data Structures**: O(1) snapshot cloning via `im-rs`.
//!
//! - **Injectable Randomness**: Every draw goes through `RandomSource`; the
//!   live game derives its stream from the game seed and the turn.
//!
//! ## Modules
//!
//! - `core`: IDs, entities, events, snapshot, configuration, RNG
//! - `store`: Persistence contract, patches, guards, in-memory store
//! - `commands`: Command validation and execution
//! - `pipeline`: The six turn phases and their commit diff
//! - `session`: Client surface: setup, turns, host lease

pub mod core;
pub mod error;
pub mod store;
pub mod commands;
pub mod pipeline;
pub mod session;

// Re-export commonly used types
pub use crate::core::{
    GameId, NationId, PlayerId, TerritoryId,
    Nation, Territory, Player, Advisor, Portfolio, Technology,
    Event, EventKind, PendingAction,
    GameStatus, HostLease, Snapshot,
    RulesConfig, GameRng, RandomSource, ScriptedRandom,
};

pub use crate::error::{CollaboratorError, GameError, SetupError, StoreError, ValidationError};

pub use crate::store::{Field, GameStore, Guard, MemoryStore, Patch, Subscription};

pub use crate::commands::{AdvisorInterpreter, Command, CommandOutcome, Interpretation, InterpreterRequest};

pub use crate::pipeline::{resolve_turn, EventNarrator, NarrativeEvent, NarrativeRequest, TurnEnd, TurnOutcome};

pub use crate::session::{GameBuilder, GameSession, PipelineRun};
