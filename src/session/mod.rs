//! The surface exposed to player clients.
//!
//! A [`GameSession`] binds a store, a game id, the rules and the external
//! collaborators. Each client holds its own session against the shared
//! store; the store's guarded commits keep them consistent.
//!
//! ## Lifecycle
//!
//! ```text
//! create -> join_game* -> start_game -> (submit_command* / end_turn*
//!        -> run_pipeline_if_ready)* -> finished
//! ```
//!
//! ## Example
//!
//! ```
//! use nation_turns::commands::Command;
//! use nation_turns::core::{GameId, PlayerId, RulesConfig};
//! use nation_turns::session::{GameBuilder, GameSession, PipelineRun};
//! use nation_turns::store::MemoryStore;
//!
//! let snapshot = GameBuilder::new()
//!     .nation("Avalon", 300, 60)
//!     .nation("Brigant", 300, 60)
//!     .territory("a1", "Camelot", Some("Avalon"), 10, true)
//!     .territory("b1", "Dunharrow", Some("Brigant"), 10, true)
//!     .border("a1", "b1")
//!     .build(7)
//!     .unwrap();
//!
//! let config = RulesConfig::default().with_dynamic_event_probability(0.0);
//! let session = GameSession::create(MemoryStore::new(), GameId::new("g1"), config, snapshot).unwrap();
//! let (p1, p2) = (PlayerId::new("p1"), PlayerId::new("p2"));
//!
//! session.join_game(&p1, &"Avalon".into(), 0).unwrap();
//! session.join_game(&p2, &"Brigant".into(), 0).unwrap();
//! session.start_game(&p1, 0).unwrap();
//!
//! assert!(session.submit_command(&p1, Command::BuildMilitary { amount: 5 }, 1).success);
//! session.end_turn(&p1, 2).unwrap();
//! session.end_turn(&p2, 2).unwrap();
//!
//! let observed = session.snapshot().unwrap();
//! assert_eq!(session.run_pipeline_if_ready(&p1, &observed, 3).unwrap(), PipelineRun::Advanced { turn: 2 });
//! assert_eq!(session.run_pipeline_if_ready(&p1, &observed, 4).unwrap(), PipelineRun::StoodDown);
//! ```

pub mod host;
pub mod setup;

pub use host::{is_live, next_host, plan_claim, plan_heartbeat};
pub use setup::{plan_join, plan_start, GameBuilder};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::commands::{actor, AdvisorInterpreter, Command, CommandExecutor, CommandOutcome, NoInterpreter};
use crate::core::{Event, GameId, GameRng, GameStatus, NationId, PlayerId, RulesConfig, Snapshot};
use crate::error::{GameError, StoreError, ValidationError};
use crate::pipeline::{diff, resolve_turn, EventNarrator, NoNarrator, TurnEnd};
use crate::store::{Field, GameStore, Guard, Listener, Patch, Subscription, Value};

/// What `run_pipeline_if_ready` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineRun {
    /// Somebody has not ended their turn yet, or the game is not running.
    NotReady,
    /// The turn was resolved and the next one opened.
    Advanced { turn: u32 },
    /// The turn was resolved and the game ended.
    Finished { winner: Option<NationId> },
    /// Another host already resolved this turn; nothing was done.
    StoodDown,
}

/// One client's handle on a shared game.
pub struct GameSession<S: GameStore> {
    store: S,
    game: GameId,
    config: RulesConfig,
    interpreter: Arc<dyn AdvisorInterpreter>,
    narrator: Arc<dyn EventNarrator>,
}

impl<S: GameStore> GameSession<S> {
    /// Attach to an existing game.
    pub fn new(store: S, game: GameId, config: RulesConfig) -> Self {
        Self {
            store,
            game,
            config,
            interpreter: Arc::new(NoInterpreter),
            narrator: Arc::new(NoNarrator),
        }
    }

    /// Create the game document, then attach to it.
    pub fn create(store: S, game: GameId, config: RulesConfig, snapshot: Snapshot) -> Result<Self, GameError> {
        store.create(&game, snapshot)?;
        info!(%game, "game created");
        Ok(Self::new(store, game, config))
    }

    /// Use an advisor interpreter (builder pattern).
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: Arc<dyn AdvisorInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Use an event narrator (builder pattern).
    #[must_use]
    pub fn with_narrator(mut self, narrator: Arc<dyn EventNarrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn game(&self) -> &GameId {
        &self.game
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Latest committed snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, GameError> {
        Ok(self.store.read(&self.game)?)
    }

    /// Events visible to a player, oldest first.
    pub fn events_for(&self, uid: &PlayerId) -> Result<Vec<Event>, GameError> {
        Ok(self.snapshot()?.events_for(uid).cloned().collect())
    }

    /// Receive every committed change.
    pub fn subscribe(&self, on_change: Listener) -> Result<Subscription, GameError> {
        Ok(self.store.subscribe(&self.game, on_change)?)
    }

    // === Lobby ===

    /// Claim a nation.
    pub fn join_game(&self, uid: &PlayerId, nation: &NationId, now: u64) -> Result<(), GameError> {
        self.commit_planned(|snapshot| {
            let patches = setup::plan_join(snapshot, &self.config, uid, nation, now)?;
            Ok((vec![Guard::RevisionIs(snapshot.revision)], patches))
        })?;
        info!(game = %self.game, %uid, %nation, "player joined");
        Ok(())
    }

    /// Leave the lobby (host only).
    pub fn start_game(&self, uid: &PlayerId, now: u64) -> Result<(), GameError> {
        self.commit_planned(|snapshot| {
            let patches = setup::plan_start(snapshot, &self.config, uid, now)?;
            Ok((vec![Guard::RevisionIs(snapshot.revision)], patches))
        })?;
        info!(game = %self.game, host = %uid, "game started");
        Ok(())
    }

    // === Turns ===

    /// Validate and apply (or queue) a command.
    pub fn submit_command(&self, uid: &PlayerId, command: Command, now: u64) -> CommandOutcome {
        CommandExecutor::new(&self.store, &self.game, &self.config, self.interpreter.as_ref()).submit(uid, command, now)
    }

    /// Signal that a player is done for this turn.
    pub fn end_turn(&self, uid: &PlayerId, now: u64) -> Result<(), GameError> {
        self.commit_planned(|snapshot| {
            let (player, _) = actor(snapshot, uid)?;
            if player.is_turn_ready {
                return Err(ValidationError::AlreadyReady);
            }
            Ok((
                vec![
                    Guard::StatusIs(GameStatus::Playing),
                    Guard::TurnIs(snapshot.turn),
                    Guard::PlayerReadyIs(uid.clone(), false),
                ],
                vec![
                    Patch::set(Field::PlayerReady(uid.clone()), Value::Bool(true)),
                    Patch::set(Field::PlayerLastActive(uid.clone()), Value::Int(i64::try_from(now).unwrap_or(i64::MAX))),
                ],
            ))
        })?;
        debug!(game = %self.game, %uid, "turn ended");
        Ok(())
    }

    /// Resolve the turn if `host` holds the lease and everyone is ready.
    ///
    /// `observed` is the snapshot that prompted the call. If the store has
    /// moved past its turn, another host got there first and this is a
    /// no-op.
    #[tracing::instrument(skip(self, observed), fields(game = %self.game, turn = observed.turn))]
    pub fn run_pipeline_if_ready(&self, host: &PlayerId, observed: &Snapshot, now: u64) -> Result<PipelineRun, GameError> {
        let mut attempts = 0;
        loop {
            let latest = self.store.read(&self.game)?;
            if latest.turn != observed.turn {
                debug!(found = latest.turn, "turn already resolved; standing down");
                return Ok(PipelineRun::StoodDown);
            }
            if latest.status != GameStatus::Playing || !latest.all_ready() {
                return Ok(PipelineRun::NotReady);
            }
            if latest.host.as_ref().map(|lease| &lease.holder) != Some(host) {
                return Err(ValidationError::NotHost.into());
            }

            match self.commit_turn(host, &latest, now) {
                Ok(run) => return Ok(run),
                Err(GameError::PipelineRace { expected, found }) => {
                    debug!(expected, found, "lost the pipeline race; standing down");
                    return Ok(PipelineRun::StoodDown);
                }
                Err(GameError::ResourceConflict(reason)) if attempts < self.config.conflict_retries => {
                    attempts += 1;
                    warn!(%reason, attempts, "pipeline commit conflicted; re-running");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn commit_turn(&self, host: &PlayerId, snapshot: &Snapshot, now: u64) -> Result<PipelineRun, GameError> {
        let mut rng = GameRng::for_turn(snapshot.seed, snapshot.turn);
        let outcome = resolve_turn(snapshot, &self.config, &mut rng, self.narrator.as_ref());

        let mut patches = diff(snapshot, &outcome.snapshot);
        patches.push(Patch::set(
            Field::PlayerLastActive(host.clone()),
            Value::Int(i64::try_from(now).unwrap_or(i64::MAX)),
        ));
        let guards = [
            Guard::TurnIs(snapshot.turn),
            Guard::StatusIs(GameStatus::Playing),
            Guard::RevisionIs(snapshot.revision),
            Guard::HostIs(Some(host.clone())),
        ];

        match self.store.batch_commit(&self.game, &guards, &patches) {
            Ok(revision) => {
                info!(
                    turn = snapshot.turn,
                    revision,
                    battles = outcome.battles.len(),
                    patches = patches.len(),
                    "turn committed"
                );
                Ok(match outcome.end {
                    TurnEnd::Advanced(turn) => PipelineRun::Advanced { turn },
                    TurnEnd::Finished(winner) => PipelineRun::Finished { winner },
                })
            }
            Err(StoreError::GuardFailed(reason)) => {
                let current = self.store.read(&self.game)?;
                if current.turn != snapshot.turn || current.status != GameStatus::Playing {
                    Err(GameError::PipelineRace {
                        expected: snapshot.turn,
                        found: current.turn,
                    })
                } else {
                    Err(GameError::ResourceConflict(reason))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    // === Host ===

    /// Record liveness; the host also renews its lease.
    pub fn heartbeat(&self, uid: &PlayerId, now: u64) -> Result<(), GameError> {
        let snapshot = self.store.read(&self.game)?;
        let (guards, patches) = host::plan_heartbeat(&snapshot, &self.config, uid, now);
        match self.store.batch_commit(&self.game, &guards, &patches) {
            Ok(_) => Ok(()),
            Err(StoreError::GuardFailed(_)) => {
                // Lost the lease in the meantime; still record liveness.
                self.store.patch(&self.game, &patches[..1])?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Take over an expired host lease.
    ///
    /// A claim that loses a race with another write is re-planned from a
    /// fresh read. Of several concurrent claimants only one succeeds; the
    /// others see `HostStillActive` (or `ResourceConflict` once retries
    /// run out).
    pub fn claim_host(&self, uid: &PlayerId, now: u64) -> Result<(), GameError> {
        self.commit_planned(|snapshot| host::plan_claim(snapshot, &self.config, uid, now))?;
        info!(game = %self.game, %uid, "host promoted");
        Ok(())
    }

    /// Read, plan and commit, re-planning when a guard loses a race.
    fn commit_planned<F>(&self, mut plan: F) -> Result<u64, GameError>
    where
        F: FnMut(&Snapshot) -> Result<(Vec<Guard>, Vec<Patch>), ValidationError>,
    {
        let mut attempts = 0;
        loop {
            let snapshot = self.store.read(&self.game)?;
            let (guards, patches) = plan(&snapshot)?;
            match self.store.batch_commit(&self.game, &guards, &patches) {
                Ok(revision) => return Ok(revision),
                Err(StoreError::GuardFailed(reason)) if attempts < self.config.conflict_retries => {
                    attempts += 1;
                    debug!(%reason, attempts, "commit lost a race; re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<S: GameStore> std::fmt::Debug for GameSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession").field("game", &self.game).finish_non_exhaustive()
    }
}
