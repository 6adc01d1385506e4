//! Turn resolution pipeline.
//!
//! Runs once per turn, after every playing player has signalled ready.
//! The pipeline never touches the live document: it clones the snapshot,
//! runs six phases on the clone in order, and hands back the result for
//! one atomic commit.
//!
//! | Phase | Module          | What happens                               |
//! |-------|-----------------|--------------------------------------------|
//! | A     | [`betrayal`]    | disloyal advisors embezzle                 |
//! | B     | [`external`]    | dynamic world event from the narrator      |
//! | C     | [`combat`]      | queued attacks are fought                  |
//! | D     | [`production`]  | treasuries grow, poor nations are subsidized |
//! | E     | [`homeostasis`] | loyalty recovers, stability reacts         |
//! | F     | [`victory`]     | game ends, or the next turn opens          |
//!
//! Given the same snapshot and the same random draws, the pipeline
//! produces the same result, so a failed commit can simply be retried.
//!
//! ## Example
//!
//! ```
//! use nation_turns::core::{GameStatus, RulesConfig, ScriptedRandom, Snapshot};
//! use nation_turns::pipeline::{resolve_turn, NoNarrator, TurnEnd};
//!
//! let mut snapshot = Snapshot::new(1);
//! snapshot.status = GameStatus::Playing;
//!
//! let outcome = resolve_turn(&snapshot, &RulesConfig::default(), &mut ScriptedRandom::constant(0.9), &NoNarrator);
//! assert_eq!(outcome.end, TurnEnd::Finished(None));
//! assert_eq!(snapshot.status, GameStatus::Playing);
//! ```

pub mod betrayal;
pub mod combat;
pub mod diff;
pub mod external;
pub mod homeostasis;
pub mod production;
pub mod victory;

pub use combat::{cascade_eliminate, BattleReport};
pub use diff::diff;
pub use external::{EffectKind, EventNarrator, NarrativeEffect, NarrativeEvent, NarrativeRequest, NoNarrator};
pub use victory::TurnEnd;

use tracing::debug;

use crate::core::{NationId, RandomSource, RulesConfig, Snapshot};

/// Result of resolving one turn.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    /// The resolved state, ready to diff against the input.
    pub snapshot: Snapshot,
    /// Betrayals in phase A.
    pub betrayals: usize,
    /// Whether phase B applied a dynamic event.
    pub dynamic_event: bool,
    /// Battles fought in phase C.
    pub battles: Vec<BattleReport>,
    /// Nations that collapsed in phase E.
    pub collapsed: Vec<NationId>,
    /// How the turn ended.
    pub end: TurnEnd,
}

/// Resolve one turn on a copy of `snapshot`.
pub fn resolve_turn(
    snapshot: &Snapshot,
    config: &RulesConfig,
    rng: &mut dyn RandomSource,
    narrator: &dyn EventNarrator,
) -> TurnOutcome {
    let mut state = snapshot.clone();

    let betrayals = betrayal::run(&mut state, config, rng);
    let dynamic_event = external::run(&mut state, config, rng, narrator);
    let battles = combat::run(&mut state, config, rng);
    production::run(&mut state, config);
    let collapsed = homeostasis::run(&mut state, config);
    let end = victory::run(&mut state);

    debug!(
        turn = snapshot.turn,
        betrayals,
        dynamic_event,
        battles = battles.len(),
        collapsed = collapsed.len(),
        events = state.events.len() - snapshot.events.len(),
        "turn resolved"
    );

    TurnOutcome {
        snapshot: state,
        betrayals,
        dynamic_event,
        battles,
        collapsed,
        end,
    }
}
