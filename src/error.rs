//! Error taxonomy.
//!
//! - [`ValidationError`]: a command precondition failed; nothing changed
//! - [`SetupError`]: a game map is inconsistent
//! - [`StoreError`]: the persistence adapter refused or failed a commit
//! - [`CollaboratorError`]: an external generator failed; callers degrade
//! - [`GameError`]: what the session surface reports to its caller

use thiserror::Error;

use crate::core::{GameId, NationId, PlayerId, TerritoryId};

/// A command precondition that did not hold.
///
/// Every variant names the precondition so the submitter learns exactly
/// why the command was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the game is not in progress")]
    GameNotPlaying,

    #[error("the game is not accepting new players")]
    GameNotJoinable,

    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerId),

    #[error("player {0} has already joined")]
    AlreadyJoined(PlayerId),

    #[error("player {0} has been eliminated")]
    PlayerEliminated(PlayerId),

    #[error("player {0} has no nation")]
    NoNation(PlayerId),

    #[error("nation {0} does not exist")]
    UnknownNation(NationId),

    #[error("nation {0} is already claimed")]
    NationTaken(NationId),

    #[error("nation {0} has been eliminated")]
    NationEliminated(NationId),

    #[error("you already ended your turn")]
    AlreadyReady,

    #[error("territory {0} does not exist")]
    UnknownTerritory(TerritoryId),

    #[error("you do not own territory {0}")]
    NotOwned(TerritoryId),

    #[error("you cannot attack your own territory {0}")]
    OwnTerritory(TerritoryId),

    #[error("territory {to} is not adjacent to {from}")]
    NotAdjacent { from: TerritoryId, to: TerritoryId },

    #[error("territory {0} has no army")]
    NoArmy(TerritoryId),

    #[error("at least one unit must remain in {0}")]
    MustLeaveGarrison(TerritoryId),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("quantity {0} is too large")]
    QuantityTooLarge(i64),

    #[error("insufficient resources: required {required}, available {available}")]
    InsufficientResources { required: i64, available: i64 },

    #[error("you have no capital")]
    NoCapital,

    #[error("only the host can do that")]
    NotHost,

    #[error("host {0} is still active")]
    HostStillActive(PlayerId),

    #[error("{0} is not next in line to host")]
    NotNextHost(PlayerId),

    #[error("the game needs at least one player")]
    NoPlayers,

    #[error("the advisor could not act: {0}")]
    AdvisorRefused(String),
}

/// A map or roster that cannot start a game.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("nation {0} is declared twice")]
    DuplicateNation(NationId),

    #[error("territory {0} is declared twice")]
    DuplicateTerritory(TerritoryId),

    #[error("territory {territory} is owned by undeclared nation {nation}")]
    UnknownOwner { territory: TerritoryId, nation: NationId },

    #[error("territory {territory} borders undeclared territory {neighbor}")]
    UnknownNeighbor { territory: TerritoryId, neighbor: TerritoryId },

    #[error("nation {nation} must have exactly one capital, found {found}")]
    CapitalCount { nation: NationId, found: usize },
}

/// Failure of the persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("game {0} already exists")]
    GameExists(GameId),

    #[error("commit precondition failed: {0}")]
    GuardFailed(String),

    #[error("patch cannot be applied: {0}")]
    Patch(String),

    #[error("storage backend failure: {0}")]
    Io(String),

    #[error("snapshot encoding failed: {0}")]
    Codec(#[from] bincode::Error),
}

/// Failure of an external generator (narrator or interpreter).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator returned malformed output: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors reported by the session surface.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A concurrent commit won the race; re-read and retry.
    #[error("lost a concurrent update: {0}")]
    ResourceConflict(String),

    /// The store failed; the operation is considered not applied.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Another host already advanced the turn.
    #[error("turn {expected} was already resolved (store is at turn {found})")]
    PipelineRace { expected: u32, found: u32 },
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GuardFailed(reason) => GameError::ResourceConflict(reason),
            other => GameError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_precondition() {
        let err = ValidationError::InsufficientResources {
            required: 70,
            available: 20,
        };
        assert_eq!(err.to_string(), "insufficient resources: required 70, available 20");

        let err = ValidationError::NotAdjacent {
            from: TerritoryId::new("a1"),
            to: TerritoryId::new("c9"),
        };
        assert_eq!(err.to_string(), "territory c9 is not adjacent to a1");
    }

    #[test]
    fn test_store_error_mapping() {
        let conflict: GameError = StoreError::GuardFailed("turn moved".into()).into();
        assert!(matches!(conflict, GameError::ResourceConflict(_)));

        let io: GameError = StoreError::Io("disk".into()).into();
        assert!(matches!(io, GameError::Persistence(_)));
    }
}
