//! Field-scoped patches and commit guards.
//!
//! A [`Patch`] names one field of the document and one operation on it:
//! set, numeric increment, append, or clear. Increments on different
//! fields commute, so two players' commands never clobber each other.
//! A [`Guard`] is a precondition checked inside the commit; if any guard
//! fails, no patch of the commit is applied.
//!
//! The applier enforces the numeric invariants of each field: loyalty and
//! stability stay in `[0, 100]`, resources and armies never go negative.

use serde::{Deserialize, Serialize};

use crate::core::{
    clamp_score, Advisor, Event, GameStatus, HostLease, Nation, NationId, PendingAction, Player,
    PlayerId, Portfolio, Snapshot, Technology, Territory, TerritoryId,
};
use crate::error::StoreError;

/// Addressable field of a game document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Turn,
    Status,
    Winner,
    Host,
    /// The ordered player list (index 0 = host).
    Players,
    /// A whole nation record.
    Nation(NationId),
    NationResources(NationId),
    NationStability(NationId),
    NationTech(NationId, Technology),
    /// A whole territory record.
    Territory(TerritoryId),
    TerritoryArmy(TerritoryId),
    /// A whole player record.
    Player(PlayerId),
    PlayerReady(PlayerId),
    PlayerLastActive(PlayerId),
    /// A whole advisor record.
    Advisor(PlayerId, Portfolio),
    AdvisorLoyalty(PlayerId, Portfolio),
    Events,
    PendingActions,
}

/// A value written by `Set` or `Append`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Status(GameStatus),
    Winner(Option<NationId>),
    Host(Option<HostLease>),
    Players(Vec<Player>),
    Nation(Nation),
    Territory(Territory),
    Player(Player),
    Advisor(Advisor),
    Event(Event),
    Pending(PendingAction),
}

/// Operation on a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Overwrite the field.
    Set(Value),
    /// Add to a numeric field.
    Increment(i64),
    /// Push onto a list field.
    Append(Value),
    /// Empty a list field.
    Clear,
}

/// One field operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Target field.
    pub field: Field,
    /// Operation to apply.
    pub op: Op,
}

impl Patch {
    /// Overwrite a field.
    #[must_use]
    pub fn set(field: Field, value: Value) -> Self {
        Self { field, op: Op::Set(value) }
    }

    /// Add `delta` to a numeric field.
    #[must_use]
    pub fn increment(field: Field, delta: i64) -> Self {
        Self { field, op: Op::Increment(delta) }
    }

    /// Push onto a list field.
    #[must_use]
    pub fn append(field: Field, value: Value) -> Self {
        Self { field, op: Op::Append(value) }
    }

    /// Empty a list field.
    #[must_use]
    pub fn clear(field: Field) -> Self {
        Self { field, op: Op::Clear }
    }

    /// Append an event to the log.
    #[must_use]
    pub fn event(event: Event) -> Self {
        Self::append(Field::Events, Value::Event(event))
    }

    /// Apply this patch to a snapshot in place.
    pub fn apply(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        match (&self.field, &self.op) {
            (Field::Turn, op) => {
                let next = int_op(i64::from(snapshot.turn), op, &self.field)?;
                snapshot.turn = u32::try_from(next)
                    .map_err(|_| StoreError::Patch(format!("turn out of range: {next}")))?;
            }
            (Field::Status, Op::Set(Value::Status(status))) => {
                if !snapshot.status.can_transition_to(*status) {
                    return Err(StoreError::Patch(format!(
                        "status cannot go from {:?} to {:?}",
                        snapshot.status, status
                    )));
                }
                snapshot.status = *status;
            }
            (Field::Winner, Op::Set(Value::Winner(winner))) => snapshot.winner = winner.clone(),
            (Field::Host, Op::Set(Value::Host(lease))) => snapshot.host = lease.clone(),
            (Field::Players, Op::Set(Value::Players(players))) => {
                snapshot.players = players.iter().cloned().collect();
            }
            (Field::Players, Op::Append(Value::Player(player))) => {
                snapshot.players.push_back(player.clone());
            }

            (Field::Nation(_), Op::Set(Value::Nation(nation))) => {
                snapshot.nations.insert(nation.name.clone(), nation.clone());
            }
            (Field::NationResources(id), op) => {
                let nation = nation_mut(snapshot, id)?;
                nation.resources = int_op(nation.resources, op, &self.field)?.max(0);
            }
            (Field::NationStability(id), op) => {
                let nation = nation_mut(snapshot, id)?;
                nation.stability = clamp_score(int_op(nation.stability, op, &self.field)?);
            }
            (Field::NationTech(id, tech), op) => {
                let nation = nation_mut(snapshot, id)?;
                let level = int_op(i64::from(nation.tech_level(*tech)), op, &self.field)?;
                nation
                    .technologies
                    .insert(*tech, u32::try_from(level.max(0)).unwrap_or(u32::MAX));
            }

            (Field::Territory(_), Op::Set(Value::Territory(territory))) => {
                snapshot.territories.insert(territory.id.clone(), territory.clone());
            }
            (Field::TerritoryArmy(id), op) => {
                let territory = snapshot
                    .territories
                    .get_mut(id)
                    .ok_or_else(|| StoreError::Patch(format!("unknown territory {id}")))?;
                territory.army = int_op(territory.army, op, &self.field)?.max(0);
            }

            (Field::Player(uid), Op::Set(Value::Player(player))) => {
                match snapshot.player_mut(uid) {
                    Some(existing) => *existing = player.clone(),
                    None => snapshot.players.push_back(player.clone()),
                }
            }
            (Field::PlayerReady(uid), Op::Set(Value::Bool(ready))) => {
                player_mut(snapshot, uid)?.is_turn_ready = *ready;
            }
            (Field::PlayerLastActive(uid), Op::Set(Value::Int(at))) => {
                player_mut(snapshot, uid)?.last_active = u64::try_from(*at).unwrap_or(0);
            }

            (Field::Advisor(..), Op::Set(Value::Advisor(advisor))) => {
                snapshot.advisors.insert(advisor.key(), advisor.clone());
            }
            (Field::AdvisorLoyalty(uid, portfolio), op) => {
                let advisor = snapshot
                    .advisors
                    .get_mut(&(uid.clone(), *portfolio))
                    .ok_or_else(|| StoreError::Patch(format!("no {portfolio} advisor for {uid}")))?;
                advisor.loyalty = clamp_score(int_op(advisor.loyalty, op, &self.field)?);
            }

            (Field::Events, Op::Append(Value::Event(event))) => snapshot.push_event(event.clone()),
            (Field::PendingActions, Op::Append(Value::Pending(action))) => {
                snapshot.pending_actions.push_back(action.clone());
            }
            (Field::PendingActions, Op::Clear) => snapshot.pending_actions.clear(),

            (field, op) => {
                return Err(StoreError::Patch(format!("{op:?} is not supported on {field:?}")));
            }
        }
        Ok(())
    }
}

fn int_op(current: i64, op: &Op, field: &Field) -> Result<i64, StoreError> {
    match op {
        Op::Set(Value::Int(value)) => Ok(*value),
        Op::Increment(delta) => Ok(current.saturating_add(*delta)),
        other => Err(StoreError::Patch(format!("{other:?} is not numeric for {field:?}"))),
    }
}

fn nation_mut<'a>(snapshot: &'a mut Snapshot, id: &NationId) -> Result<&'a mut Nation, StoreError> {
    snapshot
        .nations
        .get_mut(id)
        .ok_or_else(|| StoreError::Patch(format!("unknown nation {id}")))
}

fn player_mut<'a>(snapshot: &'a mut Snapshot, uid: &PlayerId) -> Result<&'a mut Player, StoreError> {
    snapshot
        .player_mut(uid)
        .ok_or_else(|| StoreError::Patch(format!("unknown player {uid}")))
}

/// Current value of a numeric field, if the field exists and is numeric.
#[must_use]
pub fn read_int(snapshot: &Snapshot, field: &Field) -> Option<i64> {
    match field {
        Field::Turn => Some(i64::from(snapshot.turn)),
        Field::NationResources(id) => snapshot.nation(id).map(|n| n.resources),
        Field::NationStability(id) => snapshot.nation(id).map(|n| n.stability),
        Field::NationTech(id, tech) => snapshot.nation(id).map(|n| i64::from(n.tech_level(*tech))),
        Field::TerritoryArmy(id) => snapshot.territory(id).map(|t| t.army),
        Field::PlayerLastActive(uid) => snapshot
            .player(uid)
            .and_then(|p| i64::try_from(p.last_active).ok()),
        Field::AdvisorLoyalty(uid, portfolio) => snapshot
            .advisors
            .get(&(uid.clone(), *portfolio))
            .map(|a| a.loyalty),
        _ => None,
    }
}

/// Precondition evaluated atomically with a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guard {
    /// The document is still at this turn.
    TurnIs(u32),
    /// The game is in this status.
    StatusIs(GameStatus),
    /// Nothing was committed since this revision was read.
    RevisionIs(u64),
    /// A numeric field is at least this value.
    IntAtLeast(Field, i64),
    /// A numeric field equals this value.
    IntEquals(Field, i64),
    /// A territory is owned by this nation (or unowned).
    OwnerIs(TerritoryId, Option<NationId>),
    /// A player's turn-ready flag has this value.
    PlayerReadyIs(PlayerId, bool),
    /// The host lease is held by this player (or nobody).
    HostIs(Option<PlayerId>),
}

impl Guard {
    /// Check this guard against the stored document.
    pub fn check(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let holds = match self {
            Guard::TurnIs(turn) => snapshot.turn == *turn,
            Guard::StatusIs(status) => snapshot.status == *status,
            Guard::RevisionIs(revision) => snapshot.revision == *revision,
            Guard::IntAtLeast(field, min) => read_int(snapshot, field).is_some_and(|v| v >= *min),
            Guard::IntEquals(field, expected) => read_int(snapshot, field) == Some(*expected),
            Guard::OwnerIs(territory, owner) => snapshot
                .territory(territory)
                .is_some_and(|t| &t.owner == owner),
            Guard::PlayerReadyIs(uid, ready) => snapshot
                .player(uid)
                .is_some_and(|p| p.is_turn_ready == *ready),
            Guard::HostIs(holder) => {
                snapshot.host.as_ref().map(|lease| &lease.holder) == holder.as_ref()
            }
        };

        if holds {
            Ok(())
        } else {
            Err(StoreError::GuardFailed(format!("{self:?}")))
        }
    }
}

/// Check all guards, then apply all patches to a copy of `snapshot`.
///
/// Returns the new document with its revision bumped. On any failure the
/// input is untouched and no partial result escapes.
pub fn apply_commit(snapshot: &Snapshot, guards: &[Guard], patches: &[Patch]) -> Result<Snapshot, StoreError> {
    for guard in guards {
        guard.check(snapshot)?;
    }

    let mut next = snapshot.clone();
    for patch in patches {
        patch.apply(&mut next)?;
    }
    next.revision = snapshot.revision + 1;
    Ok(next)
}
