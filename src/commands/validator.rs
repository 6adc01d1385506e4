//! Command validation.
//!
//! [`plan_command`] checks every precondition of a canonical command
//! against a snapshot and, if they hold, returns a [`CommandPlan`]: the
//! field patches that apply the command plus the guards under which those
//! patches are still valid at commit time.
//!
//! Planning never touches the store. Only additive, field-scoped patches
//! are produced here; ownership transfers and eliminations are reserved
//! for the turn pipeline.

use crate::core::{
    CommandKind, Event, EventKind, GameStatus, Nation, PendingAction, Player, PlayerId, RulesConfig,
    Snapshot, Technology, Territory, TerritoryId,
};
use crate::error::ValidationError;
use crate::store::{Field, Guard, Patch, Value};

use super::command::Command;

/// Patches and guards that apply one validated command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPlan {
    /// Preconditions re-checked atomically at commit.
    pub guards: Vec<Guard>,
    /// Field operations to commit.
    pub patches: Vec<Patch>,
    /// Message reported to the submitter.
    pub message: String,
}

impl CommandPlan {
    fn new(message: impl Into<String>) -> Self {
        Self {
            guards: vec![Guard::StatusIs(GameStatus::Playing)],
            patches: Vec::new(),
            message: message.into(),
        }
    }
}

/// Military construction cost after the engineering discount.
///
/// `round(amount * unit_cost * (1 - engineering * discount_per_level))`,
/// with the discount capped at 100%. `None` if the base cost overflows.
#[must_use]
pub fn military_cost(config: &RulesConfig, amount: i64, engineering_level: u32) -> Option<i64> {
    let discount = f64::from(engineering_level) * config.engineering_discount_per_level;
    let factor = (1.0 - discount).max(0.0);
    let base = amount.checked_mul(config.unit_cost)?;
    Some((base as f64 * factor).round() as i64)
}

/// Cost of researching the next level of a technology.
#[must_use]
pub fn research_cost(config: &RulesConfig, current_level: u32) -> i64 {
    config.research_base_cost * (i64::from(current_level) + 1)
}

/// Resolve the submitting player and their nation, checking both are live.
pub fn actor<'a>(snapshot: &'a Snapshot, uid: &PlayerId) -> Result<(&'a Player, &'a Nation), ValidationError> {
    if snapshot.status != GameStatus::Playing {
        return Err(ValidationError::GameNotPlaying);
    }
    let player = snapshot
        .player(uid)
        .ok_or_else(|| ValidationError::UnknownPlayer(uid.clone()))?;
    if !player.is_playing() {
        return Err(ValidationError::PlayerEliminated(uid.clone()));
    }
    let nation_id = player
        .nation
        .as_ref()
        .ok_or_else(|| ValidationError::NoNation(uid.clone()))?;
    let nation = snapshot
        .nation(nation_id)
        .ok_or_else(|| ValidationError::UnknownNation(nation_id.clone()))?;
    if !nation.is_active() {
        return Err(ValidationError::NationEliminated(nation_id.clone()));
    }
    Ok((player, nation))
}

fn territory<'a>(snapshot: &'a Snapshot, id: &TerritoryId) -> Result<&'a Territory, ValidationError> {
    snapshot
        .territory(id)
        .ok_or_else(|| ValidationError::UnknownTerritory(id.clone()))
}

fn owned<'a>(snapshot: &'a Snapshot, id: &TerritoryId, nation: &Nation) -> Result<&'a Territory, ValidationError> {
    let t = territory(snapshot, id)?;
    if t.is_owned_by(&nation.name) {
        Ok(t)
    } else {
        Err(ValidationError::NotOwned(id.clone()))
    }
}

fn require_resources(nation: &Nation, cost: i64) -> Result<(), ValidationError> {
    if nation.resources < cost {
        return Err(ValidationError::InsufficientResources {
            required: cost,
            available: nation.resources,
        });
    }
    Ok(())
}

fn require_positive(amount: i64) -> Result<(), ValidationError> {
    if amount < 1 {
        return Err(ValidationError::InvalidQuantity(amount));
    }
    Ok(())
}

/// Loyalty patches for a command, skipping advisors the player lacks.
pub fn loyalty_patches(snapshot: &Snapshot, config: &RulesConfig, uid: &PlayerId, kind: CommandKind) -> Vec<Patch> {
    config
        .loyalty_deltas
        .for_command(kind)
        .iter()
        .filter(|(portfolio, _)| snapshot.advisors.contains_key(&(uid.clone(), *portfolio)))
        .map(|(portfolio, delta)| Patch::increment(Field::AdvisorLoyalty(uid.clone(), *portfolio), *delta))
        .collect()
}

/// Validate a canonical command and plan its patches.
///
/// `AdvisorCommand` and `Invalid` must be resolved by the caller first;
/// passing them here is a validation error.
pub fn plan_command(
    snapshot: &Snapshot,
    config: &RulesConfig,
    uid: &PlayerId,
    command: &Command,
) -> Result<CommandPlan, ValidationError> {
    let (player, nation) = actor(snapshot, uid)?;
    let turn = snapshot.turn;

    let mut plan = match command {
        Command::Attack { from, to } => {
            if player.is_turn_ready {
                return Err(ValidationError::AlreadyReady);
            }
            let origin = owned(snapshot, from, nation)?;
            if origin.army <= 0 {
                return Err(ValidationError::NoArmy(from.clone()));
            }
            let target = territory(snapshot, to)?;
            if !origin.is_adjacent(to) {
                return Err(ValidationError::NotAdjacent {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            if target.is_owned_by(&nation.name) {
                return Err(ValidationError::OwnTerritory(to.clone()));
            }

            let mut plan = CommandPlan::new(format!("Attack on {} from {} queued for turn {turn}", target.name, origin.name));
            plan.guards.extend([
                Guard::TurnIs(turn),
                Guard::PlayerReadyIs(uid.clone(), false),
                Guard::OwnerIs(from.clone(), Some(nation.name.clone())),
            ]);
            plan.patches.push(Patch::append(
                Field::PendingActions,
                Value::Pending(PendingAction::attack(nation.name.clone(), from.clone(), to.clone(), turn)),
            ));
            plan.patches.push(Patch::event(
                Event::new(turn, EventKind::AttackOrdered, format!("{} ordered an attack on {} from {}", nation.name, target.name, origin.name))
                    .about(nation.name.clone())
                    .private_to(uid.clone()),
            ));
            plan
        }

        Command::BuildMilitary { amount } => {
            require_positive(*amount)?;
            let capital = snapshot
                .capital_of(&nation.name)
                .ok_or(ValidationError::NoCapital)?;
            let cost = military_cost(config, *amount, nation.tech_level(Technology::Engineering))
                .ok_or(ValidationError::QuantityTooLarge(*amount))?;
            require_resources(nation, cost)?;

            let mut plan = CommandPlan::new(format!("Raised {amount} troops at {} for {cost}", capital.name));
            plan.guards.extend([
                Guard::IntAtLeast(Field::NationResources(nation.name.clone()), cost),
                Guard::OwnerIs(capital.id.clone(), Some(nation.name.clone())),
            ]);
            plan.patches.extend([
                Patch::increment(Field::NationResources(nation.name.clone()), -cost),
                Patch::increment(Field::TerritoryArmy(capital.id.clone()), *amount),
                Patch::event(
                    Event::new(turn, EventKind::Recruitment, format!("{} raised {amount} troops at {}", nation.name, capital.name))
                        .about(nation.name.clone()),
                ),
            ]);
            plan
        }

        Command::Research { tech } => {
            let level = nation.tech_level(*tech);
            let cost = research_cost(config, level);
            require_resources(nation, cost)?;

            let mut plan = CommandPlan::new(format!("Researched {tech} level {} for {cost}", level + 1));
            plan.guards.extend([
                Guard::IntAtLeast(Field::NationResources(nation.name.clone()), cost),
                Guard::IntEquals(Field::NationTech(nation.name.clone(), *tech), i64::from(level)),
            ]);
            plan.patches.extend([
                Patch::increment(Field::NationResources(nation.name.clone()), -cost),
                Patch::increment(Field::NationTech(nation.name.clone(), *tech), 1),
                Patch::event(
                    Event::new(turn, EventKind::Research, format!("{} advanced {tech} to level {}", nation.name, level + 1))
                        .about(nation.name.clone()),
                ),
            ]);
            plan
        }

        Command::MoveTroops { from, to, amount } => {
            require_positive(*amount)?;
            let origin = owned(snapshot, from, nation)?;
            let destination = owned(snapshot, to, nation)?;
            if !origin.is_adjacent(to) {
                return Err(ValidationError::NotAdjacent {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            let moved = (*amount).min(origin.army - 1);
            if moved < 1 {
                return Err(ValidationError::MustLeaveGarrison(from.clone()));
            }

            let mut plan = CommandPlan::new(format!("Moved {moved} troops from {} to {}", origin.name, destination.name));
            plan.guards.extend([
                Guard::OwnerIs(from.clone(), Some(nation.name.clone())),
                Guard::OwnerIs(to.clone(), Some(nation.name.clone())),
                Guard::IntAtLeast(Field::TerritoryArmy(from.clone()), moved + 1),
            ]);
            plan.patches.extend([
                Patch::increment(Field::TerritoryArmy(from.clone()), -moved),
                Patch::increment(Field::TerritoryArmy(to.clone()), moved),
                Patch::event(
                    Event::new(turn, EventKind::TroopMovement, format!("{} moved {moved} troops from {} to {}", nation.name, origin.name, destination.name))
                        .about(nation.name.clone()),
                ),
            ]);
            plan
        }

        Command::AdvisorCommand { .. } => {
            return Err(ValidationError::AdvisorRefused(
                "advisor orders must be interpreted before execution".to_string(),
            ));
        }

        Command::Invalid { explanation } => {
            return Err(ValidationError::AdvisorRefused(explanation.clone()));
        }
    };

    if let Some(kind) = command.kind() {
        plan.patches.extend(loyalty_patches(snapshot, config, uid, kind));
    }
    Ok(plan)
}
