//! Convert a resolved turn into one batch of patches.
//!
//! The pipeline works on a copy of the snapshot. To publish the result,
//! every entity that changed is written back whole, new events are
//! appended and the pending queue is cleared, all in a single commit.

use crate::core::Snapshot;
use crate::store::{Field, Patch, Value};

/// Patches that turn `before` into `after`.
///
/// Assumes `after` was derived from `before`: entities are never removed
/// and the event log only grows.
#[must_use]
pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<Patch> {
    let mut patches = Vec::new();

    if before.status != after.status {
        patches.push(Patch::set(Field::Status, Value::Status(after.status)));
    }
    if before.winner != after.winner {
        patches.push(Patch::set(Field::Winner, Value::Winner(after.winner.clone())));
    }
    if before.host != after.host {
        patches.push(Patch::set(Field::Host, Value::Host(after.host.clone())));
    }

    for (id, nation) in &after.nations {
        if before.nations.get(id) != Some(nation) {
            patches.push(Patch::set(Field::Nation(id.clone()), Value::Nation(nation.clone())));
        }
    }
    for (id, territory) in &after.territories {
        if before.territories.get(id) != Some(territory) {
            patches.push(Patch::set(Field::Territory(id.clone()), Value::Territory(territory.clone())));
        }
    }
    for player in &after.players {
        if before.player(&player.uid) != Some(player) {
            patches.push(Patch::set(Field::Player(player.uid.clone()), Value::Player(player.clone())));
        }
    }
    for (key, advisor) in &after.advisors {
        if before.advisors.get(key) != Some(advisor) {
            patches.push(Patch::set(
                Field::Advisor(key.0.clone(), key.1),
                Value::Advisor(advisor.clone()),
            ));
        }
    }

    patches.extend(after.events.iter().skip(before.events.len()).cloned().map(Patch::event));

    if before.pending_actions != after.pending_actions {
        patches.push(Patch::clear(Field::PendingActions));
        patches.extend(
            after
                .pending_actions
                .iter()
                .cloned()
                .map(|action| Patch::append(Field::PendingActions, Value::Pending(action))),
        );
    }

    if before.turn != after.turn {
        patches.push(Patch::set(Field::Turn, Value::Int(i64::from(after.turn))));
    }
    patches
}
