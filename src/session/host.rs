//! Host lease and failover.
//!
//! The host holds a lease that it renews on every heartbeat. When the
//! lease runs out, the earliest-listed live player may claim it. A claim
//! is a compare-and-swap on the lease holder, so when several players
//! notice the dead host at once only one of them is promoted.

use crate::core::{Event, EventKind, HostLease, PlayerId, RulesConfig, Snapshot};
use crate::error::ValidationError;
use crate::store::{Field, Guard, Patch, Value};

/// Check if a player was seen within the lease window.
#[must_use]
pub fn is_live(last_active: u64, now: u64, lease_ms: u64) -> bool {
    now.saturating_sub(last_active) < lease_ms
}

/// The player who should take over an expired lease.
///
/// First in list order among playing, live players, excluding the
/// holder of the expired lease.
#[must_use]
pub fn next_host<'a>(snapshot: &'a Snapshot, now: u64, lease_ms: u64) -> Option<&'a PlayerId> {
    let holder = snapshot.host.as_ref().map(|lease| &lease.holder);
    snapshot
        .playing_players()
        .filter(|p| Some(&p.uid) != holder)
        .find(|p| is_live(p.last_active, now, lease_ms))
        .map(|p| &p.uid)
}

/// Guards and patches for a heartbeat.
///
/// Always touches `last_active`; the holder also renews its lease.
#[must_use]
pub fn plan_heartbeat(snapshot: &Snapshot, config: &RulesConfig, uid: &PlayerId, now: u64) -> (Vec<Guard>, Vec<Patch>) {
    let mut guards = Vec::new();
    let mut patches = vec![Patch::set(
        Field::PlayerLastActive(uid.clone()),
        Value::Int(i64::try_from(now).unwrap_or(i64::MAX)),
    )];

    if snapshot.host.as_ref().is_some_and(|lease| &lease.holder == uid) {
        guards.push(Guard::HostIs(Some(uid.clone())));
        patches.push(Patch::set(
            Field::Host,
            Value::Host(Some(HostLease::new(uid.clone(), now, config.host_lease_ms))),
        ));
    }
    (guards, patches)
}

/// Guards and patches that promote `uid` to host.
///
/// Moves the new host to the front of the player list; everyone else
/// keeps their relative order. The list is rewritten whole, so the claim
/// is also guarded on the revision it was planned from: any player write
/// committed in between makes it fail rather than be reverted.
pub fn plan_claim(
    snapshot: &Snapshot,
    config: &RulesConfig,
    uid: &PlayerId,
    now: u64,
) -> Result<(Vec<Guard>, Vec<Patch>), ValidationError> {
    let player = snapshot
        .player(uid)
        .ok_or_else(|| ValidationError::UnknownPlayer(uid.clone()))?;
    if !player.is_playing() {
        return Err(ValidationError::PlayerEliminated(uid.clone()));
    }

    let current = snapshot.host.as_ref().map(|lease| lease.holder.clone());
    if let Some(lease) = &snapshot.host {
        if !lease.is_expired(now) {
            return Err(ValidationError::HostStillActive(lease.holder.clone()));
        }
    }
    if next_host(snapshot, now, config.host_lease_ms) != Some(uid) {
        return Err(ValidationError::NotNextHost(uid.clone()));
    }

    let mut players: Vec<_> = snapshot.players.iter().cloned().collect();
    if let Some(index) = players.iter().position(|p| &p.uid == uid) {
        let host = players.remove(index);
        players.insert(0, host);
    }

    let previous = current
        .as_ref()
        .map_or_else(|| "nobody".to_string(), ToString::to_string);
    Ok((
        vec![Guard::HostIs(current), Guard::RevisionIs(snapshot.revision)],
        vec![
            Patch::set(
                Field::Host,
                Value::Host(Some(HostLease::new(uid.clone(), now, config.host_lease_ms))),
            ),
            Patch::set(Field::Players, Value::Players(players)),
            Patch::set(
                Field::PlayerLastActive(uid.clone()),
                Value::Int(i64::try_from(now).unwrap_or(i64::MAX)),
            ),
            Patch::event(Event::new(
                snapshot.turn,
                EventKind::HostChange,
                format!("{uid} took over hosting from {previous}"),
            )),
        ],
    ))
}
