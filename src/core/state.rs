//! The game document.
//!
//! A [`Snapshot`] is the whole shared state of one game: the map, the
//! nations, the players and their advisors, the event log and the queue
//! of pending attacks. It is a value, not a handle; the validator reads
//! one, the pipeline clones one and transforms the clone.
//!
//! Uses `im` persistent data structures, so cloning a snapshot is O(1)
//! and the pipeline's working copy shares structure with the original
//! until it writes.

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use super::action::PendingAction;
use super::entity::{Advisor, AdvisorKey, Nation, NationStatus, Player, PlayerStatus, Territory};
use super::event::Event;
use super::ids::{NationId, PlayerId, TerritoryId};

/// Game lifecycle. Transitions only move forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Lobby: players are joining.
    #[default]
    Waiting,
    /// Turns are being played.
    Playing,
    /// A winner was declared (or nobody is left).
    Finished,
}

impl GameStatus {
    /// Check if moving to `next` keeps the lifecycle monotonic.
    #[must_use]
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        next >= self
    }
}

/// The right to run the turn pipeline, held by one player until it expires.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostLease {
    /// Current host.
    pub holder: PlayerId,
    /// Lease expiry, milliseconds since the Unix epoch.
    pub expires_at: u64,
}

impl HostLease {
    /// Create a lease valid for `duration_ms` from `now`.
    #[must_use]
    pub fn new(holder: PlayerId, now: u64, duration_ms: u64) -> Self {
        Self {
            holder,
            expires_at: now.saturating_add(duration_ms),
        }
    }

    /// Check if the lease has run out.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Complete state of one game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    // === Document bookkeeping ===
    /// Bumped by the store on every successful commit.
    pub revision: u64,

    /// Game seed; turn streams derive from it.
    pub seed: u64,

    // === Progression ===
    /// Turn number (starts at 1).
    pub turn: u32,

    /// Lifecycle status.
    pub status: GameStatus,

    /// Winning nation once finished.
    pub winner: Option<NationId>,

    /// Who may run the pipeline.
    pub host: Option<HostLease>,

    // === Entities ===
    /// Players in join order; index 0 is the host.
    pub players: Vector<Player>,

    /// Nations by name.
    pub nations: OrdMap<NationId, Nation>,

    /// Territories by id.
    pub territories: OrdMap<TerritoryId, Territory>,

    /// Advisors by (player, portfolio).
    pub advisors: OrdMap<AdvisorKey, Advisor>,

    // === Logs ===
    /// Append-only event log.
    pub events: Vector<Event>,

    /// Attacks queued this turn.
    pub pending_actions: Vector<PendingAction>,
}

impl Snapshot {
    /// Create an empty game in the lobby.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            revision: 0,
            seed,
            turn: 1,
            status: GameStatus::Waiting,
            winner: None,
            host: None,
            players: Vector::new(),
            nations: OrdMap::new(),
            territories: OrdMap::new(),
            advisors: OrdMap::new(),
            events: Vector::new(),
            pending_actions: Vector::new(),
        }
    }

    // === Lookups ===

    /// Get a nation.
    #[must_use]
    pub fn nation(&self, id: &NationId) -> Option<&Nation> {
        self.nations.get(id)
    }

    /// Get a territory.
    #[must_use]
    pub fn territory(&self, id: &TerritoryId) -> Option<&Territory> {
        self.territories.get(id)
    }

    /// Get a player.
    #[must_use]
    pub fn player(&self, uid: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.uid == uid)
    }

    /// Get a mutable player.
    pub fn player_mut(&mut self, uid: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.uid == uid)
    }

    /// Position of a player in the join order.
    #[must_use]
    pub fn player_index(&self, uid: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.uid == uid)
    }

    /// The player controlling a nation.
    #[must_use]
    pub fn player_for_nation(&self, nation: &NationId) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.nation.as_ref() == Some(nation))
    }

    /// The nation a player controls.
    #[must_use]
    pub fn nation_of(&self, uid: &PlayerId) -> Option<&Nation> {
        self.player(uid)
            .and_then(|p| p.nation.as_ref())
            .and_then(|n| self.nations.get(n))
    }

    /// The capital a nation currently owns.
    #[must_use]
    pub fn capital_of(&self, nation: &NationId) -> Option<&Territory> {
        self.territories
            .values()
            .find(|t| t.is_capital && t.is_owned_by(nation))
    }

    /// Territories owned by a nation, in id order.
    pub fn territories_of<'a>(&'a self, nation: &'a NationId) -> impl Iterator<Item = &'a Territory> + 'a {
        self.territories.values().filter(move |t| t.is_owned_by(nation))
    }

    /// Number of territories owned by a nation.
    #[must_use]
    pub fn territory_count(&self, nation: &NationId) -> usize {
        self.territories_of(nation).count()
    }

    /// A player's advisors, in portfolio order.
    pub fn advisors_of<'a>(&'a self, uid: &'a PlayerId) -> impl Iterator<Item = &'a Advisor> + 'a {
        self.advisors.values().filter(move |a| &a.player == uid)
    }

    // === Players ===

    /// Current host by list position.
    #[must_use]
    pub fn host_player(&self) -> Option<&PlayerId> {
        self.players.front().map(|p| &p.uid)
    }

    /// Players still taking turns.
    pub fn playing_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_playing())
    }

    /// Check if every playing player has signalled end of turn.
    ///
    /// A game with no playing players is never ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        let mut any = false;
        for player in self.playing_players() {
            if !player.is_turn_ready {
                return false;
            }
            any = true;
        }
        any
    }

    // === Events ===

    /// Append an event to the log.
    pub fn push_event(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Events a player is allowed to see, oldest first.
    pub fn events_for<'a>(&'a self, uid: &'a PlayerId) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.visible_to(uid))
    }

    // === Elimination ===

    /// Mark a nation and its controlling player as eliminated.
    ///
    /// Territory ownership is left to the caller: capture transfers it,
    /// collapse releases it.
    pub fn mark_eliminated(&mut self, nation: &NationId) {
        if let Some(n) = self.nations.get_mut(nation) {
            n.status = NationStatus::Eliminated;
        }
        if let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.nation.as_ref() == Some(nation))
        {
            player.status = PlayerStatus::Eliminated;
            player.is_turn_ready = false;
        }
    }

    // === Encoding ===

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::Portfolio;
    use crate::core::event::EventKind;

    fn two_player_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new(42);

        for (nation, player) in [("Avalon", "p1"), ("Brigant", "p2")] {
            let mut n = Nation::new(nation, 500, 70);
            n.owner = Some(PlayerId::new(player));
            snapshot.nations.insert(n.name.clone(), n);
            snapshot
                .players
                .push_back(Player::new(player, Some(NationId::new(nation)), 0));
        }

        let mut capital = Territory::new("a1", "Camelot");
        capital.owner = Some(NationId::new("Avalon"));
        capital.is_capital = true;
        capital.army = 10;
        snapshot.territories.insert(capital.id.clone(), capital);

        let mut farm = Territory::new("a2", "Lyonesse");
        farm.owner = Some(NationId::new("Avalon"));
        snapshot.territories.insert(farm.id.clone(), farm);

        snapshot
    }

    #[test]
    fn test_new_snapshot() {
        let snapshot = Snapshot::new(7);
        assert_eq!(snapshot.turn, 1);
        assert_eq!(snapshot.status, GameStatus::Waiting);
        assert!(snapshot.host_player().is_none());
        assert!(!snapshot.all_ready());
    }

    #[test]
    fn test_status_monotonic() {
        assert!(GameStatus::Waiting.can_transition_to(GameStatus::Playing));
        assert!(GameStatus::Playing.can_transition_to(GameStatus::Finished));
        assert!(!GameStatus::Finished.can_transition_to(GameStatus::Playing));
    }

    #[test]
    fn test_lookups() {
        let snapshot = two_player_snapshot();
        let avalon = NationId::new("Avalon");

        assert_eq!(snapshot.capital_of(&avalon).unwrap().id.as_str(), "a1");
        assert_eq!(snapshot.territory_count(&avalon), 2);
        assert_eq!(snapshot.nation_of(&PlayerId::new("p2")).unwrap().name.as_str(), "Brigant");
        assert_eq!(snapshot.player_for_nation(&avalon).unwrap().uid.as_str(), "p1");
        assert_eq!(snapshot.host_player().unwrap().as_str(), "p1");
        assert!(snapshot.capital_of(&NationId::new("Brigant")).is_none());
    }

    #[test]
    fn test_all_ready_ignores_eliminated() {
        let mut snapshot = two_player_snapshot();
        snapshot.player_mut(&PlayerId::new("p1")).unwrap().is_turn_ready = true;
        assert!(!snapshot.all_ready());

        snapshot.mark_eliminated(&NationId::new("Brigant"));
        assert!(snapshot.all_ready());
    }

    #[test]
    fn test_mark_eliminated_keeps_territories() {
        let mut snapshot = two_player_snapshot();
        let avalon = NationId::new("Avalon");
        snapshot.mark_eliminated(&avalon);

        assert!(!snapshot.nation(&avalon).unwrap().is_active());
        assert!(!snapshot.player(&PlayerId::new("p1")).unwrap().is_playing());
        assert_eq!(snapshot.territory_count(&avalon), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = two_player_snapshot();
        let mut copy = original.clone();
        copy.territories.get_mut(&TerritoryId::new("a1")).unwrap().army = 99;

        assert_eq!(original.territory(&TerritoryId::new("a1")).unwrap().army, 10);
        assert_eq!(copy.territory(&TerritoryId::new("a1")).unwrap().army, 99);
    }

    #[test]
    fn test_events_for_respects_privacy() {
        let mut snapshot = two_player_snapshot();
        snapshot.push_event(Event::new(1, EventKind::Battle, "public"));
        snapshot.push_event(
            Event::new(1, EventKind::Betrayal, "secret").private_to(PlayerId::new("p1")),
        );

        assert_eq!(snapshot.events_for(&PlayerId::new("p1")).count(), 2);
        assert_eq!(snapshot.events_for(&PlayerId::new("p2")).count(), 1);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let mut snapshot = two_player_snapshot();
        snapshot.advisors.insert(
            (PlayerId::new("p1"), Portfolio::Finance),
            Advisor::new(PlayerId::new("p1"), Portfolio::Finance, 40),
        );
        snapshot.host = Some(HostLease::new(PlayerId::new("p1"), 0, 60_000));

        let bytes = snapshot.to_bytes().unwrap();
        let back = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snapshot, back);
    }

    #[test]
    fn test_host_lease_expiry() {
        let lease = HostLease::new(PlayerId::new("p1"), 1_000, 60_000);
        assert!(!lease.is_expired(60_999));
        assert!(lease.is_expired(61_000));
    }
}
