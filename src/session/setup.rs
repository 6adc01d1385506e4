//! Game setup: map building, joining and starting.

use rustc_hash::FxHashMap;

use crate::core::{
    Advisor, Event, EventKind, GameStatus, HostLease, Nation, NationId, Player, PlayerId, Portfolio, RulesConfig,
    Snapshot, Territory, TerritoryId,
};
use crate::error::{SetupError, ValidationError};
use crate::store::{Field, Patch, Value};

/// Builder for a game in the lobby.
///
/// ```
/// use nation_turns::session::GameBuilder;
///
/// let snapshot = GameBuilder::new()
///     .nation("Avalon", 300, 60)
///     .nation("Brigant", 300, 60)
///     .territory("a1", "Camelot", Some("Avalon"), 10, true)
///     .territory("b1", "Dunharrow", Some("Brigant"), 10, true)
///     .border("a1", "b1")
///     .build(7)
///     .unwrap();
///
/// assert_eq!(snapshot.turn, 1);
/// assert!(snapshot.territory(&"a1".into()).unwrap().is_adjacent(&"b1".into()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct GameBuilder {
    nations: Vec<Nation>,
    territories: Vec<Territory>,
    borders: Vec<(TerritoryId, TerritoryId)>,
}

impl GameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a nation.
    pub fn nation(mut self, name: &str, resources: i64, stability: i64) -> Self {
        self.nations.push(Nation::new(name, resources, stability));
        self
    }

    /// Declare a territory.
    pub fn territory(mut self, id: &str, name: &str, owner: Option<&str>, army: i64, capital: bool) -> Self {
        let mut territory = Territory::new(id, name);
        territory.owner = owner.map(NationId::new);
        territory.army = army.max(0);
        territory.is_capital = capital;
        self.territories.push(territory);
        self
    }

    /// Connect two territories (both directions).
    pub fn border(mut self, a: &str, b: &str) -> Self {
        self.borders.push((TerritoryId::new(a), TerritoryId::new(b)));
        self
    }

    /// Validate the map and produce the lobby snapshot.
    pub fn build(self, seed: u64) -> Result<Snapshot, SetupError> {
        let mut snapshot = Snapshot::new(seed);

        for nation in self.nations {
            if snapshot.nations.contains_key(&nation.name) {
                return Err(SetupError::DuplicateNation(nation.name));
            }
            snapshot.nations.insert(nation.name.clone(), nation);
        }

        let mut capitals: FxHashMap<NationId, usize> = FxHashMap::default();
        for territory in self.territories {
            if snapshot.territories.contains_key(&territory.id) {
                return Err(SetupError::DuplicateTerritory(territory.id));
            }
            if let Some(owner) = &territory.owner {
                if !snapshot.nations.contains_key(owner) {
                    return Err(SetupError::UnknownOwner {
                        territory: territory.id,
                        nation: owner.clone(),
                    });
                }
                if territory.is_capital {
                    *capitals.entry(owner.clone()).or_default() += 1;
                }
            }
            snapshot.territories.insert(territory.id.clone(), territory);
        }

        for name in snapshot.nations.keys() {
            let found = capitals.get(name).copied().unwrap_or(0);
            if found != 1 {
                return Err(SetupError::CapitalCount {
                    nation: name.clone(),
                    found,
                });
            }
        }

        for (a, b) in self.borders {
            for (from, to) in [(&a, &b), (&b, &a)] {
                let territory = snapshot
                    .territories
                    .get_mut(from)
                    .ok_or_else(|| SetupError::UnknownNeighbor {
                        territory: to.clone(),
                        neighbor: from.clone(),
                    })?;
                if !territory.neighbors.contains(to) {
                    territory.neighbors.push(to.clone());
                }
            }
        }

        Ok(snapshot)
    }
}

/// Patches that bind a player to a nation.
///
/// The first player to join becomes the host.
pub fn plan_join(
    snapshot: &Snapshot,
    config: &RulesConfig,
    uid: &PlayerId,
    nation_id: &NationId,
    now: u64,
) -> Result<Vec<Patch>, ValidationError> {
    if snapshot.status != GameStatus::Waiting {
        return Err(ValidationError::GameNotJoinable);
    }
    if snapshot.player(uid).is_some() {
        return Err(ValidationError::AlreadyJoined(uid.clone()));
    }
    let nation = snapshot
        .nation(nation_id)
        .ok_or_else(|| ValidationError::UnknownNation(nation_id.clone()))?;
    if !nation.is_active() {
        return Err(ValidationError::NationEliminated(nation_id.clone()));
    }
    if nation.owner.is_some() {
        return Err(ValidationError::NationTaken(nation_id.clone()));
    }

    let mut claimed = nation.clone();
    claimed.owner = Some(uid.clone());

    let mut patches = vec![
        Patch::append(Field::Players, Value::Player(Player::new(uid.clone(), Some(nation_id.clone()), now))),
        Patch::set(Field::Nation(nation_id.clone()), Value::Nation(claimed)),
    ];
    patches.extend(Portfolio::ALL.into_iter().map(|portfolio| {
        Patch::set(
            Field::Advisor(uid.clone(), portfolio),
            Value::Advisor(Advisor::new(uid.clone(), portfolio, config.initial_loyalty)),
        )
    }));
    if snapshot.players.is_empty() {
        patches.push(Patch::set(
            Field::Host,
            Value::Host(Some(HostLease::new(uid.clone(), now, config.host_lease_ms))),
        ));
    }
    patches.push(Patch::event(
        Event::new(snapshot.turn, EventKind::Join, format!("{uid} now leads {nation_id}")).about(nation_id.clone()),
    ));
    Ok(patches)
}

/// Patches that move the game out of the lobby.
pub fn plan_start(
    snapshot: &Snapshot,
    config: &RulesConfig,
    uid: &PlayerId,
    now: u64,
) -> Result<Vec<Patch>, ValidationError> {
    if snapshot.status != GameStatus::Waiting {
        return Err(ValidationError::GameNotJoinable);
    }
    if snapshot.players.is_empty() {
        return Err(ValidationError::NoPlayers);
    }
    if snapshot.host_player() != Some(uid) {
        return Err(ValidationError::NotHost);
    }

    Ok(vec![
        Patch::set(Field::Status, Value::Status(GameStatus::Playing)),
        Patch::set(
            Field::Host,
            Value::Host(Some(HostLease::new(uid.clone(), now, config.host_lease_ms))),
        ),
        Patch::event(Event::new(
            snapshot.turn,
            EventKind::GameStart,
            format!("The game begins with {} nations", snapshot.players.len()),
        )),
    ])
}
