//! Entity model: nations, territories, players and advisors.
//!
//! Entities are plain data. All rules live in `commands` and `pipeline`;
//! the only logic here is clamping and small queries that every caller
//! would otherwise repeat.

use im::OrdMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::str::FromStr;

use super::ids::{NationId, PlayerId, TerritoryId};

/// Upper bound for stability and loyalty scores.
pub const SCORE_MAX: i64 = 100;

/// Clamp a stability or loyalty score into `[0, 100]`.
#[must_use]
pub fn clamp_score(value: i64) -> i64 {
    value.clamp(0, SCORE_MAX)
}

/// A researchable technology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    /// Boosts per-turn production and raises the resource cap.
    Agriculture,
    /// Discounts military construction and adds combat power.
    Engineering,
}

impl Technology {
    /// All technologies, in a stable order.
    pub const ALL: [Technology; 2] = [Technology::Agriculture, Technology::Engineering];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Technology::Agriculture => "agriculture",
            Technology::Engineering => "engineering",
        }
    }
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agriculture" => Ok(Technology::Agriculture),
            "engineering" => Ok(Technology::Engineering),
            other => Err(format!("unknown technology '{other}'")),
        }
    }
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a nation. Eliminated nations are frozen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NationStatus {
    /// Still in the game.
    #[default]
    Active,
    /// Lost its capital or collapsed.
    Eliminated,
}

/// A playable faction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nation {
    /// Nation name (the key).
    pub name: NationId,
    /// Treasury, never negative.
    pub resources: i64,
    /// Stability in `[0, 100]`.
    pub stability: i64,
    /// Controlling player, if claimed.
    pub owner: Option<PlayerId>,
    /// Lifecycle status.
    pub status: NationStatus,
    /// Technology levels; missing entries are level 0.
    pub technologies: OrdMap<Technology, u32>,
}

impl Nation {
    /// Create an unclaimed, active nation with no technology.
    #[must_use]
    pub fn new(name: impl Into<NationId>, resources: i64, stability: i64) -> Self {
        Self {
            name: name.into(),
            resources: resources.max(0),
            stability: clamp_score(stability),
            owner: None,
            status: NationStatus::Active,
            technologies: OrdMap::new(),
        }
    }

    /// Level of a technology (0 if never researched).
    #[must_use]
    pub fn tech_level(&self, tech: Technology) -> u32 {
        self.technologies.get(&tech).copied().unwrap_or(0)
    }

    /// Set a technology level (builder pattern).
    #[must_use]
    pub fn with_tech(mut self, tech: Technology, level: u32) -> Self {
        self.technologies.insert(tech, level);
        self
    }

    /// Check if the nation is still in the game.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == NationStatus::Active
    }
}

/// An atomic map unit with a garrison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    /// Territory key.
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// Owning nation, `None` if unclaimed or released by a collapse.
    pub owner: Option<NationId>,
    /// Garrison size, never negative.
    pub army: i64,
    /// Losing a capital eliminates its nation.
    pub is_capital: bool,
    /// Adjacent territories. Small in practice, so kept inline.
    pub neighbors: SmallVec<[TerritoryId; 6]>,
}

impl Territory {
    /// Create an unowned territory with no garrison.
    #[must_use]
    pub fn new(id: impl Into<TerritoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: None,
            army: 0,
            is_capital: false,
            neighbors: SmallVec::new(),
        }
    }

    /// Check adjacency.
    #[must_use]
    pub fn is_adjacent(&self, other: &TerritoryId) -> bool {
        self.neighbors.contains(other)
    }

    /// Check ownership by a nation.
    #[must_use]
    pub fn is_owned_by(&self, nation: &NationId) -> bool {
        self.owner.as_ref() == Some(nation)
    }
}

/// Lifecycle of a player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Still taking turns.
    #[default]
    Playing,
    /// Their nation was eliminated.
    Eliminated,
}

/// A participant, bound 1:1 to a nation once joined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player key.
    pub uid: PlayerId,
    /// Chosen nation.
    pub nation: Option<NationId>,
    /// Signalled end of turn.
    pub is_turn_ready: bool,
    /// Lifecycle status.
    pub status: PlayerStatus,
    /// Last heartbeat, milliseconds since the Unix epoch.
    pub last_active: u64,
}

impl Player {
    /// Create a playing player bound to a nation.
    #[must_use]
    pub fn new(uid: impl Into<PlayerId>, nation: Option<NationId>, now: u64) -> Self {
        Self {
            uid: uid.into(),
            nation,
            is_turn_ready: false,
            status: PlayerStatus::Playing,
            last_active: now,
        }
    }

    /// Check if the player still takes turns.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.status == PlayerStatus::Playing
    }
}

/// An advisor's area of responsibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Portfolio {
    /// Armies and borders.
    Defense,
    /// Treasury.
    Finance,
    /// Foreign relations.
    Diplomacy,
    /// Espionage and research.
    Intelligence,
}

impl Portfolio {
    /// All portfolios; every player gets one advisor per entry.
    pub const ALL: [Portfolio; 4] = [
        Portfolio::Defense,
        Portfolio::Finance,
        Portfolio::Diplomacy,
        Portfolio::Intelligence,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Portfolio::Defense => "defense",
            Portfolio::Finance => "finance",
            Portfolio::Diplomacy => "diplomacy",
            Portfolio::Intelligence => "intelligence",
        }
    }
}

impl std::fmt::Display for Portfolio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key of an advisor: one per (player, portfolio).
pub type AdvisorKey = (PlayerId, Portfolio);

/// A per-portfolio advisor. Created at join and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisor {
    /// Player served.
    pub player: PlayerId,
    /// Area of responsibility.
    pub portfolio: Portfolio,
    /// Loyalty in `[0, 100]`.
    pub loyalty: i64,
}

impl Advisor {
    /// Create an advisor with clamped loyalty.
    #[must_use]
    pub fn new(player: PlayerId, portfolio: Portfolio, loyalty: i64) -> Self {
        Self {
            player,
            portfolio,
            loyalty: clamp_score(loyalty),
        }
    }

    /// Map key for this advisor.
    #[must_use]
    pub fn key(&self) -> AdvisorKey {
        (self.player.clone(), self.portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technology_parse() {
        assert_eq!("Engineering".parse::<Technology>(), Ok(Technology::Engineering));
        assert_eq!(" agriculture ".parse::<Technology>(), Ok(Technology::Agriculture));
        assert!("alchemy".parse::<Technology>().is_err());
    }

    #[test]
    fn test_nation_new_clamps() {
        let nation = Nation::new("Avalon", -5, 140);
        assert_eq!(nation.resources, 0);
        assert_eq!(nation.stability, 100);
        assert!(nation.is_active());
        assert_eq!(nation.tech_level(Technology::Engineering), 0);
    }

    #[test]
    fn test_nation_with_tech() {
        let nation = Nation::new("Avalon", 100, 50).with_tech(Technology::Agriculture, 2);
        assert_eq!(nation.tech_level(Technology::Agriculture), 2);
        assert_eq!(nation.tech_level(Technology::Engineering), 0);
    }

    #[test]
    fn test_territory_adjacency() {
        let mut territory = Territory::new("t1", "Northmarch");
        territory.neighbors.push(TerritoryId::new("t2"));

        assert!(territory.is_adjacent(&TerritoryId::new("t2")));
        assert!(!territory.is_adjacent(&TerritoryId::new("t3")));
    }

    #[test]
    fn test_portfolio_serde_names() {
        let json = serde_json::to_string(&Portfolio::Intelligence).unwrap();
        assert_eq!(json, "\"intelligence\"");
    }

    #[test]
    fn test_advisor_loyalty_clamped() {
        let advisor = Advisor::new(PlayerId::new("p1"), Portfolio::Defense, -10);
        assert_eq!(advisor.loyalty, 0);
        assert_eq!(advisor.key(), (PlayerId::new("p1"), Portfolio::Defense));
    }
}
