//! Rules configuration.
//!
//! Every tunable number of the rules lives in [`RulesConfig`]. The engine
//! never hardcodes a balance constant; commands and phases read them from
//! here. `RulesConfig::default()` is the standard rule set.
//!
//! Configs are serde-enabled, and missing fields fall back to defaults, so a
//! host can ship a partial JSON override:
//!
//! ```
//! use nation_turns::core::RulesConfig;
//!
//! let config = RulesConfig::from_json(r#"{ "dynamic_event_probability": 0.0 }"#).unwrap();
//! assert_eq!(config.dynamic_event_probability, 0.0);
//! assert_eq!(config.production_per_territory, 75);
//! ```

use serde::{Deserialize, Serialize};

use super::entity::Portfolio;

/// Which command a loyalty delta row applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Queue an attack.
    Attack,
    /// Raise troops at the capital.
    BuildMilitary,
    /// Research a technology.
    Research,
    /// Move troops between owned territories.
    MoveTroops,
}

/// Per-command advisor loyalty changes.
///
/// Each row is `(portfolio, delta)`; portfolios not listed are unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyDeltas {
    /// Applied when an attack is queued.
    pub attack: Vec<(Portfolio, i64)>,
    /// Applied when troops are raised.
    pub build_military: Vec<(Portfolio, i64)>,
    /// Applied when research completes.
    pub research: Vec<(Portfolio, i64)>,
    /// Applied when troops are moved.
    pub move_troops: Vec<(Portfolio, i64)>,
}

impl Default for LoyaltyDeltas {
    fn default() -> Self {
        use Portfolio::{Defense, Diplomacy, Finance, Intelligence};

        Self {
            attack: vec![(Defense, 5), (Diplomacy, -5), (Finance, -2)],
            build_military: vec![(Defense, 3), (Finance, -1), (Diplomacy, -1)],
            research: vec![(Intelligence, 3), (Finance, -1)],
            move_troops: vec![(Defense, 1)],
        }
    }
}

impl LoyaltyDeltas {
    /// Delta rows for a command.
    #[must_use]
    pub fn for_command(&self, kind: CommandKind) -> &[(Portfolio, i64)] {
        match kind {
            CommandKind::Attack => &self.attack,
            CommandKind::BuildMilitary => &self.build_military,
            CommandKind::Research => &self.research,
            CommandKind::MoveTroops => &self.move_troops,
        }
    }
}

/// Complete rule set for a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    // === Setup ===
    /// Loyalty of a freshly appointed advisor.
    pub initial_loyalty: i64,

    // === Technology ===
    /// Research cost of level 1; level `n` costs `n` times this.
    pub research_base_cost: i64,
    /// Constant added to every per-level technology effect.
    pub tech_fixed_increment: f64,
    /// Military construction discount per engineering level.
    pub engineering_discount_per_level: f64,
    /// Combat bonus per engineering level (before the fixed increment).
    pub engineering_effect_per_level: f64,
    /// Production bonus per agriculture level (before the fixed increment).
    pub agriculture_effect_per_level: f64,

    // === Military ===
    /// Cost of one unit of army before discounts.
    pub unit_cost: i64,
    /// Defender bonus for holding ground.
    pub terrain_defense_bonus: f64,
    /// Additional defender bonus at a capital.
    pub capital_defense_bonus: f64,
    /// Width of the uniform power roll, `U(1, 1 + variance)`.
    pub combat_variance: f64,
    /// Multiplier on the attacker's loss rate.
    pub attacker_loss_factor: f64,
    /// Multiplier on the defender's loss rate.
    pub defender_loss_factor: f64,
    /// Lower clamp of any loss rate.
    pub loss_rate_min: f64,
    /// Upper clamp of any loss rate.
    pub loss_rate_max: f64,
    /// Share of surviving attackers that garrison a captured territory.
    pub capture_garrison_fraction: f64,
    /// Share of each garrison kept when an eliminated nation is absorbed.
    pub cascade_garrison_fraction: f64,

    // === Betrayal and external events ===
    /// Advisors below this loyalty may betray.
    pub betrayal_loyalty_threshold: i64,
    /// Chance per disloyal advisor per turn.
    pub betrayal_probability: f64,
    /// Share of resources lost to a betrayal.
    pub betrayal_loss_fraction: f64,
    /// Chance per turn of requesting a dynamic external event.
    pub dynamic_event_probability: f64,

    // === Economy ===
    /// Production per owned territory.
    pub production_per_territory: i64,
    /// Production floor regardless of territory count.
    pub production_minimum: i64,
    /// Treasuries below this receive a recovery subsidy.
    pub recovery_threshold: i64,
    /// Share of the shortfall paid as subsidy.
    pub recovery_rate: f64,
    /// Resource cap before agriculture.
    pub resource_cap_base: i64,
    /// Resource cap added per agriculture level.
    pub resource_cap_per_agriculture: i64,

    // === Homeostasis ===
    /// Loyalty is topped up to at least this each turn.
    pub loyalty_floor: i64,
    /// Loyalty below this recovers gradually.
    pub loyalty_recovery_target: i64,
    /// Advisors below this loyalty count against stability.
    pub low_loyalty_threshold: i64,
    /// Nations above this stability give advisors an extra loyalty point.
    pub high_stability_threshold: i64,
    /// Stability penalty when resources are below `recovery_threshold`.
    pub poverty_stability_penalty: i64,
    /// Nations below this stability regain a point per turn.
    pub stability_rebound_threshold: i64,
    /// Stability at or below this (but above 0) triggers a private warning.
    pub stability_warning_threshold: i64,

    // === Coordination ===
    /// Host lease length in milliseconds.
    pub host_lease_ms: u64,
    /// Re-read-and-retry attempts after a lost commit race.
    pub conflict_retries: u32,

    /// Advisor loyalty deltas per command.
    pub loyalty_deltas: LoyaltyDeltas,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            initial_loyalty: 50,

            research_base_cost: 200,
            tech_fixed_increment: 0.05,
            engineering_discount_per_level: 0.15,
            engineering_effect_per_level: 0.10,
            agriculture_effect_per_level: 0.10,

            unit_cost: 10,
            terrain_defense_bonus: 0.10,
            capital_defense_bonus: 0.20,
            combat_variance: 0.10,
            attacker_loss_factor: 1.1,
            defender_loss_factor: 1.0,
            loss_rate_min: 0.10,
            loss_rate_max: 0.70,
            capture_garrison_fraction: 0.6,
            cascade_garrison_fraction: 0.3,

            betrayal_loyalty_threshold: 20,
            betrayal_probability: 1.0 / 3.0,
            betrayal_loss_fraction: 0.10,
            dynamic_event_probability: 0.25,

            production_per_territory: 75,
            production_minimum: 100,
            recovery_threshold: 100,
            recovery_rate: 0.5,
            resource_cap_base: 2000,
            resource_cap_per_agriculture: 500,

            loyalty_floor: 15,
            loyalty_recovery_target: 50,
            low_loyalty_threshold: 30,
            high_stability_threshold: 80,
            poverty_stability_penalty: 3,
            stability_rebound_threshold: 20,
            stability_warning_threshold: 10,

            host_lease_ms: 60_000,
            conflict_retries: 3,

            loyalty_deltas: LoyaltyDeltas::default(),
        }
    }
}

impl RulesConfig {
    /// Create the standard rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON rule set.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the dynamic event probability.
    #[must_use]
    pub fn with_dynamic_event_probability(mut self, probability: f64) -> Self {
        self.dynamic_event_probability = probability;
        self
    }

    /// Set the betrayal probability.
    #[must_use]
    pub fn with_betrayal_probability(mut self, probability: f64) -> Self {
        self.betrayal_probability = probability;
        self
    }

    /// Set the host lease length.
    #[must_use]
    pub fn with_host_lease_ms(mut self, lease_ms: u64) -> Self {
        self.host_lease_ms = lease_ms;
        self
    }

    /// Set the research base cost.
    #[must_use]
    pub fn with_research_base_cost(mut self, cost: i64) -> Self {
        self.research_base_cost = cost;
        self
    }

    /// Resource cap for a nation with the given agriculture level.
    #[must_use]
    pub fn resource_cap(&self, agriculture_level: u32) -> i64 {
        self.resource_cap_base + i64::from(agriculture_level) * self.resource_cap_per_agriculture
    }

    /// Clamp a loss rate into the configured band.
    #[must_use]
    pub fn clamp_loss_rate(&self, rate: f64) -> f64 {
        rate.clamp(self.loss_rate_min, self.loss_rate_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attack_deltas() {
        let config = RulesConfig::default();
        let attack = config.loyalty_deltas.for_command(CommandKind::Attack);

        assert!(attack.contains(&(Portfolio::Defense, 5)));
        assert!(attack.contains(&(Portfolio::Diplomacy, -5)));
        assert!(attack.contains(&(Portfolio::Finance, -2)));
    }

    #[test]
    fn test_resource_cap() {
        let config = RulesConfig::default();
        assert_eq!(config.resource_cap(0), 2000);
        assert_eq!(config.resource_cap(3), 3500);
    }

    #[test]
    fn test_clamp_loss_rate() {
        let config = RulesConfig::default();
        assert!((config.clamp_loss_rate(0.01) - 0.10).abs() < 1e-12);
        assert!((config.clamp_loss_rate(5.0) - 0.70).abs() < 1e-12);
        assert!((config.clamp_loss_rate(0.4) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_builder() {
        let config = RulesConfig::new()
            .with_dynamic_event_probability(1.0)
            .with_betrayal_probability(0.0)
            .with_host_lease_ms(5_000)
            .with_research_base_cost(50);

        assert!((config.dynamic_event_probability - 1.0).abs() < f64::EPSILON);
        assert!(config.betrayal_probability.abs() < f64::EPSILON);
        assert_eq!(config.host_lease_ms, 5_000);
        assert_eq!(config.research_base_cost, 50);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RulesConfig::default().with_host_lease_ms(1234);
        let json = serde_json::to_string(&config).unwrap();
        let back = RulesConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RulesConfig::from_json(r#"{ "loss_rate_max": 0.5 }"#).unwrap();
        assert!((config.loss_rate_max - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.loyalty_floor, 15);
        assert_eq!(config.loyalty_deltas, LoyaltyDeltas::default());
    }
}
