//! Phase D: resource production and recovery.

use tracing::debug;

use crate::core::{Event, EventKind, Nation, RulesConfig, Snapshot, Technology};

/// Production breakdown for one nation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Yield {
    /// Per-territory production, never below the minimum.
    pub base: i64,
    /// Agriculture bonus on top of `base`.
    pub bonus: i64,
    /// Recovery payment for a treasury below the recovery threshold.
    pub subsidy: i64,
    /// Resources after production, before the cap.
    pub uncapped: i64,
    /// Treasury ceiling at the nation's agriculture level.
    pub cap: i64,
}

impl Yield {
    /// Resources after the cap.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.uncapped.min(self.cap)
    }

    /// Check if the cap cut production.
    #[must_use]
    pub fn is_capped(&self) -> bool {
        self.uncapped > self.cap
    }
}

/// Compute a nation's yield for the turn.
///
/// The subsidy is based on the treasury before production.
#[must_use]
pub fn compute_yield(config: &RulesConfig, nation: &Nation, territory_count: usize) -> Yield {
    let agriculture = nation.tech_level(Technology::Agriculture);
    let count = i64::try_from(territory_count).unwrap_or(i64::MAX);

    let base = count
        .saturating_mul(config.production_per_territory)
        .max(config.production_minimum);
    let per_level = config.agriculture_effect_per_level + config.tech_fixed_increment;
    let bonus = (base as f64 * f64::from(agriculture) * per_level).floor() as i64;
    let subsidy = if nation.resources < config.recovery_threshold {
        ((config.recovery_threshold - nation.resources) as f64 * config.recovery_rate).floor() as i64
    } else {
        0
    };

    Yield {
        base,
        bonus,
        subsidy,
        uncapped: nation.resources + base + bonus + subsidy,
        cap: config.resource_cap(agriculture),
    }
}

/// Produce resources for every active nation.
pub fn run(state: &mut Snapshot, config: &RulesConfig) {
    let turn = state.turn;
    let yields: Vec<_> = state
        .nations
        .values()
        .filter(|n| n.is_active())
        .map(|n| (n.name.clone(), compute_yield(config, n, state.territory_count(&n.name))))
        .collect();

    for (name, y) in yields {
        let Some(nation) = state.nations.get_mut(&name) else {
            continue;
        };
        nation.resources = y.total();
        debug!(nation = %name, base = y.base, bonus = y.bonus, subsidy = y.subsidy, total = y.total(), "production");

        state.push_event(
            Event::new(
                turn,
                EventKind::Production,
                format!("{name} produced {} resources", y.base + y.bonus),
            )
            .about(name.clone()),
        );
        if y.subsidy > 0 {
            state.push_event(
                Event::new(
                    turn,
                    EventKind::RecoverySubsidy,
                    format!("{name} received a recovery subsidy of {}", y.subsidy),
                )
                .about(name.clone()),
            );
        }
        if y.is_capped() {
            state.push_event(
                Event::new(
                    turn,
                    EventKind::ResourceCap,
                    format!("{name}'s treasury is full; {} resources were lost", y.uncapped - y.cap),
                )
                .about(name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NationId, NationStatus};

    #[test]
    fn test_poor_nation_with_two_territories() {
        let config = RulesConfig::default();
        let y = compute_yield(&config, &Nation::new("Avalon", 50, 50), 2);

        assert_eq!(y.base, 150);
        assert_eq!(y.bonus, 0);
        assert_eq!(y.subsidy, 25);
        assert_eq!(y.total(), 225);
    }

    #[test]
    fn test_minimum_production() {
        let config = RulesConfig::default();
        let y = compute_yield(&config, &Nation::new("Avalon", 500, 50), 1);
        assert_eq!(y.base, 100);
        assert_eq!(y.subsidy, 0);
    }

    #[test]
    fn test_agriculture_bonus_and_cap() {
        let config = RulesConfig::default();
        let nation = Nation::new("Avalon", 2400, 50).with_tech(Technology::Agriculture, 1);
        let y = compute_yield(&config, &nation, 4);

        // base 300, bonus floor(300 * 0.15) = 45
        assert_eq!(y.base, 300);
        assert_eq!(y.bonus, 45);
        assert_eq!(y.cap, 2500);
        assert!(y.is_capped());
        assert_eq!(y.total(), 2500);
    }

    #[test]
    fn test_run_skips_eliminated_and_logs() {
        let mut s = Snapshot::new(1);
        s.nations.insert(NationId::new("Avalon"), Nation::new("Avalon", 1990, 50));
        let mut gone = Nation::new("Brigant", 10, 50);
        gone.status = NationStatus::Eliminated;
        s.nations.insert(NationId::new("Brigant"), gone);

        run(&mut s, &RulesConfig::default());

        assert_eq!(s.nation(&NationId::new("Avalon")).unwrap().resources, 2000);
        assert_eq!(s.nation(&NationId::new("Brigant")).unwrap().resources, 10);
        assert!(s.events.iter().any(|e| e.kind == EventKind::ResourceCap));
        assert!(!s.events.iter().any(|e| e.kind == EventKind::RecoverySubsidy));
    }
}
