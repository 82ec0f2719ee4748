//! Metric bounds and volatility settings.

use std::collections::{BTreeMap, BTreeSet};

use riftward_core::state::metric;
use serde::{Deserialize, Serialize};

/// Inclusive clamp range for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricBounds {
    /// Lower bound.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
}

impl MetricBounds {
    /// Creates a bound pair.
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Clamps `value` into the range.
    #[must_use]
    pub fn clamp(self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }
}

impl Default for MetricBounds {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

/// How violently the glitch metric may swing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    /// Standard step cap, standard floor.
    #[default]
    Normal,
    /// Larger step cap and a raised glitch floor.
    High,
}

/// Bounds and smoothing settings for every metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricPolicy {
    /// Per-metric bounds; unknown metrics use `default_bounds`.
    pub bounds: BTreeMap<String, MetricBounds>,
    /// Bounds for metrics without an explicit entry.
    pub default_bounds: MetricBounds,
    /// Internal or legacy metrics hidden from public snapshots. Names
    /// starting with `_` are always internal.
    pub internal: BTreeSet<String>,
    /// Volatility mode.
    pub volatility: Volatility,
    /// Largest glitch change per adjustment in normal mode.
    pub glitch_step_cap: i64,
    /// Largest glitch change per adjustment in high-volatility mode.
    pub glitch_step_cap_high: i64,
    /// Glitch floor in high-volatility mode.
    pub glitch_floor_high: i64,
}

impl Default for MetricPolicy {
    fn default() -> Self {
        let bounds = [
            metric::MORALE,
            metric::ORDER,
            metric::RESOURCES,
            metric::KNOWLEDGE,
            metric::CORRUPTION,
            metric::GLITCH,
        ]
        .into_iter()
        .map(|name| (name.to_owned(), MetricBounds::new(0, 100)))
        .collect();

        Self {
            bounds,
            default_bounds: MetricBounds::default(),
            internal: BTreeSet::new(),
            volatility: Volatility::Normal,
            glitch_step_cap: 10,
            glitch_step_cap_high: 20,
            glitch_floor_high: 10,
        }
    }
}

impl MetricPolicy {
    /// Effective bounds for `name`, including the raised glitch floor.
    #[must_use]
    pub fn bounds_for(&self, name: &str) -> MetricBounds {
        let mut bounds = self.bounds.get(name).copied().unwrap_or(self.default_bounds);
        if name == metric::GLITCH && self.volatility == Volatility::High {
            bounds.min = bounds.min.max(self.glitch_floor_high).min(bounds.max);
        }
        bounds
    }

    /// Largest net glitch movement allowed in one turn.
    #[must_use]
    pub fn glitch_step(&self) -> i64 {
        match self.volatility {
            Volatility::Normal => self.glitch_step_cap,
            Volatility::High => self.glitch_step_cap_high,
        }
        .max(0)
    }

    /// Whether `name` is hidden from public snapshots.
    #[must_use]
    pub fn is_internal(&self, name: &str) -> bool {
        name.starts_with('_') || self.internal.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_metric_uses_default_bounds() {
        let policy = MetricPolicy::default();
        assert_eq!(policy.bounds_for("faith"), MetricBounds::new(0, 100));
    }

    #[test]
    fn test_high_volatility_raises_glitch_floor_and_step() {
        let policy = MetricPolicy {
            volatility: Volatility::High,
            ..MetricPolicy::default()
        };
        assert_eq!(policy.bounds_for(metric::GLITCH).min, 10);
        assert_eq!(policy.bounds_for(metric::MORALE).min, 0);
        assert_eq!(policy.glitch_step(), 20);
    }

    #[test]
    fn test_underscore_metrics_are_internal() {
        let mut policy = MetricPolicy::default();
        policy.internal.insert("legacy_stability".to_owned());
        assert!(policy.is_internal("_shadow"));
        assert!(policy.is_internal("legacy_stability"));
        assert!(!policy.is_internal(metric::ORDER));
    }

    #[test]
    fn test_policy_deserializes_with_partial_yaml() {
        let policy: MetricPolicy =
            serde_yaml::from_str("volatility: high\nglitch_step_cap_high: 25\n").unwrap();
        assert_eq!(policy.volatility, Volatility::High);
        assert_eq!(policy.glitch_step(), 25);
        assert_eq!(policy.glitch_floor_high, 10);
    }
}
