//! Metric adjustment over a borrowed [`MetricSet`].

use std::collections::BTreeMap;

use riftward_core::state::{MetricChange, MetricSet, metric};
use tracing::debug;

use crate::policy::MetricPolicy;

/// Applies bounded adjustments to a metric set and logs every change.
///
/// The manager borrows the metrics it works on, so it is created for the
/// span of one turn over the turn's working copy of the state.
#[derive(Debug)]
pub struct MetricManager<'a> {
    policy: &'a MetricPolicy,
    metrics: &'a mut MetricSet,
}

impl<'a> MetricManager<'a> {
    /// Wraps `metrics` with `policy`.
    pub fn new(policy: &'a MetricPolicy, metrics: &'a mut MetricSet) -> Self {
        Self { policy, metrics }
    }

    /// Copy of the tracked metrics, optionally including internal ones.
    #[must_use]
    pub fn snapshot(&self, include_internal: bool) -> BTreeMap<String, i64> {
        self.metrics
            .values
            .iter()
            .filter(|(name, _)| include_internal || !self.policy.is_internal(name))
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    /// Current value of `name`, `0` when the metric is not tracked.
    #[must_use]
    pub fn value(&self, name: &str) -> i64 {
        self.metrics.get(name)
    }

    /// Glitch delta still waiting to be applied.
    #[must_use]
    pub fn glitch_carry(&self) -> i64 {
        self.metrics.glitch_carry
    }

    /// The change log accumulated so far.
    #[must_use]
    pub fn log(&self) -> &[MetricChange] {
        &self.metrics.log
    }

    /// Adjusts `name` by `delta`, clamping to its bounds.
    ///
    /// For `glitch` the delta is first combined with the carry-over buffer,
    /// then limited to what is left of the turn's step cap once earlier
    /// adjustments in the same turn are counted. Whatever does not fit stays
    /// in the buffer until [`MetricSet::close_turn`] opens a new budget.
    pub fn adjust_metric(&mut self, name: &str, delta: i64, cause: &str) -> MetricChange {
        let bounds = self.policy.bounds_for(name);
        let current = self.value(name);
        let is_glitch = name == metric::GLITCH;

        let step = if is_glitch {
            let combined = delta.saturating_add(self.metrics.glitch_carry);
            let cap = self.policy.glitch_step();
            let moved = self.metrics.glitch_moved;
            let step = combined.clamp(
                cap.saturating_neg().saturating_sub(moved),
                cap.saturating_sub(moved),
            );
            self.metrics.glitch_carry = combined - step;
            step
        } else {
            delta
        };

        let value = bounds.clamp(current.saturating_add(step));
        self.metrics.values.insert(name.to_owned(), value);
        if is_glitch {
            self.metrics.glitch_moved += value - current;
        }

        let change = MetricChange {
            name: name.to_owned(),
            delta: value - current,
            value,
            cause: cause.to_owned(),
        };
        debug!(
            metric = name,
            requested = delta,
            applied = change.delta,
            value,
            carry = self.metrics.glitch_carry,
            cause,
            "metric adjusted"
        );
        self.metrics.log.push(change.clone());
        change
    }

    /// Re-clamps every tracked metric to its current bounds, logging any
    /// value that moved.
    pub fn enforce_bounds(&mut self, cause: &str) {
        let names: Vec<String> = self.metrics.values.keys().cloned().collect();
        for name in names {
            let current = self.value(&name);
            let clamped = self.policy.bounds_for(&name).clamp(current);
            if clamped != current {
                self.metrics.values.insert(name.clone(), clamped);
                self.metrics.log.push(MetricChange {
                    name,
                    delta: clamped - current,
                    value: clamped,
                    cause: cause.to_owned(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{MetricBounds, Volatility};

    fn metrics() -> MetricSet {
        MetricSet::from_values([(metric::MORALE, 50), (metric::GLITCH, 20)])
    }

    #[test]
    fn test_adjust_clamps_to_upper_bound() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        let change = manager.adjust_metric(metric::MORALE, 999, "test");

        assert_eq!(change.value, 100);
        assert_eq!(change.delta, 50);
        assert_eq!(manager.value(metric::MORALE), 100);
    }

    #[test]
    fn test_adjust_clamps_to_lower_bound() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        let change = manager.adjust_metric(metric::MORALE, -80, "test");

        assert_eq!(change.value, 0);
        assert_eq!(change.delta, -50);
    }

    #[test]
    fn test_glitch_step_is_capped_and_remainder_carried() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        let first = manager.adjust_metric(metric::GLITCH, 50, "anomaly");
        assert_eq!(first.delta, 10);
        assert_eq!(first.value, 30);
        assert_eq!(manager.glitch_carry(), 40);

        assert_eq!(set.glitch_moved, 10);
        set.close_turn();
        let mut manager = MetricManager::new(&policy, &mut set);

        let second = manager.adjust_metric(metric::GLITCH, 0, "carry");
        assert_eq!(second.delta, 10);
        assert_eq!(second.value, 40);
        assert_eq!(manager.glitch_carry(), 30);
    }

    #[test]
    fn test_glitch_cap_spans_every_adjustment_in_a_turn() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        set.glitch_carry = 40;
        let mut manager = MetricManager::new(&policy, &mut set);

        let first = manager.adjust_metric(metric::GLITCH, 1, "penalty");
        let second = manager.adjust_metric(metric::GLITCH, 1, "penalty");
        let third = manager.adjust_metric(metric::GLITCH, 15, "anomaly");

        assert_eq!(first.delta, 10);
        assert_eq!(second.delta, 0);
        assert_eq!(third.delta, 0);
        assert_eq!(manager.value(metric::GLITCH), 30);
        assert_eq!(manager.glitch_carry(), 47);
    }

    #[test]
    fn test_opposite_adjustments_share_the_turn_budget() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        manager.adjust_metric(metric::GLITCH, 10, "surge");
        let calm = manager.adjust_metric(metric::GLITCH, -25, "calm");

        assert_eq!(calm.delta, -20);
        assert_eq!(manager.value(metric::GLITCH), 10);
        assert_eq!(manager.glitch_carry(), -5);
    }

    #[test]
    fn test_negative_delta_cancels_positive_carry() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        set.glitch_carry = 15;
        let mut manager = MetricManager::new(&policy, &mut set);

        let change = manager.adjust_metric(metric::GLITCH, -15, "stabilized");

        assert_eq!(change.delta, 0);
        assert_eq!(manager.glitch_carry(), 0);
    }

    #[test]
    fn test_high_volatility_uses_larger_step_and_raised_floor() {
        let policy = MetricPolicy {
            volatility: Volatility::High,
            ..MetricPolicy::default()
        };
        let mut set = MetricSet::from_values([(metric::GLITCH, 12)]);
        let mut manager = MetricManager::new(&policy, &mut set);

        let up = manager.adjust_metric(metric::GLITCH, 30, "surge");
        assert_eq!(up.delta, 20);
        assert_eq!(manager.glitch_carry(), 10);

        assert_eq!(up.value, 32);

        let mut low = MetricSet::from_values([(metric::GLITCH, 12)]);
        let mut manager = MetricManager::new(&policy, &mut low);
        let down = manager.adjust_metric(metric::GLITCH, -15, "purge");
        assert_eq!(down.value, 10);
        assert_eq!(down.delta, -2);
    }

    #[test]
    fn test_non_glitch_metrics_are_not_step_capped() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        let change = manager.adjust_metric(metric::MORALE, 40, "festival");

        assert_eq!(change.delta, 40);
        assert_eq!(manager.glitch_carry(), 0);
    }

    #[test]
    fn test_every_adjustment_is_logged_in_order() {
        let policy = MetricPolicy::default();
        let mut set = metrics();
        let mut manager = MetricManager::new(&policy, &mut set);

        manager.adjust_metric(metric::MORALE, -5, "a");
        manager.adjust_metric(metric::GLITCH, 3, "b");

        let log = manager.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].cause, "a");
        assert_eq!(log[0].value, 45);
        assert_eq!(log[1].name, metric::GLITCH);
        assert_eq!(log[1].value, 23);
    }

    #[test]
    fn test_snapshot_hides_internal_metrics() {
        let mut policy = MetricPolicy::default();
        policy.internal.insert("legacy_stability".to_owned());
        let mut set = metrics();
        set.values.insert("legacy_stability".to_owned(), 7);
        set.values.insert("_shadow".to_owned(), 1);
        let manager = MetricManager::new(&policy, &mut set);

        let public = manager.snapshot(false);
        assert_eq!(public.len(), 2);
        assert!(!public.contains_key("legacy_stability"));

        let all = manager.snapshot(true);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_value_of_untracked_metric_is_zero() {
        let policy = MetricPolicy::default();
        let mut set = MetricSet::default();
        let manager = MetricManager::new(&policy, &mut set);
        assert_eq!(manager.value("anything"), 0);
    }

    #[test]
    fn test_enforce_bounds_pulls_values_back_in_range() {
        let mut policy = MetricPolicy::default();
        policy
            .bounds
            .insert(metric::ORDER.to_owned(), MetricBounds::new(0, 50));
        let mut set = MetricSet::from_values([(metric::ORDER, 80), (metric::MORALE, 40)]);
        let mut manager = MetricManager::new(&policy, &mut set);

        manager.enforce_bounds("recompute");

        assert_eq!(manager.value(metric::ORDER), 50);
        assert_eq!(manager.value(metric::MORALE), 40);
        assert_eq!(manager.log().len(), 1);
    }
}
