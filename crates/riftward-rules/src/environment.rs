//! Per-turn environmental drift.

use riftward_core::rng::DeterministicRng;
use riftward_core::state::{MetricChange, metric};
use riftward_metrics::MetricManager;

/// Cause recorded on every environmental metric change.
pub const ENVIRONMENT_CAUSE: &str = "environment";

/// Applies resource upkeep, knowledge gain, morale drift and corruption
/// creep. Draws are taken in a fixed order so the same RNG stream always
/// yields the same magnitudes.
pub(crate) fn apply_environment(
    metrics: &mut MetricManager<'_>,
    rng: &mut dyn DeterministicRng,
) -> Vec<MetricChange> {
    let mut changes = Vec::with_capacity(4);

    let upkeep = i64::from(rng.next_u32_range(1, 3));
    changes.push(metrics.adjust_metric(metric::RESOURCES, -upkeep, ENVIRONMENT_CAUSE));

    let study = i64::from(rng.next_u32_range(0, 2));
    changes.push(metrics.adjust_metric(metric::KNOWLEDGE, study, ENVIRONMENT_CAUSE));

    let morale = if metrics.value(metric::CORRUPTION) > 50 {
        -i64::from(rng.next_u32_range(1, 2))
    } else {
        i64::from(rng.next_u32_range(0, 1))
    };
    changes.push(metrics.adjust_metric(metric::MORALE, morale, ENVIRONMENT_CAUSE));

    if metrics.value(metric::GLITCH) > 50 {
        changes.push(metrics.adjust_metric(metric::CORRUPTION, 1, ENVIRONMENT_CAUSE));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftward_core::rng::SeededRng;
    use riftward_core::state::MetricSet;
    use riftward_metrics::MetricPolicy;
    use riftward_test_support::SequenceRng;

    fn set(corruption: i64, glitch: i64) -> MetricSet {
        MetricSet::from_values([
            (metric::MORALE, 60),
            (metric::RESOURCES, 60),
            (metric::KNOWLEDGE, 40),
            (metric::CORRUPTION, corruption),
            (metric::GLITCH, glitch),
        ])
    }

    #[test]
    fn test_calm_environment() {
        let policy = MetricPolicy::default();
        let mut values = set(10, 5);
        let mut rng = SequenceRng::new(vec![2, 1, 1]);

        let changes = apply_environment(&mut MetricManager::new(&policy, &mut values), &mut rng);

        assert_eq!(changes.len(), 3);
        assert_eq!(rng.drawn(), 3);
        assert_eq!(values.get(metric::RESOURCES), 58);
        assert_eq!(values.get(metric::KNOWLEDGE), 41);
        assert_eq!(values.get(metric::MORALE), 61);
        assert!(changes.iter().all(|change| change.cause == ENVIRONMENT_CAUSE));
    }

    #[test]
    fn test_corrupted_glitching_environment() {
        let policy = MetricPolicy::default();
        let mut values = set(60, 70);
        let mut rng = SequenceRng::new(vec![3, 0, 2]);

        let changes = apply_environment(&mut MetricManager::new(&policy, &mut values), &mut rng);

        assert_eq!(changes.len(), 4);
        assert_eq!(values.get(metric::RESOURCES), 57);
        assert_eq!(values.get(metric::MORALE), 58);
        assert_eq!(values.get(metric::CORRUPTION), 61);
    }

    #[test]
    fn test_same_seed_yields_same_magnitudes() {
        let policy = MetricPolicy::default();
        let mut first = set(10, 5);
        let mut second = set(10, 5);

        apply_environment(
            &mut MetricManager::new(&policy, &mut first),
            &mut SeededRng::for_turn(7, 3),
        );
        apply_environment(
            &mut MetricManager::new(&policy, &mut second),
            &mut SeededRng::for_turn(7, 3),
        );

        assert_eq!(first, second);
    }
}
