//! Win/loss evaluation.
//!
//! Rules are checked in priority order and the first match decides the
//! verdict. Victories are checked before defeats so a session that meets a
//! win condition on the same turn it crosses a loss threshold still wins.

use std::collections::BTreeMap;

use riftward_core::state::{WinLoss, WinLossStatus, metric};
use serde::{Deserialize, Serialize};

/// Thresholds for every win and loss rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinLossRules {
    /// Turn from which the survival win can trigger.
    pub survival_turn: u32,
    /// Minimum morale for the survival win.
    pub survival_morale: i64,
    /// Minimum order for the survival win.
    pub survival_order: i64,
    /// Minimum resources for the survival win.
    pub survival_resources: i64,
    /// Minimum morale for the harmony win.
    pub harmony_morale: i64,
    /// Maximum corruption for the harmony win.
    pub harmony_max_corruption: i64,
    /// Morale at or below this loses.
    pub morale_crash: i64,
    /// Resources at or below this lose.
    pub resource_depletion: i64,
    /// Order at or below this loses.
    pub order_collapse: i64,
    /// Glitch at or above this loses.
    pub glitch_overload: i64,
    /// Reaching this turn without a win loses.
    pub turn_limit: u32,
    /// This many major events lose.
    pub max_major_events: u32,
}

impl Default for WinLossRules {
    fn default() -> Self {
        Self {
            survival_turn: 12,
            survival_morale: 50,
            survival_order: 50,
            survival_resources: 30,
            harmony_morale: 80,
            harmony_max_corruption: 5,
            morale_crash: 10,
            resource_depletion: 0,
            order_collapse: 10,
            glitch_overload: 90,
            turn_limit: 20,
            max_major_events: 3,
        }
    }
}

impl WinLossRules {
    /// Evaluates the rule list over a metrics snapshot. Absent metrics read
    /// as `0`.
    #[must_use]
    pub fn evaluate(
        &self,
        metrics: &BTreeMap<String, i64>,
        turn: u32,
        major_events: u32,
    ) -> WinLoss {
        let get = |name: &str| metrics.get(name).copied().unwrap_or(0);
        let morale = get(metric::MORALE);
        let order = get(metric::ORDER);
        let resources = get(metric::RESOURCES);
        let corruption = get(metric::CORRUPTION);
        let glitch = get(metric::GLITCH);

        let rules = [
            (
                turn >= self.survival_turn
                    && morale >= self.survival_morale
                    && order >= self.survival_order
                    && resources >= self.survival_resources,
                WinLossStatus::Win,
                "survival_threshold_reached",
            ),
            (
                morale >= self.harmony_morale && corruption <= self.harmony_max_corruption,
                WinLossStatus::Win,
                "perfect_harmony",
            ),
            (
                morale <= self.morale_crash,
                WinLossStatus::Loss,
                "morale_crash",
            ),
            (
                resources <= self.resource_depletion,
                WinLossStatus::Loss,
                "resource_depletion",
            ),
            (
                order <= self.order_collapse,
                WinLossStatus::Loss,
                "order_collapse",
            ),
            (
                glitch >= self.glitch_overload,
                WinLossStatus::Loss,
                "glitch_overload",
            ),
            (
                turn >= self.turn_limit,
                WinLossStatus::Loss,
                "turn_limit_exceeded",
            ),
            (
                major_events >= self.max_major_events,
                WinLossStatus::Loss,
                "repeated_major_events",
            ),
        ];

        rules
            .into_iter()
            .find(|(matched, _, _)| *matched)
            .map_or_else(WinLoss::ongoing, |(_, status, reason)| WinLoss {
                status,
                reason: reason.to_owned(),
            })
    }
}
