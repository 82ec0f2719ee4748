//! Deterministic effect application and per-turn bookkeeping.

use std::collections::BTreeMap;

use riftward_core::state::GameState;
use tracing::debug;

use crate::reaction::{Effects, ItemChange};

const TRUST_MIN: i64 = -5;
const TRUST_MAX: i64 = 5;
const TRAIT_MIN: i64 = 0;
const TRAIT_MAX: i64 = 100;

/// What applying one reaction's effects changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedEffects {
    /// Flags that were not set before.
    pub new_flags: Vec<String>,
    /// Newly-set flags that counted as major events.
    pub major_events: Vec<String>,
}

/// Applies `effects` proposed by `character` during turn `turn`.
pub(crate) fn apply(
    state: &mut GameState,
    turn: u32,
    character: &str,
    effects: &Effects,
    major_event_prefix: &str,
) -> AppliedEffects {
    let mut applied = AppliedEffects::default();

    if effects.trust_delta != 0 {
        let trust = state.npc_trust.entry(character.to_owned()).or_insert(0);
        *trust = (*trust + effects.trust_delta).clamp(TRUST_MIN, TRUST_MAX);
    }

    if effects.logic_delta != 0 || effects.emotion_delta != 0 {
        let traits = state.characters.entry(character.to_owned()).or_default();
        traits.logic = (traits.logic + effects.logic_delta).clamp(TRAIT_MIN, TRAIT_MAX);
        traits.emotion = (traits.emotion + effects.emotion_delta).clamp(TRAIT_MIN, TRAIT_MAX);
    }

    for flag in &effects.flag_set {
        if state.flags.insert(flag.clone()) {
            applied.new_flags.push(flag.clone());
            if !major_event_prefix.is_empty() && flag.starts_with(major_event_prefix) {
                state.major_event_count += 1;
                state.last_major_event_turn = Some(turn);
                applied.major_events.push(flag.clone());
            }
        }
    }

    if let Some(change) = &effects.item_change {
        move_item(state, change);
    }

    if let Some(status) = &effects.status_change {
        if !state.status_effects.contains(status) {
            state.status_effects.push(status.clone());
        }
    }

    state.relationship_summary = relationship_summary(&state.npc_trust);
    debug!(
        character,
        new_flags = applied.new_flags.len(),
        "effects applied"
    );
    applied
}

/// Adds or removes one item id in a container. Adding an item already held,
/// or removing one that is absent, is a no-op. Returns whether anything
/// changed.
pub fn move_item(state: &mut GameState, change: &ItemChange) -> bool {
    let container = state.inventory.entry(change.target.clone()).or_default();
    let held = container.iter().position(|item| *item == change.item);
    match (change.is_add(), held) {
        (true, None) => {
            container.push(change.item.clone());
            true
        }
        (false, Some(index)) => {
            container.remove(index);
            true
        }
        _ => false,
    }
}

/// Decrements every status duration and drops those at or below zero.
pub(crate) fn tick_status_effects(state: &mut GameState) -> usize {
    for effect in &mut state.status_effects {
        effect.duration -= 1;
    }
    let before = state.status_effects.len();
    state.status_effects.retain(|effect| effect.duration > 0);
    before - state.status_effects.len()
}

/// Relationship tier for a trust value.
#[must_use]
pub fn trust_tier(trust: i64) -> &'static str {
    match trust {
        i64::MIN..=-3 => "hostile",
        -2..=-1 => "wary",
        0 => "neutral",
        1..=2 => "friendly",
        _ => "devoted",
    }
}

/// `"<name>: <tier>"` for every character, comma-joined in name order.
#[must_use]
pub fn relationship_summary(trust: &BTreeMap<String, i64>) -> String {
    trust
        .iter()
        .map(|(name, value)| format!("{name}: {}", trust_tier(*value)))
        .collect::<Vec<_>>()
        .join(", ")
}
