//! Tier 1: structural validation of generated reaction entries.
//!
//! A raw entry is converted once into a typed [`Reaction`]; anything that
//! does not parse is rejected here and never reaches effect application.

use riftward_core::error::StructuralValidationError;
use riftward_core::state::{PLAYER_CONTAINER, StatusEffect};
use serde::Serialize;
use serde_json::{Map, Value};

/// Moves one item into or out of a named container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemChange {
    /// Item identifier.
    pub item: String,
    /// `1` adds the item, `-1` removes it.
    pub delta: i64,
    /// Container name. `player` is the player's inventory.
    pub target: String,
}

impl ItemChange {
    /// Whether this change adds the item.
    #[must_use]
    pub fn is_add(&self) -> bool {
        self.delta > 0
    }
}

/// State changes a reaction proposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Effects {
    /// Change to the character's trust in the player.
    pub trust_delta: i64,
    /// Change to the character's logic trait.
    pub logic_delta: i64,
    /// Change to the character's emotion trait.
    pub emotion_delta: i64,
    /// Flags to raise.
    pub flag_set: Vec<String>,
    /// Item to move between containers.
    pub item_change: Option<ItemChange>,
    /// Status effect to attach.
    pub status_change: Option<StatusEffect>,
}

impl Effects {
    /// `true` when applying these effects would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trust_delta == 0
            && self.logic_delta == 0
            && self.emotion_delta == 0
            && self.flag_set.is_empty()
            && self.item_change.is_none()
            && self.status_change.is_none()
    }
}

/// A structurally valid character reaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reaction {
    /// Character name, trimmed.
    pub name: String,
    /// What the character is trying to achieve.
    pub intent: String,
    /// What the character visibly does.
    pub action: String,
    /// What the character says.
    pub speech: String,
    /// Proposed state changes, if any.
    pub effects: Option<Effects>,
    /// Safe-function payloads the reaction proposes; validated separately.
    #[serde(skip)]
    pub proposed_calls: Value,
}

impl Reaction {
    /// Whether the reaction would mutate state if applied, through its
    /// effects or through the safe functions it proposes.
    #[must_use]
    pub fn is_state_mutating(&self) -> bool {
        self.effects.as_ref().is_some_and(|effects| !effects.is_empty())
            || self.has_proposed_calls()
    }

    /// Whether the reaction carries any safe-function payload.
    #[must_use]
    pub fn has_proposed_calls(&self) -> bool {
        match &self.proposed_calls {
            Value::Null => false,
            Value::Array(calls) => !calls.is_empty(),
            Value::Object(call) => !call.is_empty(),
            _ => true,
        }
    }
}

/// Parses a generated reaction entry.
///
/// # Errors
///
/// Returns the first `StructuralValidationError` the entry violates.
pub fn parse_reaction(
    entry: &Value,
    max_speech_chars: usize,
) -> Result<Reaction, StructuralValidationError> {
    let object = entry
        .as_object()
        .ok_or(StructuralValidationError::NotAnObject)?;

    let name = required_text(object, "name")?;
    let intent = required_text(object, "intent")?;
    let action = required_text(object, "action")?;
    let speech = required_text(object, "speech")?;

    let length = speech.chars().count();
    if length > max_speech_chars {
        return Err(StructuralValidationError::SpeechTooLong {
            length,
            limit: max_speech_chars,
        });
    }

    let effects = match object.get("effects") {
        None | Some(Value::Null) => None,
        Some(Value::Object(raw)) => Some(parse_effects(raw)?),
        Some(_) => return Err(StructuralValidationError::EffectsNotAMapping),
    };

    Ok(Reaction {
        name: name.trim().to_owned(),
        intent,
        action,
        speech,
        effects,
        proposed_calls: object.get("function_calls").cloned().unwrap_or(Value::Null),
    })
}

fn required_text(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, StructuralValidationError> {
    match object.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        _ => Err(StructuralValidationError::MissingText(field)),
    }
}

fn optional_int(
    raw: &Map<String, Value>,
    field: &'static str,
) -> Result<i64, StructuralValidationError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .ok_or(StructuralValidationError::NotAnInteger(field)),
    }
}

fn parse_effects(raw: &Map<String, Value>) -> Result<Effects, StructuralValidationError> {
    let trust_delta = match raw.get("trust_delta") {
        None | Some(Value::Null) => 0,
        Some(value) => match value.as_i64() {
            Some(delta @ -1..=1) => delta,
            _ => return Err(StructuralValidationError::TrustDeltaOutOfRange),
        },
    };

    let flag_set = match raw.get("flag_set") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.as_str().map(str::trim) {
                Some(flag) if !flag.is_empty() => Ok(flag.to_owned()),
                _ => Err(StructuralValidationError::InvalidFlagSet),
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(StructuralValidationError::InvalidFlagSet),
    };

    let item_change = match raw.get("item_change") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_item_change(value)?),
    };

    let status_change = match raw.get("status_change") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_status_change(value)?),
    };

    Ok(Effects {
        trust_delta,
        logic_delta: optional_int(raw, "logic_delta")?,
        emotion_delta: optional_int(raw, "emotion_delta")?,
        flag_set,
        item_change,
        status_change,
    })
}

fn parse_item_change(value: &Value) -> Result<ItemChange, StructuralValidationError> {
    let invalid = |reason: &str| StructuralValidationError::InvalidItemChange(reason.to_owned());
    let raw = value.as_object().ok_or_else(|| invalid("must be an object"))?;

    let text = |field: &str| {
        raw.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| invalid(&format!("missing `{field}`")))
    };
    let item = text("item")?;
    let target = text("target")?;

    let delta = match raw.get("delta") {
        None | Some(Value::Null) => return Err(invalid("missing `delta`")),
        Some(value) => match value.as_i64() {
            Some(delta @ (-1 | 1)) => delta,
            _ => return Err(invalid("delta must be -1 or 1")),
        },
    };

    let target = if target == "inventory" {
        PLAYER_CONTAINER.to_owned()
    } else {
        target
    };
    Ok(ItemChange {
        item,
        delta,
        target,
    })
}

fn parse_status_change(value: &Value) -> Result<StatusEffect, StructuralValidationError> {
    let invalid = |reason: &str| StructuralValidationError::InvalidStatusChange(reason.to_owned());
    let raw = value.as_object().ok_or_else(|| invalid("must be an object"))?;

    let text = |field: &str| {
        raw.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| invalid(&format!("missing `{field}`")))
    };

    let duration = match raw.get("duration") {
        None | Some(Value::Null) => 1,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| invalid("duration must be an integer"))?,
    };
    if duration < 0 {
        return Err(StructuralValidationError::NegativeDuration(duration));
    }

    Ok(StatusEffect {
        target: text("target")?,
        status: text("status")?,
        duration,
    })
}
