//! Typed scene and atmosphere content, parsed from generator payloads or
//! drawn from the scripted fallback tables.

use riftward_core::state::WorldConstraint;
use riftward_rules::Reaction;
use serde::Serialize;
use serde_json::Value;

/// A selectable player option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    /// Identifier the player picks by.
    pub id: String,
    /// What the option says.
    pub text: String,
    /// Kind of action, e.g. `cautious` or `risk`.
    pub action_type: String,
}

/// Scene text plus the options offered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContent {
    /// Scene description.
    pub scene: String,
    /// Options offered to the player.
    pub options: Vec<ChoiceOption>,
    /// Safe-function payloads proposed by the event generator.
    #[serde(skip)]
    pub proposed_calls: Value,
}

/// Atmosphere for the turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldContent {
    /// Short atmosphere label, e.g. `cold fog`.
    pub atmosphere: String,
    /// A sentence of sensory description.
    pub sensory_details: String,
    /// Safe-function payloads proposed by the world generator.
    #[serde(skip)]
    pub proposed_calls: Value,
}

fn text(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

fn calls(value: &Value) -> Value {
    value.get("function_calls").cloned().unwrap_or(Value::Null)
}

impl EventContent {
    /// Parses an event payload. Options without an id or text are skipped;
    /// a missing action type reads as `neutral`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the scene is missing.
    pub fn parse(payload: &Value) -> Result<Self, String> {
        let scene = text(payload, "scene").ok_or_else(|| "event payload has no scene".to_owned())?;
        let options = payload
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| {
                        Some(ChoiceOption {
                            id: text(option, "id")?,
                            text: text(option, "text")?,
                            action_type: text(option, "action_type")
                                .unwrap_or_else(|| "neutral".to_owned()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            scene,
            options,
            proposed_calls: calls(payload),
        })
    }

    /// Scripted scene for `turn`.
    #[must_use]
    pub fn scripted(turn: u32) -> Self {
        let (scene, options) = SCENES[index(turn, SCENES.len())];
        Self {
            scene: scene.to_owned(),
            options: options
                .iter()
                .map(|(id, text, action_type)| ChoiceOption {
                    id: (*id).to_owned(),
                    text: (*text).to_owned(),
                    action_type: (*action_type).to_owned(),
                })
                .collect(),
            proposed_calls: Value::Null,
        }
    }

    /// Resolves the player's choice: the option with id `requested`, else
    /// the first option, else holding position.
    #[must_use]
    pub fn resolve_choice(&self, requested: Option<&str>) -> ChoiceOption {
        requested
            .and_then(|id| self.options.iter().find(|option| option.id == id))
            .or_else(|| self.options.first())
            .cloned()
            .unwrap_or_else(|| ChoiceOption {
                id: "hold".to_owned(),
                text: "Hold position".to_owned(),
                action_type: "cautious".to_owned(),
            })
    }
}

impl WorldContent {
    /// The constraint carried into the next turn.
    #[must_use]
    pub fn constraint(&self) -> WorldConstraint {
        WorldConstraint {
            atmosphere: self.atmosphere.clone(),
            sensory_details: self.sensory_details.clone(),
        }
    }

    /// Atmosphere and sensory text as one line for the judge.
    #[must_use]
    pub fn context_line(&self) -> String {
        if self.sensory_details.is_empty() {
            self.atmosphere.clone()
        } else {
            format!("{}; {}", self.atmosphere, self.sensory_details)
        }
    }

    /// Parses a world payload.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the atmosphere is missing.
    pub fn parse(payload: &Value) -> Result<Self, String> {
        let atmosphere =
            text(payload, "atmosphere").ok_or_else(|| "world payload has no atmosphere".to_owned())?;
        Ok(Self {
            atmosphere,
            sensory_details: text(payload, "sensory_details").unwrap_or_default(),
            proposed_calls: calls(payload),
        })
    }

    /// Scripted atmosphere for `turn`.
    #[must_use]
    pub fn scripted(turn: u32) -> Self {
        let (atmosphere, sensory_details) = ATMOSPHERES[index(turn, ATMOSPHERES.len())];
        Self {
            atmosphere: atmosphere.to_owned(),
            sensory_details: sensory_details.to_owned(),
            proposed_calls: Value::Null,
        }
    }
}

/// Reaction entries from a character payload: a bare list or an object with
/// a `reactions` list. Anything else yields nothing.
#[must_use]
pub fn reaction_entries(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(entries) => entries.clone(),
        Value::Object(object) => object
            .get("reactions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Flavor-only reaction used in place of generated content.
#[must_use]
pub fn scripted_reaction(name: &str, turn: u32) -> Reaction {
    let (intent, action, speech) = REACTIONS[index(turn, REACTIONS.len())];
    Reaction {
        name: name.to_owned(),
        intent: intent.to_owned(),
        action: action.to_owned(),
        speech: speech.to_owned(),
        effects: None,
        proposed_calls: Value::Null,
    }
}

fn index(turn: u32, len: usize) -> usize {
    usize::try_from(turn).unwrap_or(0) % len
}

type SceneEntry = (&'static str, &'static [(&'static str, &'static str, &'static str)]);

const SCENES: [SceneEntry; 3] = [
    (
        "The outer ward hums unevenly as dusk settles over the camp.",
        &[
            ("reinforce", "Reinforce the ward stones", "cautious"),
            ("scout", "Scout beyond the ward line", "risk"),
            ("rest", "Let the camp rest", "neutral"),
        ],
    ),
    (
        "A supply cart arrives with half its crates missing.",
        &[
            ("ration", "Ration what remains", "cautious"),
            ("search", "Search the road for the lost crates", "risk"),
            ("share", "Share the supplies openly", "neutral"),
        ],
    ),
    (
        "Static crawls along the watchtower and the lanterns stutter.",
        &[
            ("study", "Study the static patterns", "neutral"),
            ("climb", "Climb the tower to reset the lanterns", "risk"),
            ("wait", "Wait for the static to pass", "cautious"),
        ],
    ),
];

const ATMOSPHERES: [(&str, &str); 4] = [
    ("still dusk", "Woodsmoke hangs low over the tents."),
    ("cold fog", "Voices carry strangely in the grey."),
    ("restless wind", "Canvas snaps against its ropes."),
    ("humming static", "Every metal edge buzzes faintly."),
];

const REACTIONS: [(&str, &str, &str); 3] = [
    ("observe", "watches the ward line", "Keep your eyes open tonight."),
    ("steady", "checks the supplies again", "We have enough, if we are careful."),
    ("listen", "tilts their head toward the hum", "Do you hear that? It changed."),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_parse_skips_incomplete_options() {
        let event = EventContent::parse(&json!({
            "scene": " A bell rings. ",
            "options": [
                {"id": "go", "text": "Go", "action_type": "risk"},
                {"id": "bad"},
                {"id": "stay", "text": "Stay"}
            ],
            "function_calls": [{"name": "set_flag"}]
        }))
        .unwrap();

        assert_eq!(event.scene, "A bell rings.");
        assert_eq!(event.options.len(), 2);
        assert_eq!(event.options[1].action_type, "neutral");
        assert!(event.proposed_calls.is_array());
    }

    #[test]
    fn test_event_without_scene_is_rejected() {
        assert!(EventContent::parse(&json!({"options": []})).is_err());
        assert!(EventContent::parse(&json!("scene")).is_err());
    }

    #[test]
    fn test_choice_resolution_falls_back_in_order() {
        let event = EventContent::scripted(0);
        assert_eq!(event.resolve_choice(Some("scout")).id, "scout");
        assert_eq!(event.resolve_choice(Some("missing")).id, "reinforce");
        assert_eq!(event.resolve_choice(None).id, "reinforce");

        let empty = EventContent {
            scene: "x".into(),
            options: vec![],
            proposed_calls: Value::Null,
        };
        assert_eq!(empty.resolve_choice(Some("scout")).id, "hold");
    }

    #[test]
    fn test_world_parse_requires_atmosphere() {
        let world = WorldContent::parse(&json!({"atmosphere": "fog"})).unwrap();
        assert_eq!(world.sensory_details, "");
        assert_eq!(world.context_line(), "fog");
        assert!(WorldContent::parse(&json!({"sensory_details": "damp"})).is_err());
    }

    #[test]
    fn test_scripted_content_is_deterministic_per_turn() {
        assert_eq!(WorldContent::scripted(5), WorldContent::scripted(5));
        assert_ne!(
            WorldContent::scripted(1).atmosphere,
            WorldContent::scripted(2).atmosphere
        );
        let reaction = scripted_reaction("Oren", 4);
        assert_eq!(reaction.name, "Oren");
        assert!(!reaction.is_state_mutating());
    }

    #[test]
    fn test_reaction_entries_accepts_list_or_wrapper() {
        assert_eq!(reaction_entries(&json!([{"name": "a"}])).len(), 1);
        assert_eq!(reaction_entries(&json!({"reactions": [{}, {}]})).len(), 2);
        assert!(reaction_entries(&json!("nope")).is_empty());
    }
}
