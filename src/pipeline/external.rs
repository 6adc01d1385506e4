//! Phase B: dynamic external events.
//!
//! Once in a while the pipeline asks an external narrator for an event
//! ("a plague sweeps the lowlands") and applies its effects. The narrator
//! is untrusted: unknown nations, unknown technologies and unknown effect
//! kinds are ignored, and a failed call simply means no event this turn.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::core::{clamp_score, Event, EventKind, Nation, NationId, RandomSource, RulesConfig, Snapshot, Technology};
use crate::error::CollaboratorError;

const INSTRUCTION: &str = "Create one dynamic world event that affects one or more of these nations. \
Respond with {title, description, effects: [{nation, effect, value, tech_name?}]} where effect is \
resource_change, stability_change, army_change or tech_advance.";

/// What the narrator is told.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// Turn being resolved.
    pub turn: u32,
    /// Active nations, in name order.
    pub nations: Vec<Nation>,
    /// Generation instruction.
    pub instruction: String,
}

impl NarrativeRequest {
    /// Describe the active nations of a snapshot.
    #[must_use]
    pub fn new(snapshot: &Snapshot) -> Self {
        Self {
            turn: snapshot.turn,
            nations: snapshot.nations.values().filter(|n| n.is_active()).cloned().collect(),
            instruction: INSTRUCTION.to_string(),
        }
    }

    /// Serialize for a JSON transport.
    pub fn to_json(&self) -> Result<String, CollaboratorError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Kind of change a narrative effect makes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    ResourceChange,
    StabilityChange,
    /// Applied to the nation's capital garrison.
    ArmyChange,
    /// Raises `tech_name` by one level.
    TechAdvance,
    /// Anything else the narrator invents.
    #[serde(other)]
    Unknown,
}

/// One effect of a narrative event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEffect {
    pub nation: NationId,
    pub effect: EffectKind,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub tech_name: Option<String>,
}

/// A generated world event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEvent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub effects: Vec<NarrativeEffect>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NarrativeResponse {
    Event(NarrativeEvent),
    Error { error: String },
}

impl NarrativeEvent {
    /// Parse a narrator response.
    ///
    /// An `{"error": ...}` sentinel is reported as unavailable.
    ///
    /// ```
    /// use nation_turns::pipeline::{EffectKind, NarrativeEvent};
    ///
    /// let event = NarrativeEvent::from_json(r#"{
    ///     "title": "Drought",
    ///     "description": "The rivers run dry.",
    ///     "effects": [{ "nation": "Avalon", "effect": "resource_change", "value": -40 }]
    /// }"#).unwrap();
    /// assert_eq!(event.effects[0].effect, EffectKind::ResourceChange);
    ///
    /// assert!(NarrativeEvent::from_json(r#"{ "error": "quota exceeded" }"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CollaboratorError> {
        match serde_json::from_str(json)? {
            NarrativeResponse::Event(event) => Ok(event),
            NarrativeResponse::Error { error } => Err(CollaboratorError::Unavailable(error)),
        }
    }
}

/// Generates dynamic world events.
pub trait EventNarrator: Send + Sync {
    /// Generate one event for the described world.
    fn narrate(&self, request: &NarrativeRequest) -> Result<NarrativeEvent, CollaboratorError>;
}

impl<F> EventNarrator for F
where
    F: Fn(&NarrativeRequest) -> Result<NarrativeEvent, CollaboratorError> + Send + Sync,
{
    fn narrate(&self, request: &NarrativeRequest) -> Result<NarrativeEvent, CollaboratorError> {
        self(request)
    }
}

/// Narrator used when none is configured; always unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNarrator;

impl EventNarrator for NoNarrator {
    fn narrate(&self, _request: &NarrativeRequest) -> Result<NarrativeEvent, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no event narrator configured".to_string()))
    }
}

/// Roll for a dynamic event and apply it.
///
/// Returns `true` if an event was applied.
pub fn run(
    state: &mut Snapshot,
    config: &RulesConfig,
    rng: &mut dyn RandomSource,
    narrator: &dyn EventNarrator,
) -> bool {
    if !rng.chance(config.dynamic_event_probability) {
        return false;
    }

    match narrator.narrate(&NarrativeRequest::new(state)) {
        Ok(event) => {
            apply_event(state, &event);
            true
        }
        Err(err) => {
            warn!(turn = state.turn, error = %err, "no dynamic event this turn");
            false
        }
    }
}

/// Apply a narrative event's effects and log it.
pub fn apply_event(state: &mut Snapshot, event: &NarrativeEvent) {
    let turn = state.turn;
    state.push_event(Event::new(
        turn,
        EventKind::DynamicEvent,
        format!("{}: {}", event.title, event.description),
    ));

    for effect in &event.effects {
        if !apply_effect(state, effect) {
            debug!(nation = %effect.nation, effect = ?effect.effect, "narrative effect ignored");
        }
    }
}

fn apply_effect(state: &mut Snapshot, effect: &NarrativeEffect) -> bool {
    let turn = state.turn;
    if !state.nation(&effect.nation).is_some_and(Nation::is_active) {
        return false;
    }

    match effect.effect {
        EffectKind::ResourceChange => {
            if let Some(nation) = state.nations.get_mut(&effect.nation) {
                nation.resources = nation.resources.saturating_add(effect.value).max(0);
            }
        }
        EffectKind::StabilityChange => {
            if let Some(nation) = state.nations.get_mut(&effect.nation) {
                nation.stability = clamp_score(nation.stability.saturating_add(effect.value));
            }
        }
        EffectKind::ArmyChange => {
            let Some(capital) = state.capital_of(&effect.nation).map(|t| t.id.clone()) else {
                return false;
            };
            if let Some(territory) = state.territories.get_mut(&capital) {
                territory.army = territory.army.saturating_add(effect.value).max(0);
            }
        }
        EffectKind::TechAdvance => {
            let Some(tech) = effect
                .tech_name
                .as_deref()
                .and_then(|name| Technology::from_str(name).ok())
            else {
                return false;
            };
            let Some(nation) = state.nations.get_mut(&effect.nation) else {
                return false;
            };
            let level = nation.tech_level(tech) + 1;
            nation.technologies.insert(tech, level);
            state.push_event(
                Event::new(turn, EventKind::TechAdvance, format!("{} advanced {tech} to level {level}", effect.nation))
                    .about(effect.nation.clone()),
            );
        }
        EffectKind::Unknown => return false,
    }
    true
}
