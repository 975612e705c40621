use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::{OutputSpeech, Reprompt};
use crate::history::ActionableHistory;
use crate::SkillError;

/// Per-session state carried between turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    #[serde(default)]
    pub actionable_history: ActionableHistory,
    /// Speech of the last response, replayed by "repeat".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<OutputSpeech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    /// Recipe speech spoken through the screen template instead of `speech`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt_output: Option<String>,
}

impl SessionState {
    /// Decode state from a session attribute map. Unknown keys are ignored.
    ///
    /// # Errors
    /// Returns [`SkillError::InvalidSession`] when a known key has the wrong shape.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Self, SkillError> {
        serde_json::from_value(Value::Object(attributes.clone()))
            .map_err(|err| SkillError::InvalidSession(err.to_string()))
    }

    /// Encode state as a session attribute map.
    ///
    /// # Errors
    /// Returns [`SkillError::InvalidSession`] when serialization fails.
    pub fn to_attributes(&self) -> Result<Map<String, Value>, SkillError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(SkillError::InvalidSession(format!(
                "session state encoded as non-object: {other}"
            ))),
            Err(err) => Err(SkillError::InvalidSession(err.to_string())),
        }
    }

    /// Decode state, starting fresh when the attributes are malformed.
    #[must_use]
    pub fn from_attributes_or_default(attributes: Option<&Map<String, Value>>) -> Self {
        let Some(attributes) = attributes else {
            return Self::default();
        };
        match Self::from_attributes(attributes) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "discarding malformed session attributes");
                Self::default()
            }
        }
    }
}
