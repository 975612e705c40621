//! Sauce Boss skill core: localized content, slot extraction, response
//! composition, actionable history and intent routing.
//!
//! Everything here is pure. Reading content from disk, persisting session
//! state and serving HTTP live in the outer crates.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

mod compose;
mod content;
mod envelope;
mod history;
mod selection;
mod session;
mod skill;

pub use compose::{
    compose_help, compose_launch, compose_recipe, CardContent, Composed, HelpItem, HelpScreen,
    LaunchItem, LaunchScreen, RecipeScreen, ScreenData, Surface, Transformer, DISPLAYED_SAUCES,
};
pub use content::{
    image_for, ContentError, ContentStore, LocaleBundle, PromptKey, Prompts, RecipeContent,
    RecipeText, ScreenDocuments, DEFAULT_IMAGE_URL,
};
pub use envelope::{
    ApCommand, Card, CardImage, Context, Device, Directive, HighlightMode, Intent, IntentRequest,
    LaunchRequest, OutputSpeech, Reprompt, Request, RequestEnvelope, ResolutionAuthority,
    ResolutionStatus, ResolutionStatusCode, ResolvedValue, ResolvedValueWrapper, Resolutions,
    ResponseBody, ResponseEnvelope, Session, SessionEndedRequest, Slot, SystemState, UserEvent,
    APL_INTERFACE, RESPONSE_VERSION,
};
pub use history::{ActionableHistory, HistoryEntry, RequestKind, MAX_HISTORY_SIZE};
pub use selection::{
    extract_selection, selection_from_arguments, selection_from_slot, SauceSelection,
    GO_BACK_EVENT, ITEM_SLOT, SAUCE_INSTRUCTIONS_EVENT,
};
pub use session::SessionState;
pub use skill::{handle_request, SkillRequest, FALLBACK_ERROR_MESSAGE};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SkillError {
    #[error("prompt {key} is missing for locale {locale}")]
    MissingPrompt { key: &'static str, locale: String },
    #[error("template error: {0}")]
    Template(String),
    #[error("invalid session state: {0}")]
    InvalidSession(String),
    #[error("unhandled request: {0}")]
    Unhandled(String),
}

/// Sauce codes understood by the skill.
///
/// The three-letter code is what the interaction model returns as the
/// entity-resolution id and what screen tap events carry as their argument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SauceId {
    #[serde(rename = "BBQ")]
    Barbecue,
    #[serde(rename = "CRA")]
    Cranberry,
    #[serde(rename = "HON")]
    HoneyMustard,
    #[serde(rename = "PES")]
    Pesto,
    #[serde(rename = "PIZ")]
    Pizza,
    #[serde(rename = "TAR")]
    Tartar,
    #[serde(rename = "THO")]
    ThousandIsland,
    #[serde(rename = "SEC")]
    Secret,
}

impl SauceId {
    pub const ALL: [Self; 8] = [
        Self::Barbecue,
        Self::Cranberry,
        Self::HoneyMustard,
        Self::Pesto,
        Self::Pizza,
        Self::Tartar,
        Self::ThousandIsland,
        Self::Secret,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Barbecue => "BBQ",
            Self::Cranberry => "CRA",
            Self::HoneyMustard => "HON",
            Self::Pesto => "PES",
            Self::Pizza => "PIZ",
            Self::Tartar => "TAR",
            Self::ThousandIsland => "THO",
            Self::Secret => "SEC",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BBQ" => Some(Self::Barbecue),
            "CRA" => Some(Self::Cranberry),
            "HON" => Some(Self::HoneyMustard),
            "PES" => Some(Self::Pesto),
            "PIZ" => Some(Self::Pizza),
            "TAR" => Some(Self::Tartar),
            "THO" => Some(Self::ThousandIsland),
            "SEC" => Some(Self::Secret),
            _ => None,
        }
    }
}

impl Display for SauceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
