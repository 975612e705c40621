use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{Request, ResolutionStatusCode, Slot};
use crate::SauceId;

pub const ITEM_SLOT: &str = "Item";
pub const SAUCE_INSTRUCTIONS_EVENT: &str = "sauceInstructions";
pub const GO_BACK_EVENT: &str = "goBack";

/// The sauce a request asks for.
///
/// `spoken_value` is what the user said; `id` is only present when the
/// platform resolved it to a known sauce code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SauceSelection {
    #[serde(default)]
    pub id: Option<SauceId>,
    #[serde(default)]
    pub spoken_value: Option<String>,
}

impl SauceSelection {
    #[must_use]
    pub fn resolved(id: SauceId) -> Self {
        Self { id: Some(id), spoken_value: None }
    }

    #[must_use]
    pub fn spoken(value: impl Into<String>) -> Self {
        Self { id: None, spoken_value: Some(value.into()) }
    }
}

/// Extract the requested sauce from a spoken intent or a screen tap.
#[must_use]
pub fn extract_selection(request: &Request) -> SauceSelection {
    match request {
        Request::UserEvent(event) => selection_from_arguments(&event.arguments),
        Request::Intent(intent) => selection_from_slot(intent.intent.slots.get(ITEM_SLOT)),
        Request::Launch(_) | Request::SessionEnded(_) | Request::Unsupported => {
            SauceSelection::default()
        }
    }
}

/// Selection from a screen tap: the sauce code is the second argument.
#[must_use]
pub fn selection_from_arguments(arguments: &[Value]) -> SauceSelection {
    let id = arguments.get(1).and_then(Value::as_str).and_then(SauceId::parse);
    SauceSelection { id, spoken_value: None }
}

/// Selection from the `Item` slot. Only an exact entity-resolution match on the
/// first authority yields an id.
#[must_use]
pub fn selection_from_slot(slot: Option<&Slot>) -> SauceSelection {
    let Some(slot) = slot else {
        return SauceSelection::default();
    };

    let spoken_value = slot.value.as_ref().filter(|value| !value.is_empty()).cloned();
    let id = slot
        .resolutions
        .as_ref()
        .and_then(|resolutions| resolutions.resolutions_per_authority.first())
        .filter(|authority| authority.status.code == ResolutionStatusCode::ErSuccessMatch)
        .and_then(|authority| authority.values.first())
        .and_then(|candidate| SauceId::parse(&candidate.value.id));

    SauceSelection { id, spoken_value }
}
