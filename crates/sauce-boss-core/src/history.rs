//! Bounded log of the requests a user can navigate back to.

use serde::{Deserialize, Serialize};

use crate::selection::SauceSelection;

pub const MAX_HISTORY_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Launch,
    RecipeIntent,
    HelpIntent,
    ScreenEvent,
    /// Repeat, previous, exit, session end and anything unhandled.
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub request_kind: RequestKind,
    #[serde(default)]
    pub selection: Option<SauceSelection>,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub actionable: bool,
}

impl HistoryEntry {
    #[must_use]
    pub fn launch() -> Self {
        Self {
            request_kind: RequestKind::Launch,
            selection: None,
            arguments: Vec::new(),
            actionable: true,
        }
    }

    #[must_use]
    pub fn help() -> Self {
        Self {
            request_kind: RequestKind::HelpIntent,
            selection: None,
            arguments: Vec::new(),
            actionable: true,
        }
    }

    /// A spoken recipe request; only actionable when a recipe was found.
    #[must_use]
    pub fn recipe_intent(selection: SauceSelection, found: bool) -> Self {
        Self {
            request_kind: RequestKind::RecipeIntent,
            selection: Some(selection),
            arguments: Vec::new(),
            actionable: found,
        }
    }

    /// A recipe tap on the screen. Always actionable, even for an unknown sauce code.
    #[must_use]
    pub fn screen_event(arguments: Vec<String>, selection: SauceSelection) -> Self {
        Self {
            request_kind: RequestKind::ScreenEvent,
            selection: Some(selection),
            arguments,
            actionable: true,
        }
    }

    #[must_use]
    pub fn passive() -> Self {
        Self {
            request_kind: RequestKind::Other,
            selection: None,
            arguments: Vec::new(),
            actionable: false,
        }
    }
}

/// Oldest entry first, newest last.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct ActionableHistory {
    entries: Vec<HistoryEntry>,
}

impl From<Vec<HistoryEntry>> for ActionableHistory {
    fn from(mut entries: Vec<HistoryEntry>) -> Self {
        if entries.len() > MAX_HISTORY_SIZE {
            entries.drain(..entries.len() - MAX_HISTORY_SIZE);
        }
        Self { entries }
    }
}

impl From<ActionableHistory> for Vec<HistoryEntry> {
    fn from(history: ActionableHistory) -> Self {
        history.entries
    }
}

impl ActionableHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Evict the oldest entry when full, then append `entry` if it is actionable.
    ///
    /// The eviction happens for every completed response, including ones that
    /// are not recorded. Returns whether the entry was appended.
    pub fn record_if_actionable(&mut self, entry: HistoryEntry) -> bool {
        if self.entries.len() >= MAX_HISTORY_SIZE {
            self.entries.remove(0);
        }
        if !entry.actionable {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Entry to replay for "previous", without mutating the history.
    ///
    /// The newest actionable entry is what the user currently sees or heard;
    /// the next actionable entry below it is the target. Non-actionable entries
    /// are skipped and never count as current.
    #[must_use]
    pub fn find_previous(&self) -> Option<&HistoryEntry> {
        let mut found_current = false;
        for entry in self.entries.iter().rev() {
            if !entry.actionable {
                continue;
            }
            if found_current {
                return Some(entry);
            }
            found_current = true;
        }
        None
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::SauceId;

    fn recipe(id: SauceId) -> HistoryEntry {
        HistoryEntry::recipe_intent(SauceSelection::resolved(id), true)
    }

    #[test]
    fn find_previous_on_empty_history_is_none() {
        assert_eq!(ActionableHistory::new().find_previous(), None);
    }

    #[test]
    fn find_previous_with_only_current_entry_is_none() {
        let mut history = ActionableHistory::new();
        history.record_if_actionable(HistoryEntry::launch());
        assert_eq!(history.find_previous(), None);
    }

    #[test]
    fn non_actionable_entry_is_skipped_and_target_is_kept() {
        let mut history = ActionableHistory::new();
        let a = recipe(SauceId::Pesto);
        let b = HistoryEntry::recipe_intent(SauceSelection::spoken("ranch"), false);
        let c = recipe(SauceId::Barbecue);

        assert!(history.record_if_actionable(a.clone()));
        assert!(!history.record_if_actionable(b));
        assert!(history.record_if_actionable(c));

        assert_eq!(history.find_previous(), Some(&a));
        assert_eq!(history.len(), 2);
        assert_eq!(history.find_previous(), Some(&a));
    }

    #[test]
    fn sixth_push_evicts_oldest() {
        let mut history = ActionableHistory::new();
        for id in [
            SauceId::Barbecue,
            SauceId::Cranberry,
            SauceId::HoneyMustard,
            SauceId::Pesto,
            SauceId::Pizza,
            SauceId::Tartar,
        ] {
            history.record_if_actionable(recipe(id));
        }
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.entries().first(), Some(&recipe(SauceId::Cranberry)));
        assert_eq!(history.entries().last(), Some(&recipe(SauceId::Tartar)));
    }

    #[test]
    fn passive_response_at_capacity_still_evicts() {
        let mut history = ActionableHistory::new();
        for _ in 0..MAX_HISTORY_SIZE {
            history.record_if_actionable(HistoryEntry::help());
        }
        assert!(!history.record_if_actionable(HistoryEntry::passive()));
        assert_eq!(history.len(), MAX_HISTORY_SIZE - 1);
    }

    #[test]
    fn non_actionable_entry_on_top_is_not_treated_as_current() {
        // Only reachable through externally supplied session state.
        let history = ActionableHistory::from(vec![
            HistoryEntry::launch(),
            HistoryEntry::help(),
            HistoryEntry::passive(),
        ]);
        assert_eq!(history.find_previous(), Some(&HistoryEntry::launch()));
    }

    #[test]
    fn oversized_input_keeps_newest_entries() {
        let entries = SauceId::ALL.iter().map(|id| recipe(*id)).collect::<Vec<_>>();
        let history = ActionableHistory::from(entries);
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        assert_eq!(history.entries().last(), Some(&recipe(SauceId::Secret)));
    }

    #[test]
    fn history_serializes_as_plain_list() {
        let mut history = ActionableHistory::new();
        history.record_if_actionable(HistoryEntry::launch());
        let value = serde_json::to_value(&history)
            .unwrap_or_else(|err| panic!("failed to serialize history: {err}"));
        assert_eq!(
            value,
            serde_json::json!([{
                "request_kind": "launch",
                "selection": null,
                "arguments": [],
                "actionable": true
            }])
        );
    }

    fn arb_entry() -> impl Strategy<Value = HistoryEntry> {
        prop_oneof![
            Just(HistoryEntry::launch()),
            Just(HistoryEntry::help()),
            Just(HistoryEntry::passive()),
            (0usize..SauceId::ALL.len(), any::<bool>()).prop_map(|(index, found)| {
                HistoryEntry::recipe_intent(SauceSelection::resolved(SauceId::ALL[index]), found)
            }),
        ]
    }

    proptest! {
        #[test]
        fn property_history_never_exceeds_capacity(
            entries in prop::collection::vec(arb_entry(), 0..40),
        ) {
            let mut history = ActionableHistory::new();
            for entry in entries {
                history.record_if_actionable(entry);
                prop_assert!(history.len() <= MAX_HISTORY_SIZE);
                prop_assert!(history.entries().iter().all(|entry| entry.actionable));
            }
        }

        #[test]
        fn property_find_previous_is_read_only(
            entries in prop::collection::vec(arb_entry(), 0..12),
        ) {
            let mut history = ActionableHistory::new();
            for entry in entries {
                history.record_if_actionable(entry);
            }
            let before = history.clone();
            let target = history.find_previous().cloned();
            prop_assert_eq!(&history, &before);
            if history.len() >= 2 {
                prop_assert_eq!(target.as_ref(), history.entries().get(history.len() - 2));
            } else {
                prop_assert!(target.is_none());
            }
        }
    }
}
