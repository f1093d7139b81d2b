//! Multi-select widget contract
//!
//! The widget itself is external. This module defines what it is given to
//! render and how its item notifications become toggle events: only genuine
//! transitions of an option's selected flag are reported.

use nnlink_model::{SelectOption, SelectionState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default multi-select placeholder
pub const DEFAULT_PLACEHOLDER: &str = "---";

/// Message shown while the primary record does not exist
pub const NO_RECORD_MESSAGE: &str =
    "This record hasn't been created yet. To enable this control, create the record.";

/// One option as rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOption {
    /// Option key
    pub key: String,
    /// Display text, empty when absent
    pub text: String,
    /// Whether the option is selected
    pub selected: bool,
}

/// Content handed to the render target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewModel {
    /// Nothing rendered
    Empty,
    /// Message only
    Placeholder {
        /// Message text
        message: String,
    },
    /// The multi-select control
    MultiSelect {
        /// Options in universe order
        options: Vec<ViewOption>,
        /// Placeholder shown with no selection
        placeholder: String,
        /// Read-only
        disabled: bool,
    },
}

impl ViewModel {
    /// Multi-select view of a universe and selection
    #[must_use]
    pub fn multi_select(
        universe: &[SelectOption],
        selected: &SelectionState,
        placeholder: &str,
        disabled: bool,
    ) -> Self {
        Self::MultiSelect {
            options: universe
                .iter()
                .map(|o| ViewOption {
                    key: o.key.clone(),
                    text: o.display_text().to_string(),
                    selected: selected.contains(&o.key),
                })
                .collect(),
            placeholder: placeholder.to_string(),
            disabled,
        }
    }

    /// Keys shown as selected
    #[must_use]
    pub fn selected_keys(&self) -> Vec<&str> {
        match self {
            Self::MultiSelect { options, .. } => options
                .iter()
                .filter(|o| o.selected)
                .map(|o| o.key.as_str())
                .collect(),
            Self::Empty | Self::Placeholder { .. } => Vec::new(),
        }
    }
}

/// A genuine selection transition of one option
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToggleEvent {
    /// Option key
    pub key: String,
    /// Selected after the transition
    pub selected: bool,
}

impl ToggleEvent {
    /// Option became selected
    #[must_use]
    pub fn select(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            selected: true,
        }
    }

    /// Option became unselected
    #[must_use]
    pub fn deselect(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            selected: false,
        }
    }
}

/// Tracks the widget's per-option selected flags
///
/// Turns item notifications and full snapshots into transition events.
#[derive(Debug, Clone, Default)]
pub struct MultiSelectAdapter {
    selected: BTreeMap<String, bool>,
}

impl MultiSelectAdapter {
    /// Adapter mirroring a universe and selection
    #[must_use]
    pub fn new(universe: &[SelectOption], selection: &SelectionState) -> Self {
        Self {
            selected: universe
                .iter()
                .map(|o| (o.key.clone(), selection.contains(&o.key)))
                .collect(),
        }
    }

    /// Widget reports one item's new flag
    ///
    /// Returns `None` for unknown keys or when nothing changed.
    pub fn on_item_changed(&mut self, key: &str, selected: bool) -> Option<ToggleEvent> {
        let flag = self.selected.get_mut(key)?;
        if *flag == selected {
            return None;
        }
        *flag = selected;
        Some(ToggleEvent {
            key: key.to_string(),
            selected,
        })
    }

    /// Widget reports its whole selection
    ///
    /// Emits one event per changed option, in key order. Unknown keys are ignored.
    pub fn diff_snapshot<'k, I>(&mut self, keys: I) -> Vec<ToggleEvent>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let wanted: SelectionState = keys.into_iter().collect();
        let changed: Vec<(String, bool)> = self
            .selected
            .iter()
            .filter_map(|(key, flag)| {
                let now = wanted.contains(key);
                (now != *flag).then(|| (key.clone(), now))
            })
            .collect();

        changed
            .into_iter()
            .filter_map(|(key, now)| self.on_item_changed(&key, now))
            .collect()
    }

    /// Force one flag without emitting an event
    pub fn set(&mut self, key: &str, selected: bool) {
        if let Some(flag) = self.selected.get_mut(key) {
            *flag = selected;
        }
    }

    /// Whether the adapter shows `key` as selected
    #[must_use]
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.get(key).copied().unwrap_or(false)
    }
}
