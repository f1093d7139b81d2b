//! Selectable options and the associated subset

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One selectable target record
///
/// `text` is absent when the display attribute could not be resolved or the
/// record carries no value for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Target record id
    pub key: String,
    /// Display label
    pub text: Option<String>,
}

impl SelectOption {
    /// Create option with display text
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: Some(text.into()),
        }
    }

    /// Create option without display text
    #[inline]
    #[must_use]
    pub fn untitled(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: None,
        }
    }

    /// Display text, empty when absent
    #[inline]
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Keys of the options currently associated with the primary record
///
/// Order carries no meaning; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionState {
    keys: BTreeSet<String>,
}

impl SelectionState {
    /// Create empty selection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from keys
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether key is selected
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Add key, returning whether it was newly inserted
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    /// Remove key, returning whether it was present
    #[inline]
    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    /// Number of selected keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is selected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate selected keys
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Keep only keys present in `universe`, returning the dropped keys
    pub fn retain_known(&mut self, universe: &[SelectOption]) -> Vec<String> {
        let known: BTreeSet<&str> = universe.iter().map(|o| o.key.as_str()).collect();
        let dropped: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect();
        for key in &dropped {
            self.keys.remove(key);
        }
        dropped
    }
}

impl<K: Into<String>> FromIterator<K> for SelectionState {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::from_keys(iter)
    }
}
