//! Mirrored label derivation

use nnlink_model::{SelectOption, SelectionState};

/// Separator between selected option texts
pub const LABEL_SEPARATOR: &str = ", ";

/// Comma-joined text of every selected option, in universe order
///
/// Pure and total: no sorting of its own, empty selection gives `""`,
/// options without text contribute an empty segment.
#[must_use]
pub fn labels_for_options(universe: &[SelectOption], selected: &SelectionState) -> String {
    universe
        .iter()
        .filter(|o| selected.contains(&o.key))
        .map(SelectOption::display_text)
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}
