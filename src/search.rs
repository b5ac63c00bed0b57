//! Tag projections over the local note set.
//!
//! These are pure views recomputed from the store on demand; nothing here is
//! persisted.

use std::collections::BTreeSet;

use crate::models::Note;

/// Every tag used by any of `notes`, sorted and deduplicated.
pub fn derive_tags(notes: &[Note]) -> BTreeSet<String> {
    notes
        .iter()
        .flat_map(|note| note.tags.iter().cloned())
        .collect()
}

/// Narrow `notes` to those matching the active tag filter.
///
/// An empty filter matches everything. Otherwise a note matches when every one
/// of its tags is active, so untagged notes always match. Input order is kept.
pub fn filter_by_tags(notes: &[Note], active: &BTreeSet<String>) -> Vec<Note> {
    if active.is_empty() {
        return notes.to_vec();
    }
    notes
        .iter()
        .filter(|note| note.tags.is_subset(active))
        .cloned()
        .collect()
}

/// Toggle `tag` in the active filter; returns true if it is now active.
pub fn toggle_tag(active: &mut BTreeSet<String>, tag: &str) -> bool {
    if active.remove(tag) {
        false
    } else {
        active.insert(tag.to_string());
        true
    }
}
