//! Merge rules for folding a pulled remote collection into local state.
//!
//! The merge is a pure function from (local snapshot, remote collection) to a
//! plan of upserts and removals; the sync engine applies the plan in a single
//! store transaction. Remote wins for title and tags unless the local note
//! carries an unacknowledged edit or delete, in which case the local intent is
//! kept until the push step settles it.

use std::collections::{HashMap, HashSet};

use crate::models::{Note, RemoteNote};
use crate::validation::{validate_remote_id, validate_title};

/// Changes produced by merging a remote pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Notes to insert or replace
    pub upserts: Vec<Note>,
    /// Local IDs to purge (deleted on the remote side)
    pub removals: Vec<String>,
    /// Remote notes first seen in this pull
    pub inserted: usize,
    /// Local notes overwritten with remote title/tags
    pub updated: usize,
    /// Remote entries ignored as invalid or duplicate
    pub skipped: usize,
}

impl MergePlan {
    /// True if applying the plan would change nothing
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Compute the merge of `remote` into `local`.
pub fn merge_remote(local: &[Note], remote: &[RemoteNote]) -> MergePlan {
    let mut plan = MergePlan::default();

    let by_remote_id: HashMap<&str, &Note> = local
        .iter()
        .filter_map(|note| note.remote_id.as_deref().map(|id| (id, note)))
        .collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(remote.len());

    for remote_note in remote {
        if !seen.insert(remote_note.id.as_str()) {
            tracing::warn!(remote_id = %remote_note.id, "Duplicate note in remote pull, skipping");
            plan.skipped += 1;
            continue;
        }
        if validate_remote_id(&remote_note.id).is_err()
            || validate_title(&remote_note.title).is_err()
        {
            tracing::warn!(remote_id = %remote_note.id, "Invalid note in remote pull, skipping");
            plan.skipped += 1;
            continue;
        }

        match by_remote_id.get(remote_note.id.as_str()) {
            None => {
                plan.upserts.push(Note::from_remote(remote_note));
                plan.inserted += 1;
            }
            Some(local_note) => {
                if local_note.pending_delete || local_note.pending_edit {
                    tracing::trace!(
                        local_id = %local_note.local_id,
                        "Keeping local pending change over remote state"
                    );
                    continue;
                }
                if local_note.title != remote_note.title || local_note.tags != remote_note.tags {
                    let mut merged = (*local_note).clone();
                    merged.title = remote_note.title.clone();
                    merged.tags = remote_note.tags.clone();
                    plan.upserts.push(merged);
                    plan.updated += 1;
                }
            }
        }
    }

    // A clean note missing from the pull was deleted remotely. Notes with
    // pending work are left for the push step, whose 404 handling settles them.
    for note in local {
        if let Some(remote_id) = note.remote_id.as_deref() {
            if !seen.contains(remote_id) && !note.has_pending_work() {
                plan.removals.push(note.local_id.clone());
            }
        }
    }

    plan
}
