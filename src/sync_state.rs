//! Pending-operation queue, derived from note flags.
//!
//! There is no separate operation log: the queue is recomputed from the local
//! store on every cycle, so a failed operation is naturally retried next time.

use std::fmt;

use crate::models::{Note, NotePayload};

/// Kind of unacknowledged mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Edit,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Edit => "edit",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One note's unsynced work, with the data to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub local_id: String,
    pub kind: OperationKind,
    /// Remote ID for edits and deletes
    pub remote_id: Option<String>,
    /// Note contents at the time the queue was derived
    pub payload: NotePayload,
}

/// Derive the pending queue, oldest note first.
///
/// At most one entry per note. A delete supersedes everything else; a create
/// carries the note's current title and tags, so an edit made before the
/// first sync travels with the create. Notes marked with a sync error are held
/// back until the user changes them.
pub fn pending_operations(notes: &[Note]) -> Vec<PendingOperation> {
    let mut ordered: Vec<&Note> = notes.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.local_id.cmp(&b.local_id))
    });

    ordered
        .into_iter()
        .filter_map(|note| {
            let kind = operation_kind(note)?;
            Some(PendingOperation {
                local_id: note.local_id.clone(),
                kind,
                remote_id: note.remote_id.clone(),
                payload: note.payload(),
            })
        })
        .collect()
}

fn operation_kind(note: &Note) -> Option<OperationKind> {
    if note.pending_delete {
        // Invariant: only synced notes can be pending delete.
        return note.remote_id.as_ref().map(|_| OperationKind::Delete);
    }
    if note.sync_error.is_some() {
        return None;
    }
    if note.pending_create {
        Some(OperationKind::Create)
    } else if note.pending_edit && note.remote_id.is_some() {
        Some(OperationKind::Edit)
    } else {
        None
    }
}

/// Number of notes with unsynced work, including held-back ones
pub fn pending_count(notes: &[Note]) -> usize {
    notes.iter().filter(|n| n.has_pending_work()).count()
}
