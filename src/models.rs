//! Data models for notesync.
//!
//! This module defines the core entity, Note, along with the wire shapes
//! exchanged with the remote store. Local IDs are UUID7 in simple hex form so
//! they sort in creation order.

use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{NoteError, NoteResult};
use crate::validation::{normalize_tags, validate_title};

/// Represents a note known to this device.
///
/// Timestamps are accurate to the second. The three `pending_*` flags record
/// which local mutations the remote store has not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Device-local primary key (UUID7 hex), never reused
    pub local_id: String,
    /// ID assigned by the remote store (None until the first create succeeds)
    pub remote_id: Option<String>,
    /// The note text
    pub title: String,
    /// Deduplicated tag set
    pub tags: BTreeSet<String>,
    /// When the note was created (never mutated)
    pub created_at: DateTime<Utc>,
    /// Remote create not yet acknowledged
    pub pending_create: bool,
    /// Remote title edit not yet acknowledged
    pub pending_edit: bool,
    /// Remote delete not yet acknowledged
    pub pending_delete: bool,
    /// Set when the remote store permanently rejected this note's last operation
    pub sync_error: Option<String>,
}

impl Note {
    /// Build a new, not-yet-synced note. No I/O.
    pub fn draft<I, S>(title: &str, tags: I) -> NoteResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_title(title)?;
        Ok(Self {
            local_id: Uuid::now_v7().simple().to_string(),
            remote_id: None,
            title: title.trim().to_string(),
            tags: normalize_tags(tags)?,
            created_at: Utc::now().trunc_subsecs(0),
            pending_create: true,
            pending_edit: false,
            pending_delete: false,
            sync_error: None,
        })
    }

    /// Build the local record for a note first seen in a remote pull.
    pub fn from_remote(remote: &RemoteNote) -> Self {
        Self {
            local_id: Uuid::now_v7().simple().to_string(),
            remote_id: Some(remote.id.clone()),
            title: remote.title.clone(),
            tags: remote.tags.clone(),
            created_at: remote
                .created_at
                .unwrap_or_else(Utc::now)
                .trunc_subsecs(0),
            pending_create: false,
            pending_edit: false,
            pending_delete: false,
            sync_error: None,
        }
    }

    /// True if any local mutation awaits acknowledgement
    pub fn has_pending_work(&self) -> bool {
        self.pending_create || self.pending_edit || self.pending_delete
    }

    /// True if the note is known to the remote store
    pub fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// The create request body for this note
    pub fn payload(&self) -> NotePayload {
        NotePayload {
            title: self.title.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Check the record invariants the local store must never violate.
    pub fn check_invariants(&self) -> NoteResult<()> {
        validate_title(&self.title)?;
        if self.remote_id.is_none() && !self.pending_create {
            return Err(NoteError::validation(
                "pending_create",
                "a note without a remote ID must be pending create",
            ));
        }
        if self.pending_create && self.pending_delete {
            return Err(NoteError::validation(
                "pending_delete",
                "a note cannot await creation and deletion at once",
            ));
        }
        if self.pending_create && self.remote_id.is_some() {
            return Err(NoteError::validation(
                "pending_create",
                "a note with a remote ID cannot be pending create",
            ));
        }
        Ok(())
    }
}

/// A note as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "tags_or_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn tags_or_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a remote create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub title: String,
    pub tags: BTreeSet<String>,
}

/// Body of a remote edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPayload {
    pub title: String,
}
