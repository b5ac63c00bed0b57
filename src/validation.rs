//! Input validation for notesync.
//!
//! This module provides validation functions for all user inputs.
//! All validators return NoteError::Validation on failure.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::{NoteError, NoteResult};

// Limits
pub const MAX_TITLE_LENGTH: usize = 10_000;
pub const MAX_TAG_LENGTH: usize = 100;
pub const MAX_TAGS_PER_NOTE: usize = 100;
pub const LOCAL_ID_HEX_LENGTH: usize = 32;

/// Validate a note title.
///
/// Titles must contain at least one non-whitespace character.
pub fn validate_title(title: &str) -> NoteResult<()> {
    if title.trim().is_empty() {
        return Err(NoteError::validation("title", "Note title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(NoteError::validation(
            "title",
            format!("Note title exceeds maximum length of {} characters", MAX_TITLE_LENGTH),
        ));
    }
    Ok(())
}

/// Validate a single tag after trimming.
pub fn validate_tag(tag: &str) -> NoteResult<()> {
    if tag.chars().count() > MAX_TAG_LENGTH {
        return Err(NoteError::validation(
            "tags",
            format!("Tag '{}' exceeds maximum length of {} characters", tag, MAX_TAG_LENGTH),
        ));
    }
    Ok(())
}

/// Normalize user-entered tags into a tag set.
///
/// Tags are trimmed, blank entries dropped and duplicates collapsed.
pub fn normalize_tags<I, S>(tags: I) -> NoteResult<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        validate_tag(tag)?;
        set.insert(tag.to_string());
    }
    if set.len() > MAX_TAGS_PER_NOTE {
        return Err(NoteError::validation(
            "tags",
            format!("A note may carry at most {} tags", MAX_TAGS_PER_NOTE),
        ));
    }
    Ok(set)
}

/// Validate a local note ID (32 hex characters, UUID simple form).
pub fn validate_local_id(local_id: &str) -> NoteResult<()> {
    if local_id.len() != LOCAL_ID_HEX_LENGTH || !local_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(NoteError::validation(
            "local_id",
            format!("must be {} hex characters", LOCAL_ID_HEX_LENGTH),
        ));
    }
    Uuid::parse_str(local_id).map_err(|e| NoteError::validation("local_id", e.to_string()))?;
    Ok(())
}

/// Validate an identifier assigned by the remote store.
pub fn validate_remote_id(remote_id: &str) -> NoteResult<()> {
    if remote_id.trim().is_empty() {
        return Err(NoteError::validation("remote_id", "must not be empty"));
    }
    Ok(())
}
