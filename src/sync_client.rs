//! Reconciliation engine.
//!
//! One cycle pulls the full remote collection, merges it into the local store,
//! then pushes every pending operation in creation order:
//! - Pull failure aborts the cycle before anything local changes
//! - Each pushed operation succeeds or fails on its own; failures leave the
//!   note's flags set so the next cycle retries it
//! - Local store failures are fatal and propagate
//!
//! The store lock is never held across a remote call, so user writes can land
//! while a cycle is waiting on the network. Acknowledgements re-read the note
//! before clearing flags, so such a write is never lost.

use std::sync::{Arc, Mutex};

use crate::database::{lock_database, Database};
use crate::error::{NoteError, NoteResult};
use crate::gateway::RemoteGateway;
use crate::merge::merge_remote;
use crate::sync_state::{pending_operations, OperationKind, PendingOperation};
use crate::validation::validate_remote_id;

/// Result of a sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub success: bool,
    /// Remote notes inserted or applied locally
    pub pulled: i64,
    /// Local notes removed (deleted remotely, or delete acknowledged)
    pub purged: i64,
    /// Operations acknowledged by the remote store
    pub pushed: i64,
    /// Operations permanently refused by the remote store
    pub rejected: i64,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    /// True if the cycle changed nothing locally or remotely
    pub fn is_noop(&self) -> bool {
        self.pulled == 0 && self.purged == 0 && self.pushed == 0 && self.rejected == 0
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CreateAck {
    Stored,
    Orphaned,
    IdInUse(String),
}

/// Drives reconciliation between the local store and the remote gateway
pub struct SyncEngine {
    db: Arc<Mutex<Database>>,
    gateway: Arc<dyn RemoteGateway>,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(db: Arc<Mutex<Database>>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { db, gateway }
    }

    /// The store this engine reconciles
    pub fn database(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    /// Run one full pull-merge-push cycle.
    ///
    /// Returns `Err` for a failed pull (transient, nothing changed locally) or a
    /// local store failure (fatal). Per-note push failures are reported in the
    /// returned `SyncResult` instead.
    pub async fn reconcile(&self) -> NoteResult<SyncResult> {
        let mut result = SyncResult::success();

        // Step 1: Pull
        let remote_notes = match self.gateway.list_notes().await {
            Ok(notes) => notes,
            Err(e) => {
                tracing::warn!(error = %e, "Pull failed, sync cycle aborted");
                return Err(e);
            }
        };

        // Step 2: Merge, then derive the push queue from the merged state
        let operations = {
            let mut db = lock_database(&self.db)?;
            let local = db.get_all()?;
            let plan = merge_remote(&local, &remote_notes);
            if !plan.is_empty() {
                db.apply_batch(&plan.upserts, &plan.removals)?;
            }
            result.pulled = (plan.inserted + plan.updated) as i64;
            result.purged = plan.removals.len() as i64;
            tracing::debug!(
                inserted = plan.inserted,
                updated = plan.updated,
                purged = plan.removals.len(),
                skipped = plan.skipped,
                "Merged remote notes"
            );
            pending_operations(&db.get_all()?)
        };

        // Step 3: Push
        for operation in &operations {
            match operation.kind {
                OperationKind::Create => self.push_create(operation, &mut result).await?,
                OperationKind::Edit => self.push_edit(operation, &mut result).await?,
                OperationKind::Delete => self.push_delete(operation, &mut result).await?,
            }
        }

        result.success = result.errors.is_empty();
        tracing::info!(
            pulled = result.pulled,
            pushed = result.pushed,
            purged = result.purged,
            rejected = result.rejected,
            errors = result.errors.len(),
            "Sync cycle finished"
        );
        Ok(result)
    }

    async fn push_create(
        &self,
        operation: &PendingOperation,
        result: &mut SyncResult,
    ) -> NoteResult<()> {
        let remote = match self.gateway.create_note(&operation.payload).await {
            Ok(remote) => remote,
            Err(e) => return self.record_failure(operation, e, result),
        };

        if let Err(e) = validate_remote_id(&remote.id) {
            let error = NoteError::sync(format!("Create response carried an unusable ID: {}", e));
            return self.record_failure(operation, error, result);
        }

        let ack = {
            let db = lock_database(&self.db)?;
            match db.find_by_remote_id(&remote.id)? {
                Some(other) if other.local_id != operation.local_id => {
                    CreateAck::IdInUse(other.local_id)
                }
                _ => match db.get(&operation.local_id)? {
                    Some(mut note) => {
                        note.remote_id = Some(remote.id.clone());
                        note.pending_create = false;
                        note.sync_error = None;
                        // An edit made while the create was in flight still needs sending.
                        note.pending_edit = note.title != operation.payload.title;
                        db.put(&note)?;
                        CreateAck::Stored
                    }
                    None => CreateAck::Orphaned,
                },
            }
        };
        if let CreateAck::IdInUse(other) = &ack {
            let error = NoteError::sync(format!(
                "Remote ID {} is already held by note {}",
                remote.id, other
            ));
            return self.record_failure(operation, error, result);
        }
        let orphaned = ack == CreateAck::Orphaned;
        result.pushed += 1;

        tracing::debug!(
            local_id = %operation.local_id,
            remote_id = %remote.id,
            "Create acknowledged"
        );

        if orphaned {
            // Deleted locally while the create was in flight.
            tracing::debug!(remote_id = %remote.id, "Removing remote copy of locally deleted note");
            if let Err(e) = self.gateway.delete_note(&remote.id).await {
                tracing::warn!(remote_id = %remote.id, error = %e, "Orphan cleanup failed");
                result
                    .errors
                    .push(format!("Delete of orphaned note {} failed: {}", remote.id, e));
            }
        }
        Ok(())
    }

    async fn push_edit(
        &self,
        operation: &PendingOperation,
        result: &mut SyncResult,
    ) -> NoteResult<()> {
        let Some(remote_id) = operation.remote_id.as_deref() else {
            return Ok(());
        };

        match self
            .gateway
            .update_note(remote_id, &operation.payload.title)
            .await
        {
            Ok(()) => {
                let db = lock_database(&self.db)?;
                if let Some(mut note) = db.get(&operation.local_id)? {
                    if note.title == operation.payload.title {
                        note.pending_edit = false;
                        note.sync_error = None;
                        db.put(&note)?;
                    }
                }
                result.pushed += 1;
                tracing::debug!(local_id = %operation.local_id, remote_id, "Edit acknowledged");
                Ok(())
            }
            Err(NoteError::NotFound(message)) => {
                // Gone remotely: the local copy is purged rather than retried.
                let db = lock_database(&self.db)?;
                if db.remove(&operation.local_id)? {
                    result.purged += 1;
                }
                tracing::info!(
                    local_id = %operation.local_id,
                    remote_id,
                    %message,
                    "Edited note no longer exists remotely, purged"
                );
                Ok(())
            }
            Err(e) => self.record_failure(operation, e, result),
        }
    }

    async fn push_delete(
        &self,
        operation: &PendingOperation,
        result: &mut SyncResult,
    ) -> NoteResult<()> {
        let Some(remote_id) = operation.remote_id.as_deref() else {
            return Ok(());
        };

        // The gateway already reports "not found" as success.
        match self.gateway.delete_note(remote_id).await {
            Ok(()) | Err(NoteError::NotFound(_)) => {
                let db = lock_database(&self.db)?;
                if db.remove(&operation.local_id)? {
                    result.purged += 1;
                }
                result.pushed += 1;
                tracing::debug!(local_id = %operation.local_id, remote_id, "Delete acknowledged");
                Ok(())
            }
            Err(e) => self.record_failure(operation, e, result),
        }
    }

    /// Record a failed push. Transient failures leave the note untouched;
    /// permanent rejections of creates and edits mark it with the error.
    fn record_failure(
        &self,
        operation: &PendingOperation,
        error: NoteError,
        result: &mut SyncResult,
    ) -> NoteResult<()> {
        result.errors.push(format!(
            "{} of note {} failed: {}",
            operation.kind, operation.local_id, error
        ));

        if error.is_permanent() && operation.kind == OperationKind::Delete {
            // Deletes carry no marker and are retried; the count makes a
            // refusal visible to the host.
            result.rejected += 1;
            tracing::warn!(
                local_id = %operation.local_id,
                error = %error,
                "Delete rejected by remote store, will retry next cycle"
            );
            return Ok(());
        }

        if !error.is_permanent() {
            tracing::warn!(
                local_id = %operation.local_id,
                kind = %operation.kind,
                error = %error,
                "Push failed, will retry next cycle"
            );
            return Ok(());
        }

        result.rejected += 1;
        tracing::warn!(
            local_id = %operation.local_id,
            kind = %operation.kind,
            error = %error,
            "Push rejected by remote store"
        );

        let db = lock_database(&self.db)?;
        if let Some(mut note) = db.get(&operation.local_id)? {
            note.sync_error = Some(error.to_string());
            db.put(&note)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{Failure, MemoryGateway};
    use crate::models::Note;

    fn setup(gateway: MemoryGateway) -> (SyncEngine, Arc<Mutex<Database>>, Arc<MemoryGateway>) {
        let db = Arc::new(Mutex::new(Database::new_in_memory().unwrap()));
        let gateway = Arc::new(gateway);
        let engine = SyncEngine::new(db.clone(), gateway.clone());
        (engine, db, gateway)
    }

    fn all_notes(db: &Arc<Mutex<Database>>) -> Vec<Note> {
        db.lock().unwrap().get_all().unwrap()
    }

    fn put(db: &Arc<Mutex<Database>>, note: &Note) {
        db.lock().unwrap().put(note).unwrap();
    }

    fn synced(title: &str, remote_id: &str) -> Note {
        let mut note = Note::draft(title, Vec::<String>::new()).unwrap();
        note.remote_id = Some(remote_id.to_string());
        note.pending_create = false;
        note
    }

    #[tokio::test]
    async fn test_pull_into_empty_store() {
        let gateway =
            MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "Buy milk", &["errand"])]);
        let (engine, db, _) = setup(gateway);

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(result.pulled, 1);

        let notes = all_notes(&db);
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note.remote_id.as_deref(), Some("r1"));
        assert_eq!(note.title, "Buy milk");
        assert_eq!(note.tags.iter().collect::<Vec<_>>(), vec!["errand"]);
        assert!(!note.pending_create && !note.pending_edit && !note.pending_delete);
    }

    #[tokio::test]
    async fn test_offline_create_gets_remote_id() {
        let gateway = MemoryGateway::new();
        gateway.set_next_id(9);
        let (engine, db, gateway) = setup(gateway);

        let note = Note::draft("Call Bob", Vec::<String>::new()).unwrap();
        put(&db, &note);

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(result.pushed, 1);

        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert_eq!(stored.remote_id.as_deref(), Some("r9"));
        assert!(!stored.pending_create);
        assert_eq!(gateway.get("r9").unwrap().title, "Call Bob");
    }

    #[tokio::test]
    async fn test_partial_create_failure() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let ok = Note::draft("Works", Vec::<String>::new()).unwrap();
        let flaky = Note::draft("Flaky", Vec::<String>::new()).unwrap();
        put(&db, &ok);
        put(&db, &flaky);
        gateway.fail_create("Flaky", Failure::Transient);

        let result = engine.reconcile().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.pushed, 1);
        assert_eq!(result.errors.len(), 1);

        let stored_ok = db.lock().unwrap().get(&ok.local_id).unwrap().unwrap();
        assert!(stored_ok.remote_id.is_some());
        assert!(!stored_ok.has_pending_work());

        let stored_flaky = db.lock().unwrap().get(&flaky.local_id).unwrap().unwrap();
        assert_eq!(stored_flaky, flaky);

        gateway.clear_failures();
        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        let stored_flaky = db.lock().unwrap().get(&flaky.local_id).unwrap().unwrap();
        assert!(stored_flaky.remote_id.is_some());
    }

    #[tokio::test]
    async fn test_create_then_edit_sends_edited_title() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let mut note = Note::draft("Call Bob", Vec::<String>::new()).unwrap();
        put(&db, &note);
        note.title = "Call Bob at 5".to_string();
        put(&db, &note);

        engine.reconcile().await.unwrap();

        let remote = gateway.notes();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].title, "Call Bob at 5");
        assert_eq!(gateway.count_calls("update"), 0);

        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert!(!stored.has_pending_work());
    }

    #[tokio::test]
    async fn test_second_cycle_is_noop() {
        let gateway =
            MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "Buy milk", &["errand"])]);
        let (engine, db, gateway) = setup(gateway);
        put(&db, &Note::draft("Local", ["home"]).unwrap());

        engine.reconcile().await.unwrap();
        let before = all_notes(&db);
        let calls_before = gateway.calls().len();

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert!(result.is_noop());
        assert_eq!(all_notes(&db), before);
        assert_eq!(gateway.calls()[calls_before..], ["list".to_string()]);
    }

    #[tokio::test]
    async fn test_pull_failure_leaves_state_untouched() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let note = Note::draft("Pending", Vec::<String>::new()).unwrap();
        put(&db, &note);
        gateway.set_offline(true);

        let err = engine.reconcile().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(all_notes(&db), vec![note]);
        assert_eq!(gateway.count_calls("create"), 0);
    }

    #[tokio::test]
    async fn test_pending_delete_not_resurrected() {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "Old", &[])]);
        let (engine, db, gateway) = setup(gateway);
        let mut note = synced("Old", "r1");
        note.pending_delete = true;
        put(&db, &note);
        gateway.fail_delete("r1");

        let result = engine.reconcile().await.unwrap();
        assert!(!result.success);

        let notes = all_notes(&db);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].pending_delete);
        assert_eq!(notes[0].local_id, note.local_id);

        gateway.clear_failures();
        engine.reconcile().await.unwrap();
        assert!(all_notes(&db).is_empty());
        assert!(gateway.notes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_missing_remote_note_succeeds() {
        let (engine, db, _) = setup(MemoryGateway::new());
        let mut note = synced("Already gone", "r1");
        note.pending_delete = true;
        put(&db, &note);

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert!(all_notes(&db).is_empty());
    }

    #[tokio::test]
    async fn test_pending_edit_survives_pull_and_is_pushed() {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "Stale", &[])]);
        let (engine, db, gateway) = setup(gateway);
        let mut note = synced("Fresh", "r1");
        note.pending_edit = true;
        put(&db, &note);

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(gateway.get("r1").unwrap().title, "Fresh");

        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert_eq!(stored.title, "Fresh");
        assert!(!stored.pending_edit);
    }

    #[tokio::test]
    async fn test_edit_of_missing_note_purges_local_copy() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let mut note = synced("Edited", "r1");
        note.pending_edit = true;
        put(&db, &note);

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(result.purged, 1);
        assert_eq!(gateway.count_calls("update:r1"), 1);
        assert!(all_notes(&db).is_empty());
    }

    #[tokio::test]
    async fn test_remote_deletion_purges_clean_note() {
        let (engine, db, _) = setup(MemoryGateway::new());
        put(&db, &synced("Deleted elsewhere", "r1"));

        let result = engine.reconcile().await.unwrap();
        assert_eq!(result.purged, 1);
        assert!(all_notes(&db).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_kept_and_not_retried_verbatim() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let note = Note::draft("Forbidden", Vec::<String>::new()).unwrap();
        put(&db, &note);
        gateway.fail_create("Forbidden", Failure::Rejected);

        let result = engine.reconcile().await.unwrap();
        assert_eq!(result.rejected, 1);

        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert!(stored.pending_create);
        assert!(stored.remote_id.is_none());
        assert!(stored.sync_error.is_some());

        engine.reconcile().await.unwrap();
        assert_eq!(gateway.count_calls("create"), 1);
    }

    #[tokio::test]
    async fn test_failure_of_one_note_does_not_block_others() {
        let gateway = MemoryGateway::with_notes(vec![
            MemoryGateway::remote("r1", "One", &[]),
            MemoryGateway::remote("r2", "Two", &[]),
        ]);
        let (engine, db, gateway) = setup(gateway);

        let mut first = synced("One", "r1");
        first.pending_delete = true;
        first.created_at = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        let mut second = synced("Two renamed", "r2");
        second.pending_edit = true;
        second.created_at = chrono::DateTime::from_timestamp(2_000, 0).unwrap();
        put(&db, &first);
        put(&db, &second);
        gateway.fail_delete("r1");

        let result = engine.reconcile().await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(gateway.get("r2").unwrap().title, "Two renamed");
        assert!(db.lock().unwrap().get(&first.local_id).unwrap().unwrap().pending_delete);
    }

    fn set_title_during(
        db: &Arc<Mutex<Database>>,
        local_id: &str,
        title: &str,
    ) -> impl FnOnce() + Send + 'static {
        let db = db.clone();
        let local_id = local_id.to_string();
        let title = title.to_string();
        move || {
            let db = db.lock().unwrap();
            let mut note = db.get(&local_id).unwrap().unwrap();
            note.title = title;
            db.put(&note).unwrap();
        }
    }

    fn remove_during(
        db: &Arc<Mutex<Database>>,
        local_id: &str,
    ) -> impl FnOnce() + Send + 'static {
        let db = db.clone();
        let local_id = local_id.to_string();
        move || {
            db.lock().unwrap().remove(&local_id).unwrap();
        }
    }

    #[tokio::test]
    async fn test_edit_during_create_stays_pending_edit() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let note = Note::draft("Call Bob", Vec::<String>::new()).unwrap();
        put(&db, &note);
        gateway.during_next_create(set_title_during(&db, &note.local_id, "Call Bob at 5"));

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert_eq!(stored.remote_id.as_deref(), Some("r0"));
        assert!(!stored.pending_create);
        assert!(stored.pending_edit);
        assert_eq!(stored.title, "Call Bob at 5");
        assert_eq!(gateway.get("r0").unwrap().title, "Call Bob");

        engine.reconcile().await.unwrap();
        assert_eq!(gateway.get("r0").unwrap().title, "Call Bob at 5");
        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert!(!stored.has_pending_work());
    }

    #[tokio::test]
    async fn test_delete_during_create_removes_remote_copy() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let note = Note::draft("Short-lived", Vec::<String>::new()).unwrap();
        put(&db, &note);
        gateway.during_next_create(remove_during(&db, &note.local_id));

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(gateway.count_calls("delete:r0"), 1);
        assert!(gateway.notes().is_empty());
        assert!(all_notes(&db).is_empty());
    }

    #[tokio::test]
    async fn test_failed_orphan_cleanup_is_reported() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        let note = Note::draft("Short-lived", Vec::<String>::new()).unwrap();
        put(&db, &note);
        gateway.fail_delete("r0");
        gateway.during_next_create(remove_during(&db, &note.local_id));

        let result = engine.reconcile().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("r0"));
        assert!(gateway.get("r0").is_some());
        assert!(all_notes(&db).is_empty());
    }

    #[tokio::test]
    async fn test_edit_during_edit_keeps_pending_edit() {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "First", &[])]);
        let (engine, db, gateway) = setup(gateway);
        let mut note = synced("Second", "r1");
        note.pending_edit = true;
        put(&db, &note);
        gateway.during_next_update(set_title_during(&db, &note.local_id, "Third"));

        let result = engine.reconcile().await.unwrap();
        assert!(result.success);
        assert_eq!(gateway.get("r1").unwrap().title, "Second");
        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert_eq!(stored.title, "Third");
        assert!(stored.pending_edit);

        engine.reconcile().await.unwrap();
        assert_eq!(gateway.get("r1").unwrap().title, "Third");
        assert!(!db.lock().unwrap().get(&note.local_id).unwrap().unwrap().pending_edit);
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let (engine, db, gateway) = setup(MemoryGateway::new());
        put(&db, &Note::draft("Pending", Vec::<String>::new()).unwrap());

        let poisoner = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("store holder crashed");
        })
        .join();
        assert!(db.is_poisoned());

        let err = engine.reconcile().await.unwrap_err();
        assert!(matches!(err, NoteError::DatabaseOperation(_)));
        assert!(!err.is_transient());
        assert_eq!(gateway.count_calls("create"), 0);
    }

    #[tokio::test]
    async fn test_create_answered_with_held_remote_id_is_retried() {
        let gateway =
            MemoryGateway::with_notes(vec![MemoryGateway::remote("r0", "Existing", &[])]);
        let (engine, db, gateway) = setup(gateway);
        let existing = synced("Existing", "r0");
        put(&db, &existing);
        let draft = Note::draft("New", Vec::<String>::new()).unwrap();
        put(&db, &draft);

        let result = engine.reconcile().await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.rejected, 0);

        let stored = db.lock().unwrap().get(&draft.local_id).unwrap().unwrap();
        assert!(stored.pending_create);
        assert!(stored.remote_id.is_none());
        assert!(stored.sync_error.is_none());
        let held = db.lock().unwrap().find_by_remote_id("r0").unwrap().unwrap();
        assert_eq!(held.local_id, existing.local_id);
    }

    #[tokio::test]
    async fn test_rejected_delete_is_counted_and_retried() {
        let gateway = MemoryGateway::with_notes(vec![MemoryGateway::remote("r1", "Locked", &[])]);
        let (engine, db, gateway) = setup(gateway);
        let mut note = synced("Locked", "r1");
        note.pending_delete = true;
        put(&db, &note);
        gateway.reject_delete("r1");

        let result = engine.reconcile().await.unwrap();
        assert_eq!(result.rejected, 1);
        assert_eq!(result.errors.len(), 1);
        let stored = db.lock().unwrap().get(&note.local_id).unwrap().unwrap();
        assert!(stored.pending_delete);
        assert!(stored.sync_error.is_none());

        engine.reconcile().await.unwrap();
        assert_eq!(gateway.count_calls("delete:r1"), 2);
    }
}
