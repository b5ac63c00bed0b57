//! Notes client: the API the UI layer talks to.
//!
//! Every mutation is applied to the local store first and returns once it is
//! durable, so the UI never waits on the network. A background cycle is then
//! requested if the device is online.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::database::{lock_database, Database};
use crate::error::{NoteError, NoteResult};
use crate::gateway::{HttpGateway, RemoteGateway};
use crate::models::Note;
use crate::search;
use crate::sync_client::SyncEngine;
use crate::sync_state::pending_count;
use crate::trigger::{BackgroundSyncRegistrar, SyncTrigger, TriggerOutcome};
use crate::validation::{validate_local_id, validate_title};

pub struct NotesClient {
    db: Arc<Mutex<Database>>,
    trigger: Arc<SyncTrigger>,
}

impl NotesClient {
    pub fn new(
        db: Arc<Mutex<Database>>,
        gateway: Arc<dyn RemoteGateway>,
        registrar: Arc<dyn BackgroundSyncRegistrar>,
        background_sync_tag: &str,
    ) -> Self {
        let engine = SyncEngine::new(db.clone(), gateway);
        let trigger = Arc::new(SyncTrigger::new(engine, registrar, background_sync_tag));
        Self { db, trigger }
    }

    /// Open the configured store and connect it to the configured remote.
    pub fn from_config(
        config: &Config,
        registrar: Arc<dyn BackgroundSyncRegistrar>,
    ) -> NoteResult<Self> {
        if !config.is_sync_configured() {
            return Err(NoteError::Config(
                "sync is disabled or has no remote_url".to_string(),
            ));
        }
        let db = Database::new(config.database_file())?;
        let gateway = HttpGateway::from_config(config)?;
        tracing::info!(
            device = config.device_name(),
            database = config.database_file(),
            remote = gateway.base_url(),
            "Notes client ready"
        );
        Ok(Self::new(
            Arc::new(Mutex::new(db)),
            Arc::new(gateway),
            registrar,
            config.background_sync_tag(),
        ))
    }

    pub fn trigger(&self) -> &Arc<SyncTrigger> {
        &self.trigger
    }

    pub fn database(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    /// Build an unsaved note. Nothing is stored until `submit`.
    pub fn create_note_draft<I, S>(&self, title: &str, tags: I) -> NoteResult<Note>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Note::draft(title, tags)
    }

    /// Visible notes, newest first. Notes awaiting remote deletion are hidden.
    pub fn list_notes(&self) -> NoteResult<Vec<Note>> {
        let mut notes: Vec<Note> = lock_database(&self.db)?
            .get_all()?
            .into_iter()
            .filter(|note| !note.pending_delete)
            .collect();
        notes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.local_id.cmp(&a.local_id))
        });
        Ok(notes)
    }

    /// Store a new note created with `create_note_draft`.
    pub fn submit(&self, note: Note) -> NoteResult<Note> {
        if note.remote_id.is_some() || !note.pending_create {
            return Err(NoteError::validation(
                "note",
                "only unsynced drafts can be submitted",
            ));
        }
        {
            let db = lock_database(&self.db)?;
            if db.get(&note.local_id)?.is_some() {
                return Err(NoteError::validation("local_id", "note already submitted"));
            }
            db.put(&note)?;
        }
        tracing::debug!(local_id = %note.local_id, "Note submitted");
        self.trigger.notify_local_change();
        Ok(note)
    }

    /// Delete a note. A note the remote store never saw is removed outright;
    /// otherwise it is hidden and marked for remote deletion.
    ///
    /// Returns false if no such note exists.
    pub fn delete(&self, local_id: &str) -> NoteResult<bool> {
        validate_local_id(local_id)?;
        {
            let db = lock_database(&self.db)?;
            let Some(mut note) = db.get(local_id)? else {
                return Ok(false);
            };
            if note.remote_id.is_none() {
                db.remove(local_id)?;
                tracing::debug!(local_id, "Unsynced note deleted");
                return Ok(true);
            }
            note.pending_delete = true;
            db.put(&note)?;
        }
        tracing::debug!(local_id, "Note marked for deletion");
        self.trigger.notify_local_change();
        Ok(true)
    }

    /// Change a note's title.
    ///
    /// Returns false if the note does not exist or is being deleted. Editing
    /// clears any earlier rejection so the note is retried.
    pub fn edit(&self, local_id: &str, new_title: &str) -> NoteResult<bool> {
        validate_local_id(local_id)?;
        validate_title(new_title)?;
        {
            let db = lock_database(&self.db)?;
            let Some(mut note) = db.get(local_id)? else {
                return Ok(false);
            };
            if note.pending_delete {
                return Ok(false);
            }
            note.title = new_title.trim().to_string();
            if note.remote_id.is_some() {
                note.pending_edit = true;
            }
            note.sync_error = None;
            db.put(&note)?;
        }
        tracing::debug!(local_id, "Note edited");
        self.trigger.notify_local_change();
        Ok(true)
    }

    /// Tags of all visible notes
    pub fn all_tags(&self) -> NoteResult<BTreeSet<String>> {
        Ok(search::derive_tags(&self.list_notes()?))
    }

    /// Visible notes narrowed by the active tag filter, newest first
    pub fn filter_by_tags(&self, active: &BTreeSet<String>) -> NoteResult<Vec<Note>> {
        Ok(search::filter_by_tags(&self.list_notes()?, active))
    }

    /// Number of notes with changes the remote store has not acknowledged
    pub fn pending_count(&self) -> NoteResult<usize> {
        Ok(pending_count(&lock_database(&self.db)?.get_all()?))
    }

    pub fn has_unsynced_changes(&self) -> NoteResult<bool> {
        Ok(self.pending_count()? > 0)
    }

    /// Run a cycle now (or join the running one)
    pub async fn sync_now(&self) -> TriggerOutcome {
        self.trigger.request_sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::MemoryGateway;
    use crate::trigger::NoopRegistrar;
    use tempfile::TempDir;

    fn setup() -> (NotesClient, Arc<MemoryGateway>) {
        let db = Arc::new(Mutex::new(Database::new_in_memory().unwrap()));
        let gateway = Arc::new(MemoryGateway::new());
        let client = NotesClient::new(db, gateway.clone(), Arc::new(NoopRegistrar), "sync-notes");
        (client, gateway)
    }

    fn stored(client: &NotesClient, local_id: &str) -> Option<Note> {
        client.database().lock().unwrap().get(local_id).unwrap()
    }

    #[test]
    fn test_draft_is_not_stored() {
        let (client, _) = setup();
        let draft = client.create_note_draft("Call Bob", ["work"]).unwrap();
        assert!(draft.pending_create);
        assert!(client.list_notes().unwrap().is_empty());
        assert!(client.create_note_draft("   ", Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_submit_and_list_newest_first() {
        let (client, _) = setup();
        let mut older = client.create_note_draft("Older", Vec::<String>::new()).unwrap();
        older.created_at = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        client.submit(older).unwrap();
        client
            .submit(client.create_note_draft("Newer", Vec::<String>::new()).unwrap())
            .unwrap();

        let titles: Vec<String> = client.list_notes().unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
        assert!(client.has_unsynced_changes().unwrap());
    }

    #[test]
    fn test_submit_twice_rejected() {
        let (client, _) = setup();
        let note = client.create_note_draft("Once", Vec::<String>::new()).unwrap();
        client.submit(note.clone()).unwrap();
        assert!(matches!(client.submit(note), Err(NoteError::Validation { .. })));
    }

    #[test]
    fn test_delete_unsynced_note_removes_it() {
        let (client, _) = setup();
        let note = client
            .submit(client.create_note_draft("Draft", Vec::<String>::new()).unwrap())
            .unwrap();

        assert!(client.delete(&note.local_id).unwrap());
        assert!(stored(&client, &note.local_id).is_none());
        assert!(!client.has_unsynced_changes().unwrap());
        assert!(!client.delete(&note.local_id).unwrap());
    }

    #[tokio::test]
    async fn test_delete_synced_note_hides_it_until_acknowledged() {
        let (client, gateway) = setup();
        let note = client
            .submit(client.create_note_draft("Synced", Vec::<String>::new()).unwrap())
            .unwrap();
        client.sync_now().await;
        assert!(!client.has_unsynced_changes().unwrap());

        assert!(client.delete(&note.local_id).unwrap());
        assert!(client.list_notes().unwrap().is_empty());
        assert!(stored(&client, &note.local_id).unwrap().pending_delete);
        assert!(!client.edit(&note.local_id, "Too late").unwrap());

        client.sync_now().await;
        assert!(stored(&client, &note.local_id).is_none());
        assert!(gateway.notes().is_empty());
    }

    #[tokio::test]
    async fn test_edit_synced_note_marks_pending_edit() {
        let (client, gateway) = setup();
        let note = client
            .submit(client.create_note_draft("Call Bob", Vec::<String>::new()).unwrap())
            .unwrap();
        client.sync_now().await;

        assert!(client.edit(&note.local_id, "Call Bob at 5").unwrap());
        let edited = stored(&client, &note.local_id).unwrap();
        assert!(edited.pending_edit);
        assert_eq!(edited.title, "Call Bob at 5");

        client.sync_now().await;
        let remote_id = stored(&client, &note.local_id).unwrap().remote_id.unwrap();
        assert_eq!(gateway.get(&remote_id).unwrap().title, "Call Bob at 5");
        assert!(!client.has_unsynced_changes().unwrap());
    }

    #[test]
    fn test_edit_unsynced_note_stays_a_create() {
        let (client, _) = setup();
        let note = client
            .submit(client.create_note_draft("Draft", Vec::<String>::new()).unwrap())
            .unwrap();

        assert!(client.edit(&note.local_id, "Draft v2").unwrap());
        let edited = stored(&client, &note.local_id).unwrap();
        assert!(edited.pending_create);
        assert!(!edited.pending_edit);
        assert!(client.edit(&note.local_id, "").is_err());
    }

    #[test]
    fn test_edit_clears_rejection_marker() {
        let (client, _) = setup();
        let note = client
            .submit(client.create_note_draft("Rejected", Vec::<String>::new()).unwrap())
            .unwrap();
        {
            let db = client.database().lock().unwrap();
            let mut marked = db.get(&note.local_id).unwrap().unwrap();
            marked.sync_error = Some("title not allowed".to_string());
            db.put(&marked).unwrap();
        }

        client.edit(&note.local_id, "Accepted").unwrap();
        assert!(stored(&client, &note.local_id).unwrap().sync_error.is_none());
    }

    #[test]
    fn test_tags_and_filter() {
        let (client, _) = setup();
        client
            .submit(client.create_note_draft("Report", ["work"]).unwrap())
            .unwrap();
        client
            .submit(client.create_note_draft("Groceries", ["home", "errand"]).unwrap())
            .unwrap();

        let tags: Vec<String> = client.all_tags().unwrap().into_iter().collect();
        assert_eq!(tags, vec!["errand", "home", "work"]);

        let active: BTreeSet<String> = ["work".to_string()].into_iter().collect();
        let filtered = client.filter_by_tags(&active).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Report");
        assert_eq!(client.filter_by_tags(&BTreeSet::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_from_config_requires_sync_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::new(Some(temp_dir.path().to_path_buf())).unwrap();
        assert!(matches!(
            NotesClient::from_config(&config, Arc::new(NoopRegistrar)),
            Err(NoteError::Config(_))
        ));

        config.set_sync_enabled(true).unwrap();
        config.set_remote_url("http://127.0.0.1:1/api").unwrap();
        let client = NotesClient::from_config(&config, Arc::new(NoopRegistrar)).unwrap();
        assert_eq!(client.trigger().tag(), "sync-notes");
        assert!(temp_dir.path().join("notes.db").exists());
    }
}
