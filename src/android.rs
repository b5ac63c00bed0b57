//! Mobile bindings for notesync.
//!
//! This module provides a blocking API for Android and iOS apps, exposed via
//! UniFFI bindings. Each call that needs the network runs on a short-lived
//! current-thread tokio runtime.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::client::NotesClient;
use crate::config::Config;
use crate::error::{NoteError, NoteResult};
use crate::models::Note;
use crate::sync_client::SyncResult;
use crate::trigger::{BackgroundSyncRegistrar, Connectivity, NoopRegistrar, TriggerOutcome};

/// Error type exposed to Kotlin/Swift via UniFFI
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum NotesCoreError {
    #[error("Database error: {msg}")]
    Database { msg: String },
    #[error("Configuration error: {msg}")]
    Config { msg: String },
    #[error("Sync error: {msg}")]
    Sync { msg: String },
    #[error("Rejected by server: {msg}")]
    Rejected { msg: String },
    #[error("Validation error: {msg}")]
    Validation { msg: String },
    #[error("IO error: {msg}")]
    Io { msg: String },
}

impl From<NoteError> for NotesCoreError {
    fn from(err: NoteError) -> Self {
        match err {
            NoteError::Database(e) => NotesCoreError::Database { msg: e.to_string() },
            NoteError::DatabaseOperation(msg) => NotesCoreError::Database { msg },
            NoteError::Config(msg) => NotesCoreError::Config { msg },
            NoteError::Network(msg) | NoteError::Sync(msg) => NotesCoreError::Sync { msg },
            NoteError::Rejected { status, message } => NotesCoreError::Rejected {
                msg: format!("{} ({})", message, status),
            },
            NoteError::NotFound(msg) => NotesCoreError::Rejected { msg },
            NoteError::Validation { field, message } => NotesCoreError::Validation {
                msg: format!("{}: {}", field, message),
            },
            NoteError::Io(e) => NotesCoreError::Io { msg: e.to_string() },
            NoteError::Json(e) => NotesCoreError::Database { msg: e.to_string() },
            NoteError::Other(msg) => NotesCoreError::Database { msg },
        }
    }
}

/// Host-side scheduler for deferred background sync (WorkManager, BGTaskScheduler)
#[uniffi::export(with_foreign)]
pub trait BackgroundScheduler: Send + Sync {
    /// Schedule a call to `run_background_sync(tag)` once the network is up
    fn schedule(&self, tag: String) -> Result<(), NotesCoreError>;
}

struct SchedulerRegistrar(Arc<dyn BackgroundScheduler>);

impl BackgroundSyncRegistrar for SchedulerRegistrar {
    fn register(&self, tag: &str) -> NoteResult<()> {
        self.0
            .schedule(tag.to_string())
            .map_err(|e| NoteError::Other(e.to_string()))
    }
}

/// A note as shown by the app
#[derive(Debug, Clone, uniffi::Record)]
pub struct NoteData {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: String,
    /// Local changes not yet acknowledged by the server
    pub unsynced: bool,
    pub sync_error: Option<String>,
}

impl From<Note> for NoteData {
    fn from(note: Note) -> Self {
        let unsynced = note.has_pending_work();
        NoteData {
            local_id: note.local_id,
            remote_id: note.remote_id,
            title: note.title,
            tags: note.tags.into_iter().collect(),
            created_at: note.created_at.to_rfc3339(),
            unsynced,
            sync_error: note.sync_error,
        }
    }
}

/// Sync operation result
#[derive(Debug, Clone, uniffi::Record)]
pub struct SyncResultData {
    pub success: bool,
    pub notes_received: i32,
    pub notes_sent: i32,
    pub notes_purged: i32,
    pub notes_rejected: i32,
    pub error_message: Option<String>,
}

impl SyncResultData {
    /// Fold the cycles of one trigger into a single report
    fn from_results(results: &[SyncResult]) -> Self {
        let errors: Vec<&str> = results
            .iter()
            .flat_map(|r| r.errors.iter().map(String::as_str))
            .collect();
        SyncResultData {
            success: results.iter().all(|r| r.success),
            notes_received: results.iter().map(|r| r.pulled).sum::<i64>() as i32,
            notes_sent: results.iter().map(|r| r.pushed).sum::<i64>() as i32,
            notes_purged: results.iter().map(|r| r.purged).sum::<i64>() as i32,
            notes_rejected: results.iter().map(|r| r.rejected).sum::<i64>() as i32,
            error_message: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    fn coalesced() -> Self {
        SyncResultData {
            success: true,
            notes_received: 0,
            notes_sent: 0,
            notes_purged: 0,
            notes_rejected: 0,
            error_message: None,
        }
    }
}

impl From<TriggerOutcome> for SyncResultData {
    fn from(outcome: TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::Coalesced => SyncResultData::coalesced(),
            TriggerOutcome::Completed(results) => SyncResultData::from_results(&results),
        }
    }
}

/// Main client for notes on mobile platforms
#[derive(uniffi::Object)]
pub struct NotesMobileClient {
    config: Mutex<Config>,
    notes: NotesClient,
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, NotesCoreError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| NotesCoreError::Sync {
            msg: format!("Failed to create runtime: {}", e),
        })?;
    Ok(rt.block_on(future))
}

#[uniffi::export]
impl NotesMobileClient {
    /// Open (or create) the note store in `data_dir`, syncing with `server_url`
    #[uniffi::constructor]
    pub fn new(
        data_dir: String,
        server_url: String,
        scheduler: Option<Arc<dyn BackgroundScheduler>>,
    ) -> Result<Arc<Self>, NotesCoreError> {
        let data_path = PathBuf::from(&data_dir);
        std::fs::create_dir_all(&data_path).map_err(|e| NotesCoreError::Io {
            msg: format!("Failed to create data directory: {}", e),
        })?;

        let mut config = Config::new(Some(data_path))?;
        if config.remote_url() != Some(server_url.trim()) {
            config.set_remote_url(&server_url)?;
        }
        if !config.is_sync_enabled() {
            config.set_sync_enabled(true)?;
        }

        let registrar: Arc<dyn BackgroundSyncRegistrar> = match scheduler {
            Some(scheduler) => Arc::new(SchedulerRegistrar(scheduler)),
            None => Arc::new(NoopRegistrar),
        };
        let notes = NotesClient::from_config(&config, registrar)?;

        Ok(Arc::new(Self {
            config: Mutex::new(config),
            notes,
        }))
    }

    /// Visible notes, newest first
    pub fn list_notes(&self) -> Result<Vec<NoteData>, NotesCoreError> {
        Ok(self
            .notes
            .list_notes()?
            .into_iter()
            .map(NoteData::from)
            .collect())
    }

    /// Notes whose tags all lie in `active_tags` (all notes if empty)
    pub fn filter_notes(&self, active_tags: Vec<String>) -> Result<Vec<NoteData>, NotesCoreError> {
        let active: BTreeSet<String> = active_tags.into_iter().collect();
        Ok(self
            .notes
            .filter_by_tags(&active)?
            .into_iter()
            .map(NoteData::from)
            .collect())
    }

    pub fn all_tags(&self) -> Result<Vec<String>, NotesCoreError> {
        Ok(self.notes.all_tags()?.into_iter().collect())
    }

    /// Create and store a note; returns it with its local ID
    pub fn add_note(&self, title: String, tags: Vec<String>) -> Result<NoteData, NotesCoreError> {
        let draft = self.notes.create_note_draft(&title, tags)?;
        Ok(self.notes.submit(draft)?.into())
    }

    pub fn edit_note(&self, local_id: String, title: String) -> Result<bool, NotesCoreError> {
        Ok(self.notes.edit(&local_id, &title)?)
    }

    pub fn delete_note(&self, local_id: String) -> Result<bool, NotesCoreError> {
        Ok(self.notes.delete(&local_id)?)
    }

    pub fn has_unsynced_changes(&self) -> Result<bool, NotesCoreError> {
        Ok(self.notes.has_unsynced_changes()?)
    }

    /// Report network reachability. Coming online schedules background sync
    /// and runs a cycle, whose result is returned.
    pub fn set_online(&self, online: bool) -> Result<Option<SyncResultData>, NotesCoreError> {
        let connectivity = if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        };
        let outcome = block_on(self.notes.trigger().set_connectivity(connectivity))?;
        Ok(outcome.map(SyncResultData::from))
    }

    /// Perform sync with the configured server
    pub fn sync_now(&self) -> Result<SyncResultData, NotesCoreError> {
        let outcome = block_on(self.notes.sync_now())?;
        Ok(outcome.into())
    }

    /// Entry point for the platform's background job. Returns `None` for a
    /// tag this client never scheduled.
    pub fn run_background_sync(
        &self,
        tag: String,
    ) -> Result<Option<SyncResultData>, NotesCoreError> {
        let outcome = block_on(self.notes.trigger().handle_background_sync(&tag))?;
        Ok(outcome.map(SyncResultData::from))
    }

    pub fn background_sync_tag(&self) -> String {
        self.notes.trigger().tag().to_string()
    }

    pub fn device_id(&self) -> Result<String, NotesCoreError> {
        let cfg = self
            .config
            .lock()
            .map_err(|_| NotesCoreError::Config {
                msg: "config lock poisoned".to_string(),
            })?;
        Ok(cfg.device_id_hex().to_string())
    }

    /// Human-readable name of this device, shown in the app's sync settings
    pub fn device_name(&self) -> Result<String, NotesCoreError> {
        let cfg = self
            .config
            .lock()
            .map_err(|_| NotesCoreError::Config {
                msg: "config lock poisoned".to_string(),
            })?;
        Ok(cfg.device_name().to_string())
    }

    pub fn set_device_name(&self, name: String) -> Result<(), NotesCoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NotesCoreError::Validation {
                msg: "device_name: must not be empty".to_string(),
            });
        }
        let mut cfg = self
            .config
            .lock()
            .map_err(|_| NotesCoreError::Config {
                msg: "config lock poisoned".to_string(),
            })?;
        cfg.set_device_name(name)?;
        Ok(())
    }

    pub fn server_url(&self) -> Result<Option<String>, NotesCoreError> {
        let cfg = self
            .config
            .lock()
            .map_err(|_| NotesCoreError::Config {
                msg: "config lock poisoned".to_string(),
            })?;
        Ok(cfg.remote_url().map(str::to_string))
    }
}
