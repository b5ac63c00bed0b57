//! notesync - offline-first note synchronization core.
//!
//! This library provides:
//! - Data models (Note, remote wire shapes)
//! - Local note store (SQLite)
//! - Pending-operation tracking and reconciliation against a remote REST store
//! - Connectivity-driven sync triggering with coalescing
//! - Tag projections and a notes client for the UI layer
//! - Configuration management
//!
//! All mutations land in the local store first; the remote store is brought up
//! to date by the sync engine whenever a trigger fires.
//!
//! # Feature Flags
//!
//! - `desktop`: Include desktop-specific features (hostname detection, config dir detection).
//! - `uniffi`: Generate UniFFI bindings for mobile platforms (Android, iOS).

pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod merge;
pub mod models;
pub mod search;
pub mod sync_client;
pub mod sync_state;
pub mod trigger;
pub mod validation;

// Mobile bindings module
#[cfg(feature = "uniffi")]
pub mod android;

// UniFFI scaffolding (must be at crate root)
#[cfg(feature = "uniffi")]
uniffi::setup_scaffolding!();

// Re-export commonly used types
pub use client::NotesClient;
pub use config::Config;
pub use database::Database;
pub use error::{NoteError, NoteResult, ValidationError};
pub use gateway::{HttpGateway, RemoteGateway};
pub use models::{Note, RemoteNote};
pub use sync_client::{SyncEngine, SyncResult};
pub use trigger::{BackgroundSyncRegistrar, Connectivity, SyncTrigger, TriggerOutcome};

#[cfg(feature = "uniffi")]
pub use android::{NoteData, NotesCoreError, NotesMobileClient, SyncResultData};
