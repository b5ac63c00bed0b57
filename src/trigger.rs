//! Connectivity-driven sync triggering.
//!
//! `SyncTrigger` owns the sync engine and decides when a cycle runs. At most
//! one cycle is in flight; triggers arriving meanwhile collapse into a single
//! follow-up cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::NoteResult;
use crate::sync_client::{SyncEngine, SyncResult};

/// Network reachability as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Offline,
    Online,
}

/// Host hook for scheduling a deferred sync when the app may not be running
pub trait BackgroundSyncRegistrar: Send + Sync {
    /// Ask the platform to call back with `tag` once connectivity allows.
    fn register(&self, tag: &str) -> NoteResult<()>;
}

/// Registrar for hosts without background execution
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl BackgroundSyncRegistrar for NoopRegistrar {
    fn register(&self, _tag: &str) -> NoteResult<()> {
        Ok(())
    }
}

/// What a trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle was already running; a follow-up was scheduled on it
    Coalesced,
    /// Cycles ran to completion: the requested one plus any follow-ups
    Completed(Vec<SyncResult>),
}

#[derive(Debug)]
struct TriggerState {
    connectivity: Connectivity,
    in_flight: bool,
    follow_up: bool,
}

/// Releases the in-flight slot if a cycle's future is dropped before it
/// finishes (host timeout, aborted task). A pending follow-up is discarded
/// with it; the next trigger starts a fresh cycle.
struct InFlight<'a> {
    trigger: &'a SyncTrigger,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.trigger.lock_state();
        state.in_flight = false;
        state.follow_up = false;
        tracing::warn!("Sync cycle abandoned before completion");
    }
}

/// Starts reconciliation cycles on reconnect, on request, and from the
/// platform's background callback.
pub struct SyncTrigger {
    engine: SyncEngine,
    registrar: Arc<dyn BackgroundSyncRegistrar>,
    tag: String,
    state: Mutex<TriggerState>,
}

impl SyncTrigger {
    /// Create a trigger. Starts `Offline`; the host reports the real state
    /// with `set_connectivity`.
    pub fn new(
        engine: SyncEngine,
        registrar: Arc<dyn BackgroundSyncRegistrar>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            registrar,
            tag: tag.into(),
            state: Mutex::new(TriggerState {
                connectivity: Connectivity::Offline,
                in_flight: false,
                follow_up: false,
            }),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn connectivity(&self) -> Connectivity {
        self.lock_state().connectivity
    }

    /// True while a cycle is running
    pub fn is_syncing(&self) -> bool {
        self.lock_state().in_flight
    }

    // The state is plain flags, so a poisoned lock is still usable.
    fn lock_state(&self) -> MutexGuard<'_, TriggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a connectivity change. Coming online registers the background
    /// sync intent and runs a cycle; every other transition only records the
    /// new state and returns `None`.
    pub async fn set_connectivity(&self, connectivity: Connectivity) -> Option<TriggerOutcome> {
        let previous = {
            let mut state = self.lock_state();
            std::mem::replace(&mut state.connectivity, connectivity)
        };

        if previous != Connectivity::Offline || connectivity != Connectivity::Online {
            tracing::debug!(?previous, ?connectivity, "Connectivity recorded");
            return None;
        }

        tracing::info!("Connectivity restored, starting sync");
        if let Err(e) = self.registrar.register(&self.tag) {
            tracing::warn!(tag = %self.tag, error = %e, "Background sync registration failed");
        }
        Some(self.request_sync().await)
    }

    /// Run a cycle now, or fold into the one already running.
    ///
    /// A failed pull is reported as a failed `SyncResult`; local state is
    /// unchanged in that case and the next trigger retries.
    pub async fn request_sync(&self) -> TriggerOutcome {
        {
            let mut state = self.lock_state();
            if state.in_flight {
                state.follow_up = true;
                tracing::debug!("Sync already running, follow-up scheduled");
                return TriggerOutcome::Coalesced;
            }
            state.in_flight = true;
        }
        let mut guard = InFlight {
            trigger: self,
            armed: true,
        };

        let mut results = Vec::new();
        loop {
            let result = match self.engine.reconcile().await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "Sync cycle failed");
                    SyncResult::failure(e.to_string())
                }
            };
            results.push(result);

            let run_again = {
                let mut state = self.lock_state();
                if state.follow_up {
                    state.follow_up = false;
                    true
                } else {
                    state.in_flight = false;
                    false
                }
            };
            if !run_again {
                break;
            }
        }

        guard.armed = false;
        TriggerOutcome::Completed(results)
    }

    /// Entry point for the platform's background sync callback.
    ///
    /// Returns `None` for tags this trigger did not register.
    pub async fn handle_background_sync(&self, tag: &str) -> Option<TriggerOutcome> {
        if tag != self.tag {
            tracing::debug!(tag, "Ignoring background sync for unknown tag");
            return None;
        }
        tracing::info!(tag, "Background sync");
        Some(self.request_sync().await)
    }

    /// Schedule a cycle after a local write, without waiting for it.
    ///
    /// Does nothing when offline or when called outside a tokio runtime; the
    /// change stays pending for the next trigger.
    pub fn notify_local_change(self: &Arc<Self>) {
        if self.connectivity() != Connectivity::Online {
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No runtime available, local change left for next sync");
                return;
            }
        };
        let trigger = Arc::clone(self);
        handle.spawn(async move {
            trigger.request_sync().await;
        });
    }
}
