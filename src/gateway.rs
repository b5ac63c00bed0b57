//! Remote gateway: the HTTP interface to the authoritative note collection.
//!
//! The sync engine talks to the remote store only through the
//! [`RemoteGateway`] trait. [`HttpGateway`] implements it over reqwest and maps
//! HTTP outcomes onto the error taxonomy:
//! - transport failures and 5xx answers are transient (`Network` / `Sync`)
//! - 404 on edit is `NotFound`; 404 on delete is success
//! - any other 4xx is `Rejected`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{NoteError, NoteResult};
use crate::models::{EditPayload, NotePayload, RemoteNote};

/// Operations the remote store offers
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch the full remote collection
    async fn list_notes(&self) -> NoteResult<Vec<RemoteNote>>;

    /// Create a note; the response carries the remote-assigned ID
    async fn create_note(&self, payload: &NotePayload) -> NoteResult<RemoteNote>;

    /// Replace a note's title
    async fn update_note(&self, remote_id: &str, title: &str) -> NoteResult<()>;

    /// Delete a note. A note that is already gone counts as deleted.
    async fn delete_note(&self, remote_id: &str) -> NoteResult<()>;
}

/// Error body returned by the notes API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// reqwest-backed gateway
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for the notes API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Option<Duration>) -> NoteResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(NoteError::Config("remote_url is not configured".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Create a gateway from the sync section of the configuration
    pub fn from_config(config: &Config) -> NoteResult<Self> {
        let remote_url = config
            .remote_url()
            .ok_or_else(|| NoteError::Config("remote_url is not configured".to_string()))?;
        Self::new(remote_url, config.request_timeout())
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn notes_url(&self) -> String {
        format!("{}/notes", self.base_url)
    }

    fn note_url(&self, remote_id: &str) -> String {
        format!("{}/notes/{}", self.base_url, urlencoding::encode(remote_id))
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_notes(&self) -> NoteResult<Vec<RemoteNote>> {
        let response = self.client.get(self.notes_url()).send().await?;

        if !response.status().is_success() {
            // Any failed pull aborts the cycle and is retried later.
            return Err(NoteError::Sync(format!(
                "Pull failed with status {}",
                response.status()
            )));
        }

        let notes: Vec<RemoteNote> = response.json().await?;
        tracing::debug!(count = notes.len(), "GET /notes");
        Ok(notes)
    }

    async fn create_note(&self, payload: &NotePayload) -> NoteResult<RemoteNote> {
        let response = self
            .client
            .post(self.notes_url())
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Create").await);
        }

        let note: RemoteNote = response.json().await?;
        tracing::debug!(remote_id = %note.id, "POST /notes");
        Ok(note)
    }

    async fn update_note(&self, remote_id: &str, title: &str) -> NoteResult<()> {
        let payload = EditPayload {
            title: title.to_string(),
        };
        let response = self
            .client
            .put(self.note_url(remote_id))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Edit").await);
        }

        tracing::debug!(remote_id, "PUT /notes/{{id}}");
        Ok(())
    }

    async fn delete_note(&self, remote_id: &str) -> NoteResult<()> {
        let response = self
            .client
            .delete(self.note_url(remote_id))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(remote_id, "DELETE of missing note treated as success");
            return Ok(());
        }
        if !status.is_success() {
            return Err(error_for_status(response, "Delete").await);
        }

        tracing::debug!(remote_id, "DELETE /notes/{{id}}");
        Ok(())
    }
}

/// Classify a non-2xx response
async fn error_for_status(response: Response, action: &str) -> NoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::NOT_FOUND {
        NoteError::NotFound(format!("{} failed: {}", action, message))
    } else if status.is_client_error() {
        NoteError::rejected(status.as_u16(), message)
    } else {
        NoteError::Sync(format!("{} failed with status {}", action, status))
    }
}
