//! Durable note store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use synapse_core::{CreatedNote, Error, Note, NoteContent, NoteRepository, Result};

use crate::http::ApiClient;

pub const NOTES_PATH: &str = "/api/notes";

/// Path of the create-from-draft endpoint for `draft_id`.
pub fn from_draft_path(draft_id: Uuid) -> String {
    format!("{}/from-draft/{}", NOTES_PATH, draft_id)
}

/// [`NoteRepository`] backed by the `/api/notes` endpoints.
pub struct HttpNoteRepository {
    api: Arc<ApiClient>,
}

impl HttpNoteRepository {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

fn created(data: Option<CreatedNote>) -> Result<i64> {
    data.map(|note| note.id)
        .ok_or_else(|| Error::Request("note endpoint returned no id".into()))
}

#[async_trait]
impl NoteRepository for HttpNoteRepository {
    async fn create(&self, note: &NoteContent) -> Result<i64> {
        created(self.api.post(NOTES_PATH, note).await?)
    }

    async fn get(&self, id: i64) -> Result<Note> {
        self.api
            .get(&format!("{}/{}", NOTES_PATH, id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("note {}", id)))
    }

    async fn update(&self, id: i64, note: &NoteContent) -> Result<()> {
        self.api
            .put::<_, serde_json::Value>(&format!("{}/{}", NOTES_PATH, id), note)
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.api.delete(&format!("{}/{}", NOTES_PATH, id)).await
    }

    #[instrument(skip(self), fields(subsystem = "client", component = "notes"))]
    async fn create_from_draft(&self, draft_id: Uuid) -> Result<i64> {
        let note_id = created(
            self.api
                .post(&from_draft_path(draft_id), &serde_json::json!({}))
                .await?,
        )?;
        info!(note_id, "Draft promoted to note");
        Ok(note_id)
    }
}
