//! Teardown flush that does not wait for a response.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use synapse_core::{BeaconSender, NoteContent};

use crate::http::ApiClient;
use crate::notes::from_draft_path;

/// Queues a create-from-draft request carrying the latest title and content
/// on a detached task.
pub struct HttpBeacon {
    api: Arc<ApiClient>,
}

impl HttpBeacon {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

impl BeaconSender for HttpBeacon {
    fn send(&self, draft_id: Uuid, title: &str, content: &str) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%draft_id, "No runtime available for beacon");
            return false;
        };
        let api = Arc::clone(&self.api);
        let body = NoteContent {
            title: title.to_string(),
            content: content.to_string(),
        };
        runtime.spawn(async move {
            match api.post_unit(&from_draft_path(draft_id), &body).await {
                Ok(()) => debug!(%draft_id, "Beacon delivered"),
                Err(e) => debug!(%draft_id, error = %e, "Beacon failed"),
            }
        });
        true
    }
}
