//! Session state kept in the shared KeyedStore.
//!
//! The bearer token, refresh token, user profile, and authenticated flag
//! live under their own keys so every context sees sign-in and sign-out.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use synapse_core::defaults::{KEY_ACCESS_TOKEN, KEY_AUTHENTICATED, KEY_REFRESH_TOKEN, KEY_USER};
use synapse_core::{KeyedStore, Result, TokenResponse, UserInfo};

use crate::http::ApiClient;

pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Read/write access to the persisted session.
pub struct SessionStore {
    store: Arc<dyn KeyedStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_one(KEY_ACCESS_TOKEN)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_one(KEY_REFRESH_TOKEN)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub async fn user(&self) -> Result<Option<UserInfo>> {
        match self.store.get_one(KEY_USER).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(serde_json::from_value(value).ok()),
        }
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self
            .store
            .get_one(KEY_AUTHENTICATED)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Persist a freshly issued access token and mark the session active.
    pub async fn store_tokens(&self, tokens: &TokenResponse) -> Result<()> {
        let mut items = HashMap::new();
        items.insert(
            KEY_ACCESS_TOKEN.to_string(),
            Value::String(tokens.access_token.clone()),
        );
        items.insert(KEY_AUTHENTICATED.to_string(), Value::Bool(true));
        self.store.set(items).await
    }

    pub async fn store_refresh_token(&self, token: &str) -> Result<()> {
        self.store
            .set_one(KEY_REFRESH_TOKEN, Value::String(token.to_string()))
            .await
    }

    pub async fn store_user(&self, user: &UserInfo) -> Result<()> {
        self.store
            .set_one(KEY_USER, serde_json::to_value(user)?)
            .await
    }

    /// Remove every session key.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .remove(&[KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER, KEY_AUTHENTICATED])
            .await?;
        info!("Session cleared");
        Ok(())
    }

    /// Tell the backend the session ended, then clear local state whatever
    /// the backend answered.
    pub async fn logout(&self, api: &ApiClient) -> Result<()> {
        if let Err(e) = api.post_unit(LOGOUT_PATH, &serde_json::json!({})).await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_store::StorageMedium;

    fn session() -> SessionStore {
        SessionStore::new(Arc::new(StorageMedium::in_memory().context()))
    }

    #[tokio::test]
    async fn test_store_and_clear_tokens() {
        let session = session();
        assert!(!session.is_authenticated().await.unwrap());

        session
            .store_tokens(&TokenResponse {
                access_token: "abc".into(),
                token_type: "Bearer".into(),
                expires_in: 3600,
            })
            .await
            .unwrap();
        session.store_refresh_token("r1").await.unwrap();

        assert_eq!(session.access_token().await.unwrap().as_deref(), Some("abc"));
        assert!(session.is_authenticated().await.unwrap());

        session.clear().await.unwrap();
        assert_eq!(session.access_token().await.unwrap(), None);
        assert_eq!(session.refresh_token().await.unwrap(), None);
        assert!(!session.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_user_roundtrip() {
        let session = session();
        let user = UserInfo {
            id: 1,
            email: "a@b.c".into(),
            name: "A".into(),
            picture: String::new(),
            set_alarm: false,
        };
        session.store_user(&user).await.unwrap();
        assert_eq!(session.user().await.unwrap(), Some(user));
    }
}
