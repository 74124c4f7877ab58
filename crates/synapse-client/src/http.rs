//! Authenticated JSON client for the synapse REST API.
//!
//! Requests carry the stored bearer token. A 401 triggers one token refresh
//! shared by every concurrent caller, then the request is retried once.
//! When the refresh fails the session is cleared and the caller gets
//! [`Error::Unauthorized`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use synapse_core::{ApiResponse, Error, Result, SyncConfig, TokenResponse};

use crate::session::SessionStore;

pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Shared HTTP client with bearer auth and envelope decoding.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn from_config(config: &SyncConfig, session: Arc<SessionStore>) -> Result<Self> {
        Self::new(config.api_base_url.clone(), session, config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ─── Enveloped endpoints ───────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .execute(Method::GET, &self.url(path), None, &[])
            .await?;
        decode_envelope(response).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let response = self
            .execute(Method::GET, &self.url(path), None, query)
            .await?;
        decode_envelope(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let body = serde_json::to_value(body)?;
        let response = self
            .execute(Method::POST, &self.url(path), Some(&body), &[])
            .await?;
        decode_envelope(response).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let body = serde_json::to_value(body)?;
        let response = self
            .execute(Method::PUT, &self.url(path), Some(&body), &[])
            .await?;
        decode_envelope(response).await
    }

    /// POST that only cares whether the envelope reports success.
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        self.post::<B, Value>(path, body).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .execute(Method::DELETE, &self.url(path), None, &[])
            .await?;
        decode_envelope::<Value>(response).await.map(|_| ())
    }

    // ─── Raw endpoints ─────────────────────────────────────────────────────

    /// POST to an absolute URL whose body is not wrapped in the envelope.
    pub async fn post_external<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::POST, url, Some(&body), &[]).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message));
        }
        Ok(response.json::<T>().await?)
    }

    // ─── Transport ─────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(subsystem = "client", method = %method, url = %url))]
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Response> {
        let start = Instant::now();
        let token = self.session.access_token().await?;
        let response = self
            .build(method.clone(), url, body, query, token.as_deref())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            debug!(
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            return Ok(response);
        }

        self.refresh(token.as_deref()).await?;

        let token = self.session.access_token().await?;
        let response = self
            .build(method, url, body, query, token.as_deref())
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Request rejected after token refresh, clearing session");
            self.session.clear().await?;
            return Err(Error::Unauthorized(
                "session expired, please sign in again".into(),
            ));
        }
        debug!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed after refresh"
        );
        Ok(response)
    }

    fn build(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }

    /// Refresh the access token once for all callers that saw `stale`.
    ///
    /// Callers that queue behind an in-flight refresh find a different token
    /// in the session when they get the lock and return immediately.
    async fn refresh(&self, stale: Option<&str>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.session.access_token().await?;
        if current.is_some() && current.as_deref() != stale {
            debug!("Token already refreshed by another request");
            return Ok(());
        }

        let body = self
            .session
            .refresh_token()
            .await?
            .map(|token| serde_json::json!({ "refreshToken": token }));
        let result = self
            .build(Method::POST, &self.url(REFRESH_PATH), body.as_ref(), &[], None)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<ApiResponse<TokenResponse>>().await {
                    Ok(ApiResponse {
                        success: true,
                        data: Some(tokens),
                        ..
                    }) => {
                        self.session.store_tokens(&tokens).await?;
                        info!("Access token refreshed");
                        return Ok(());
                    }
                    Ok(envelope) => {
                        warn!(code = envelope.code, message = %envelope.message, "Token refresh rejected");
                    }
                    Err(e) => warn!(error = %e, "Token refresh returned an unreadable body"),
                }
            }
            Ok(response) => warn!(status = response.status().as_u16(), "Token refresh rejected"),
            Err(e) => warn!(error = %e, "Token refresh request failed"),
        }

        self.session.clear().await?;
        Err(Error::Unauthorized("token refresh failed".into()))
    }
}

/// Decode a `{success, code, message, data}` response.
async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<Value>>(&text)
            .map(|envelope| envelope.message)
            .unwrap_or(text);
        return Err(status_error(status, message));
    }

    let envelope: ApiResponse<T> = response.json().await?;
    if envelope.success {
        return Ok(envelope.data);
    }
    let code = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::BAD_REQUEST);
    Err(status_error(code, envelope.message))
}

/// Map an HTTP status to the crate error taxonomy.
pub fn status_error(status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::CONFLICT => Error::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::InvalidInput(message),
        _ => Error::Request(format!("HTTP {}: {}", status.as_u16(), message)),
    }
}
