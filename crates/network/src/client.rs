//! HTTP transport for remote sources
//!
//! Implements the sync engine's backend over a source's REST API. One
//! request, one answer; a failed request surfaces immediately and the next
//! sync round is the retry.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use talekeeper_core::SourceId;
use talekeeper_sync_engine::{
    EventPushRequest, EventPushResponse, LibraryChangesRequest, LibraryChangesResponse,
    SyncBackend, SyncError, SyncResult,
};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("TaleKeeper/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Authenticated client for one remote source
#[derive(Clone)]
pub struct SyncClient {
    inner: ReqwestClient,
    base_url: String,
    token: String,
}

impl SyncClient {
    /// Creates a client with the default configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> SyncResult<Self> {
        Self::with_config(base_url, token, ClientConfig::default())
    }

    /// Creates a client with a custom configuration
    pub fn with_config(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: ClientConfig,
    ) -> SyncResult<Self> {
        let inner = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let base_url: String = base_url.into();
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, source_id: &SourceId, body: &B) -> SyncResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .inner
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Self::decode(source_id, response).await
    }

    async fn decode<T: DeserializeOwned>(
        source_id: &SourceId,
        response: Response,
    ) -> SyncResult<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized(source_id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SyncBackend for SyncClient {
    async fn fetch_library_changes(
        &self,
        request: &LibraryChangesRequest,
    ) -> SyncResult<LibraryChangesResponse> {
        self.post_json("/api/sync/library/changes", &request.source_id, request)
            .await
    }

    async fn push_events(&self, request: &EventPushRequest) -> SyncResult<EventPushResponse> {
        self.post_json("/api/sync/events", &request.source_id, request)
            .await
    }
}
