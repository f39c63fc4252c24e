//! JSON-over-HTTP client for the remote CRM.
//!
//! Endpoints, relative to `base_url`:
//! - `GET    /v1/entities/{entity_set}/{id}`
//! - `POST   /v1/entities/{entity_set}/search` with `{"criteria": {...}}`
//! - `POST   /v1/entities/{entity_set}`
//! - `PATCH  /v1/entities/{entity_set}/{id}`
//!
//! Writes carry the validation level in the `X-Validation-Level` header as the
//! numeric flag bits.

use super::{RemoteCrm, RemoteInput};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use crmsync_model::{mapping_for, Attributes, RemoteRecord};
use crmsync_types::{EntityType, RemoteId, ValidationLevel};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Header carrying [`ValidationLevel`] bits on write requests.
pub const VALIDATION_HEADER: &str = "X-Validation-Level";

/// Connection settings for [`HttpRemoteCrm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRemoteConfig {
    /// API root, e.g. `https://crm.example.com/api`.
    pub base_url: String,
    /// Bearer token; requests are sent unauthenticated when empty.
    pub api_token: String,
    /// Per-request timeout enforced by the HTTP client.
    pub request_timeout_ms: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: String::new(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<WireRecord>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    criteria: &'a Attributes,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`RemoteCrm`] over the remote system's REST API.
pub struct HttpRemoteCrm {
    client: Client,
    config: HttpRemoteConfig,
}

impl HttpRemoteCrm {
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn collection_url(&self, entity_type: EntityType) -> String {
        format!(
            "{}/v1/entities/{}",
            self.config.base_url.trim_end_matches('/'),
            mapping_for(entity_type).remote_entity
        )
    }

    /// The id is pushed as one escaped path segment.
    fn record_url(&self, entity_type: EntityType, id: &RemoteId) -> SyncResult<Url> {
        let mut url = Url::parse(&self.collection_url(entity_type))
            .map_err(|e| SyncError::Configuration(format!("invalid remote base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::Configuration("remote base_url cannot take a path".to_string()))?
            .push(id.as_str());
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.config.api_token)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> SyncResult<Response> {
        self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout
            } else {
                SyncError::RemoteUnavailable(format!("{what} failed: {e}"))
            }
        })
    }

    async fn read_record(response: Response, entity_type: EntityType, what: &str) -> SyncResult<RemoteRecord> {
        let response = check_status(response).await?;
        let wire: WireRecord = response
            .json()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("failed to parse {what} response: {e}")))?;
        Ok(RemoteRecord::new(wire.id, entity_type, wire.attributes))
    }
}

/// Maps non-success statuses: throttling and server errors are transient,
/// other client errors carry the remote system's own message.
async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(SyncError::RemoteUnavailable(format!("remote returned {status}: {body}")));
    }

    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    Err(SyncError::RemoteRejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteCrm for HttpRemoteCrm {
    async fn find(&self, entity_type: EntityType, id: &RemoteId) -> SyncResult<Option<RemoteRecord>> {
        let url = self.record_url(entity_type, id)?;
        debug!("GET {url}");
        let response = self.send(self.client.get(url), "find").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_record(response, entity_type, "find").await.map(Some)
    }

    async fn search(&self, entity_type: EntityType, criteria: &Attributes) -> SyncResult<Vec<RemoteRecord>> {
        let url = format!("{}/search", self.collection_url(entity_type));
        debug!("POST {url}");
        let response = self
            .send(self.client.post(&url).json(&SearchRequest { criteria }), "search")
            .await?;
        let response = check_status(response).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("failed to parse search response: {e}")))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|w| RemoteRecord::new(w.id, entity_type, w.attributes))
            .collect())
    }

    async fn create(
        &self,
        entity_type: EntityType,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        let url = self.collection_url(entity_type);
        debug!(attributes = input.len(), "POST {url}");
        let request = self
            .client
            .post(&url)
            .header(VALIDATION_HEADER, validation.bits().to_string())
            .json(input);
        let response = self.send(request, "create").await?;
        Self::read_record(response, entity_type, "create").await
    }

    async fn update(
        &self,
        entity_type: EntityType,
        id: &RemoteId,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        let url = self.record_url(entity_type, id)?;
        debug!(attributes = input.len(), "PATCH {url}");
        let request = self
            .client
            .patch(url)
            .header(VALIDATION_HEADER, validation.bits().to_string())
            .json(input);
        let response = self.send(request, "update").await?;
        Self::read_record(response, entity_type, "update").await
    }
}
